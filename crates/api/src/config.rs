use quicknotes_cardano::blockfrost::PREVIEW_URL;

/// Chain indexer connection settings.
#[derive(Debug, Clone)]
pub struct BlockfrostConfig {
    /// Base URL, network included (default: preview).
    pub api_url: String,
    /// Value of the `project_id` header.
    pub project_id: String,
}

impl BlockfrostConfig {
    /// | Env Var                 | Default                                       |
    /// |-------------------------|-----------------------------------------------|
    /// | `BLOCKFROST_URL`        | `https://cardano-preview.blockfrost.io/api/v0`|
    /// | `BLOCKFROST_PROJECT_ID` | required                                      |
    pub fn from_env() -> Self {
        let api_url = std::env::var("BLOCKFROST_URL").unwrap_or_else(|_| PREVIEW_URL.into());
        let project_id =
            std::env::var("BLOCKFROST_PROJECT_ID").expect("BLOCKFROST_PROJECT_ID must be set");
        Self {
            api_url,
            project_id,
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields except the indexer key have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Seconds between confirmation polls (default: `30`).
    pub confirmation_poll_secs: u64,
    /// Slots added to the chain tip for a transaction's TTL (default: `2000`).
    pub tx_ttl_slots: u64,
    /// How long a built, unsubmitted transaction keeps its address reserved
    /// (default: `2400`).
    pub in_flight_timeout_secs: u64,
    pub blockfrost: BlockfrostConfig,
}

fn env_parse<T: std::str::FromStr>(name: &str, default: &str) -> T {
    std::env::var(name)
        .unwrap_or_else(|_| default.into())
        .parse()
        .unwrap_or_else(|_| panic!("{name} must be a valid {}", std::any::type_name::<T>()))
}

/// Like [`env_parse`], for durations that must be non-zero.
fn env_parse_nonzero(name: &str, default: &str) -> u64 {
    nonzero(name, env_parse(name, default))
}

fn nonzero(name: &str, value: u64) -> u64 {
    if value == 0 {
        panic!("{name} must be greater than zero");
    }
    value
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `HOST`                   | `0.0.0.0`               |
    /// | `PORT`                   | `5000`                  |
    /// | `CORS_ORIGINS`           | `http://localhost:3000` |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                    |
    /// | `CONFIRMATION_POLL_SECS` | `30`                    |
    /// | `TX_TTL_SLOTS`           | `2000`                  |
    /// | `IN_FLIGHT_TIMEOUT_SECS` | `2400`                  |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            host,
            port: env_parse("PORT", "5000"),
            cors_origins,
            request_timeout_secs: env_parse_nonzero("REQUEST_TIMEOUT_SECS", "30"),
            confirmation_poll_secs: env_parse_nonzero("CONFIRMATION_POLL_SECS", "30"),
            tx_ttl_slots: env_parse_nonzero("TX_TTL_SLOTS", "2000"),
            in_flight_timeout_secs: env_parse_nonzero("IN_FLIGHT_TIMEOUT_SECS", "2400"),
            blockfrost: BlockfrostConfig::from_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonzero_passes_positive_values() {
        assert_eq!(nonzero("CONFIRMATION_POLL_SECS", 30), 30);
    }

    #[test]
    #[should_panic(expected = "CONFIRMATION_POLL_SECS must be greater than zero")]
    fn zero_poll_interval_fails_at_startup() {
        nonzero("CONFIRMATION_POLL_SECS", 0);
    }
}
