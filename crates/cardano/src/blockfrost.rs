//! REST client for the Blockfrost chain indexer.
//!
//! Implements [`ChainIndexer`] over the Blockfrost HTTP API
//! (`/epochs/latest/parameters`, `/addresses/{addr}/utxos`,
//! `/blocks/latest`, `/txs/{hash}`, `/tx/submit`) using [`reqwest`].

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::address::Address;
use crate::indexer::{ChainIndexer, ChainTip, IndexerError, ProtocolParameters, TxLookup, Utxo};

/// Default base URL for the preview test network.
pub const PREVIEW_URL: &str = "https://cardano-preview.blockfrost.io/api/v0";

/// Blockfrost pages UTXO listings in chunks of this size.
const UTXO_PAGE_SIZE: usize = 100;

/// Upper bound on pages fetched for a single address.
const MAX_UTXO_PAGES: u32 = 10;

/// Hex length of a transaction hash.
const TX_HASH_HEX_LEN: usize = 64;

/// HTTP client for a Blockfrost project.
pub struct BlockfrostApi {
    client: reqwest::Client,
    api_url: String,
    project_id: String,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ParametersResponse {
    min_fee_a: u64,
    min_fee_b: u64,
    max_tx_size: u64,
    max_val_size: Option<String>,
    coins_per_utxo_size: Option<String>,
    coins_per_utxo_word: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AmountResponse {
    unit: String,
    quantity: String,
}

#[derive(Debug, Deserialize)]
struct UtxoResponse {
    tx_hash: String,
    output_index: u32,
    amount: Vec<AmountResponse>,
}

#[derive(Debug, Deserialize)]
struct BlockResponse {
    slot: Option<u64>,
    height: Option<u64>,
    hash: String,
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    block_height: Option<u64>,
}

fn parse_quantity(field: &str, value: &str) -> Result<u64, IndexerError> {
    value
        .parse()
        .map_err(|_| IndexerError::InvalidResponse(format!("{field} is not a number: {value}")))
}

impl TryFrom<ParametersResponse> for ProtocolParameters {
    type Error = IndexerError;

    fn try_from(raw: ParametersResponse) -> Result<Self, Self::Error> {
        // Pre-Babbage eras priced UTXOs per 8-byte word.
        let coins_per_utxo_byte = match (&raw.coins_per_utxo_size, &raw.coins_per_utxo_word) {
            (Some(size), _) => parse_quantity("coins_per_utxo_size", size)?,
            (None, Some(word)) => parse_quantity("coins_per_utxo_word", word)? / 8,
            (None, None) => {
                return Err(IndexerError::InvalidResponse(
                    "missing coins_per_utxo_size".to_string(),
                ))
            }
        };
        let max_val_size = match &raw.max_val_size {
            Some(v) => parse_quantity("max_val_size", v)?,
            None => 5000,
        };
        Ok(ProtocolParameters {
            min_fee_a: raw.min_fee_a,
            min_fee_b: raw.min_fee_b,
            max_tx_size: raw.max_tx_size,
            max_val_size,
            coins_per_utxo_byte,
        })
    }
}

impl TryFrom<UtxoResponse> for Utxo {
    type Error = IndexerError;

    fn try_from(raw: UtxoResponse) -> Result<Self, Self::Error> {
        let lovelace = raw
            .amount
            .iter()
            .find(|a| a.unit == "lovelace")
            .map(|a| parse_quantity("amount.quantity", &a.quantity))
            .transpose()?
            .unwrap_or(0);
        Ok(Utxo {
            tx_hash: raw.tx_hash,
            output_index: raw.output_index,
            lovelace,
        })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

impl BlockfrostApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base URL including the version, e.g. [`PREVIEW_URL`].
    /// * `project_id` - Blockfrost project key sent as the `project_id` header.
    pub fn new(api_url: String, project_id: String) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, project_id)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String, project_id: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            project_id,
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.api_url, path))
            .header("project_id", &self.project_id)
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`IndexerError::Api`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, IndexerError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(IndexerError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, IndexerError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ChainIndexer for BlockfrostApi {
    async fn latest_epoch_parameters(&self) -> Result<ProtocolParameters, IndexerError> {
        let response = self.get("/epochs/latest/parameters").send().await?;
        let raw: ParametersResponse = Self::parse_response(response).await?;
        raw.try_into()
    }

    async fn address_utxos(&self, address: &Address) -> Result<Vec<Utxo>, IndexerError> {
        let mut utxos = Vec::new();
        for page in 1..=MAX_UTXO_PAGES {
            let response = self
                .get(&format!("/addresses/{address}/utxos"))
                .query(&[("page", page.to_string()), ("order", "asc".to_string())])
                .send()
                .await?;

            // An address that never received funds is unknown to the indexer.
            if response.status() == StatusCode::NOT_FOUND {
                break;
            }

            let batch: Vec<UtxoResponse> = Self::parse_response(response).await?;
            let done = batch.len() < UTXO_PAGE_SIZE;
            for raw in batch {
                utxos.push(raw.try_into()?);
            }
            if done {
                break;
            }
        }
        Ok(utxos)
    }

    async fn latest_block(&self) -> Result<ChainTip, IndexerError> {
        let response = self.get("/blocks/latest").send().await?;
        let raw: BlockResponse = Self::parse_response(response).await?;
        let slot = raw
            .slot
            .ok_or_else(|| IndexerError::InvalidResponse("latest block has no slot".into()))?;
        Ok(ChainTip {
            slot,
            height: raw.height,
            hash: Some(raw.hash),
        })
    }

    async fn transaction(&self, tx_hash: &str) -> Result<TxLookup, IndexerError> {
        // Blockfrost answers anything but a full 32-byte hash with 400.
        if tx_hash.len() != TX_HASH_HEX_LEN || !tx_hash.chars().all(|c| c.is_ascii_hexdigit()) {
            tracing::debug!(%tx_hash, "Not a full transaction hash; reporting not found");
            return Ok(TxLookup::NotFound);
        }
        let response = self.get(&format!("/txs/{tx_hash}")).send().await?;
        if matches!(
            response.status(),
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST
        ) {
            return Ok(TxLookup::NotFound);
        }
        let raw: TxResponse = Self::parse_response(response).await?;
        Ok(TxLookup::Found {
            block_height: raw.block_height,
        })
    }

    async fn submit_transaction(&self, signed: &[u8]) -> Result<String, IndexerError> {
        let response = self
            .client
            .post(format!("{}/tx/submit", self.api_url))
            .header("project_id", &self.project_id)
            .header(reqwest::header::CONTENT_TYPE, "application/cbor")
            .body(signed.to_vec())
            .send()
            .await?;
        let tx_hash: String = Self::parse_response(response).await?;
        tracing::info!(%tx_hash, "Transaction accepted by indexer");
        Ok(tx_hash)
    }
}
