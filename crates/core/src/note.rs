//! Note field validation.
//!
//! Applied by the HTTP layer before anything reaches the store.

use crate::error::CoreError;

/// Maximum length of a note title, in characters.
pub const MAX_TITLE_LEN: usize = 200;

/// Maximum length of a note body, in characters.
pub const MAX_CONTENT_LEN: usize = 20_000;

/// Validate a note title.
///
/// Rules:
/// - Must not be blank after trimming.
/// - Must not exceed `MAX_TITLE_LEN` characters.
pub fn validate_title(title: &str) -> Result<(), CoreError> {
    if title.trim().is_empty() {
        return Err(CoreError::Validation(
            "Note title must not be empty".to_string(),
        ));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(CoreError::Validation(format!(
            "Note title must not exceed {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(())
}

/// Validate a note body.
pub fn validate_content(content: &str) -> Result<(), CoreError> {
    if content.trim().is_empty() {
        return Err(CoreError::Validation(
            "Note content must not be empty".to_string(),
        ));
    }
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(CoreError::Validation(format!(
            "Note content must not exceed {MAX_CONTENT_LEN} characters"
        )));
    }
    Ok(())
}

/// Validate a wallet address as supplied by the client.
///
/// Only shape is checked here (non-empty, no whitespace); decoding is the
/// chain crate's job.
pub fn validate_wallet_address(address: &str) -> Result<(), CoreError> {
    if address.is_empty() {
        return Err(CoreError::Validation(
            "walletAddress must not be empty".to_string(),
        ));
    }
    if address.chars().any(char::is_whitespace) {
        return Err(CoreError::Validation(
            "walletAddress must not contain whitespace".to_string(),
        ));
    }
    Ok(())
}

/// Maximum length of a transaction hash, in hex characters.
pub const MAX_TX_HASH_LEN: usize = 64;

/// Validate a transaction hash: non-empty hex of at most 64 characters.
pub fn validate_tx_hash(tx_hash: &str) -> Result<(), CoreError> {
    if tx_hash.is_empty() || tx_hash.len() > MAX_TX_HASH_LEN {
        return Err(CoreError::Validation(format!(
            "txHash must be 1 to {MAX_TX_HASH_LEN} hex characters"
        )));
    }
    if !tx_hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CoreError::Validation(
            "txHash must be hexadecimal".to_string(),
        ));
    }
    Ok(())
}
