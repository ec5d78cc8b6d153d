//! Chain indexer contract.
//!
//! Everything the system needs from the chain goes through
//! [`ChainIndexer`]: protocol parameters, UTXOs of an address, the chain
//! tip, transaction lookups and raw submission. Nothing is cached; every
//! call reads fresh.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Protocol parameters needed to balance a simple payment.
///
/// Deposits are left out: a note transaction carries no certificates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolParameters {
    /// Linear fee coefficient (lovelace per byte).
    pub min_fee_a: u64,
    /// Linear fee constant (lovelace).
    pub min_fee_b: u64,
    pub max_tx_size: u64,
    /// Largest serialized value a single output may carry, in bytes.
    pub max_val_size: u64,
    pub coins_per_utxo_byte: u64,
}

/// An unspent output owned by the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    /// Hex hash of the transaction that produced the output.
    pub tx_hash: String,
    pub output_index: u32,
    /// Lovelace carried by the output. Native assets are not tracked.
    pub lovelace: u64,
}

/// Most recent block known to the indexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTip {
    pub slot: u64,
    pub height: Option<u64>,
    pub hash: Option<String>,
}

/// Result of looking a transaction up by hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxLookup {
    /// Included in a block.
    Found { block_height: Option<u64> },
    /// Not (yet) on chain. Expected while a transaction is pending.
    NotFound,
}

/// Errors from a chain indexer backend.
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The indexer returned a non-2xx status code.
    #[error("Indexer API error ({status}): {body}")]
    Api {
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response whose body could not be interpreted.
    #[error("Unexpected indexer response: {0}")]
    InvalidResponse(String),

    /// The backend is not reachable for a non-HTTP reason.
    #[error("Indexer unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ChainIndexer: Send + Sync {
    async fn latest_epoch_parameters(&self) -> Result<ProtocolParameters, IndexerError>;

    /// UTXOs currently held at `address`, in indexer order.
    async fn address_utxos(&self, address: &Address) -> Result<Vec<Utxo>, IndexerError>;

    async fn latest_block(&self) -> Result<ChainTip, IndexerError>;

    /// Look a transaction up by hex hash. "Not found" is a normal answer,
    /// not an error.
    async fn transaction(&self, tx_hash: &str) -> Result<TxLookup, IndexerError>;

    /// Submit raw signed transaction bytes. Returns the transaction hash.
    async fn submit_transaction(&self, signed: &[u8]) -> Result<String, IndexerError>;
}
