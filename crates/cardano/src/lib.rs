//! Cardano transaction plumbing for note timestamping.
//!
//! The server never holds keys. It builds an unsigned transaction carrying
//! the note payload as auxiliary metadata, the user's wallet signs it, and
//! the server splices the witness set back in and submits through a chain
//! indexer.
//!
//! - [`indexer`]: the [`ChainIndexer`] contract consumed by the builder,
//!   the submit path and the confirmation poller.
//! - [`blockfrost`]: the Blockfrost HTTP implementation of that contract.
//! - [`wallet`]: the CIP-30 style wallet capability contract.
//! - [`builder`] / [`assembler`]: the unsigned-build and signed-assembly steps.

pub mod address;
pub mod assembler;
pub mod blockfrost;
pub mod builder;
pub mod cbor;
pub mod error;
pub mod indexer;
pub mod metadata;
pub mod wallet;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use address::Address;
pub use assembler::{assemble, SignedTransaction};
pub use builder::{TransactionBuilder, UnsignedTransaction};
pub use error::TxError;
pub use indexer::{ChainIndexer, ChainTip, IndexerError, ProtocolParameters, TxLookup, Utxo};
pub use wallet::{WalletBridge, WalletError, WalletSession};
