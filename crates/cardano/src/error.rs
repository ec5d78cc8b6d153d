//! Errors of the build -> sign -> assemble -> submit protocol.

use crate::indexer::IndexerError;

/// Failure of a transaction protocol step.
///
/// None of these leave partial state behind: a failed build produces no
/// bytes, a failed assembly produces no transaction, and nothing is written
/// to a note until submission succeeds.
#[derive(Debug, thiserror::Error)]
pub enum TxError {
    /// The indexer was unreachable or answered with something unusable.
    /// Safe to retry.
    #[error("Could not fetch chain parameters: {0}")]
    ParameterFetch(#[source] IndexerError),

    /// No UTXO with a positive lovelace amount was supplied.
    #[error("No spendable UTXO found for this wallet; fund your wallet and try again")]
    NoSpendableInput,

    /// The selected input cannot cover the self output plus the fee.
    #[error("Insufficient funds: input holds {available} lovelace, {required} required")]
    InsufficientFunds { available: u64, required: u64 },

    /// Body or witness set bytes failed to parse. Rebuild before retrying.
    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),

    /// The user declined, or the wallet failed while signing.
    #[error("Signing rejected: {0}")]
    SigningRejected(String),

    /// The indexer refused the signed transaction (double spend, expired
    /// TTL, ...). The message is the indexer's, verbatim. Retrying means
    /// rebuilding, since the old body's inputs or TTL are stale.
    #[error("Transaction submission failed: {0}")]
    Submission(String),

    /// The payload cannot be represented as transaction metadata.
    #[error("Invalid transaction metadata: {0}")]
    Metadata(String),

    #[error("Transaction is {size} bytes, above the {max} byte limit")]
    TooLarge { size: u64, max: u64 },

    #[error("Output value is {size} bytes, above the {max} byte limit")]
    ValueTooLarge { size: u64, max: u64 },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}
