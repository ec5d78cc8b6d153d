use quicknotes_cardano::{TxError, WalletError};
use quicknotes_core::types::DbId;
use quicknotes_db::StoreError;

/// Failure of a note-mutation pipeline step.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Tx(#[from] TxError),

    #[error(transparent)]
    Store(StoreError),

    #[error("Note {0} not found")]
    NoteNotFound(DbId),

    /// Another note's transaction from the same address is built but not
    /// yet submitted.
    #[error("Wallet {address} already has a pending transaction for note {note_id}; submit or abandon it first")]
    AddressBusy { address: String, note_id: DbId },

    /// The note's proof is confirmed and cannot take a different hash.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => PipelineError::Conflict(msg),
            other => PipelineError::Store(other),
        }
    }
}

impl From<WalletError> for PipelineError {
    fn from(err: WalletError) -> Self {
        PipelineError::Tx(err.into())
    }
}
