//! The note persistence seam.
//!
//! [`NoteStore`] is the single get/put/delete/list contract the pipeline,
//! the confirmation poller and the HTTP handlers depend on. [`PgNoteStore`]
//! is the production backend; [`crate::MemoryNoteStore`] keeps everything in
//! process.

use async_trait::async_trait;
use quicknotes_core::types::DbId;

use crate::models::note::{CreateNote, Note, UpdateNote};
use crate::repositories::NoteRepo;
use crate::DbPool;

/// Errors from a [`NoteStore`] backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The Postgres backend failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The write would break a note invariant.
    #[error("Conflict: {0}")]
    Conflict(String),
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Confirm the backend is reachable.
    async fn health_check(&self) -> Result<(), StoreError>;

    async fn get(&self, id: DbId) -> Result<Option<Note>, StoreError>;

    /// All notes, newest first.
    async fn list(&self) -> Result<Vec<Note>, StoreError>;

    async fn create(&self, input: &CreateNote) -> Result<Note, StoreError>;

    /// Apply a partial update. `None` if the note does not exist.
    async fn update(&self, id: DbId, input: &UpdateNote) -> Result<Option<Note>, StoreError>;

    /// Remove a note. `true` if something was deleted.
    async fn delete(&self, id: DbId) -> Result<bool, StoreError>;

    /// Notes whose proof is `pending`.
    async fn list_pending(&self) -> Result<Vec<Note>, StoreError>;

    /// Attach a submitted transaction hash and mark the note `pending`.
    ///
    /// A pending hash is replaced. Re-attaching the same hash to a confirmed
    /// note is a no-op that returns the note; a different hash is a
    /// [`StoreError::Conflict`]. `None` if the note does not exist.
    async fn attach_proof(
        &self,
        id: DbId,
        tx_hash: &str,
        wallet_address: Option<&str>,
    ) -> Result<Option<Note>, StoreError>;

    /// Move a `pending` note carrying `tx_hash` to `confirmed`.
    ///
    /// Returns `true` only if a write happened.
    async fn mark_confirmed(&self, id: DbId, tx_hash: &str) -> Result<bool, StoreError>;
}

/// Decide the outcome of an attach that did not update any row.
pub(crate) fn resolve_rejected_attach(
    existing: Option<Note>,
    tx_hash: &str,
) -> Result<Option<Note>, StoreError> {
    match existing {
        None => Ok(None),
        Some(note) if note.tx_hash.as_deref() == Some(tx_hash) => Ok(Some(note)),
        Some(note) => Err(StoreError::Conflict(format!(
            "Note {} already has a confirmed proof; its transaction hash cannot change",
            note.id
        ))),
    }
}

/// Postgres-backed [`NoteStore`].
#[derive(Clone)]
pub struct PgNoteStore {
    pool: DbPool,
}

impl PgNoteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NoteStore for PgNoteStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }

    async fn get(&self, id: DbId) -> Result<Option<Note>, StoreError> {
        Ok(NoteRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list(&self) -> Result<Vec<Note>, StoreError> {
        Ok(NoteRepo::list(&self.pool).await?)
    }

    async fn create(&self, input: &CreateNote) -> Result<Note, StoreError> {
        Ok(NoteRepo::create(&self.pool, input).await?)
    }

    async fn update(&self, id: DbId, input: &UpdateNote) -> Result<Option<Note>, StoreError> {
        Ok(NoteRepo::update(&self.pool, id, input).await?)
    }

    async fn delete(&self, id: DbId) -> Result<bool, StoreError> {
        Ok(NoteRepo::delete(&self.pool, id).await?)
    }

    async fn list_pending(&self) -> Result<Vec<Note>, StoreError> {
        Ok(NoteRepo::list_pending(&self.pool).await?)
    }

    async fn attach_proof(
        &self,
        id: DbId,
        tx_hash: &str,
        wallet_address: Option<&str>,
    ) -> Result<Option<Note>, StoreError> {
        if let Some(note) = NoteRepo::attach_proof(&self.pool, id, tx_hash, wallet_address).await? {
            return Ok(Some(note));
        }
        let existing = NoteRepo::find_by_id(&self.pool, id).await?;
        resolve_rejected_attach(existing, tx_hash)
    }

    async fn mark_confirmed(&self, id: DbId, tx_hash: &str) -> Result<bool, StoreError> {
        Ok(NoteRepo::mark_confirmed(&self.pool, id, tx_hash).await?)
    }
}
