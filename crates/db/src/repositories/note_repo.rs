//! Repository for the `notes` table.

use quicknotes_core::types::DbId;
use sqlx::PgPool;

use crate::models::note::{ChainStatus, CreateNote, Note, UpdateNote};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, title, content, wallet_address, tx_hash, chain_status, \
                       confirmed_at, created_at, updated_at";

/// Provides CRUD and proof-tracking operations for notes.
pub struct NoteRepo;

impl NoteRepo {
    /// Insert a new note, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateNote) -> Result<Note, sqlx::Error> {
        let query = format!(
            "INSERT INTO notes (title, content, wallet_address)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Note>(&query)
            .bind(&input.title)
            .bind(&input.content)
            .bind(&input.wallet_address)
            .fetch_one(pool)
            .await
    }

    /// Find a note by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Note>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM notes WHERE id = $1");
        sqlx::query_as::<_, Note>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all notes ordered by most recently created first.
    pub async fn list(pool: &PgPool) -> Result<Vec<Note>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM notes ORDER BY created_at DESC, id DESC");
        sqlx::query_as::<_, Note>(&query).fetch_all(pool).await
    }

    /// Update a note. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateNote,
    ) -> Result<Option<Note>, sqlx::Error> {
        let query = format!(
            "UPDATE notes SET
                title = COALESCE($2, title),
                content = COALESCE($3, content)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Note>(&query)
            .bind(id)
            .bind(&input.title)
            .bind(&input.content)
            .fetch_optional(pool)
            .await
    }

    /// Permanently delete a note. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List notes whose proof transaction is still awaiting confirmation.
    pub async fn list_pending(pool: &PgPool) -> Result<Vec<Note>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notes WHERE chain_status = $1 ORDER BY id"
        );
        sqlx::query_as::<_, Note>(&query)
            .bind(ChainStatus::Pending)
            .fetch_all(pool)
            .await
    }

    /// Record a submitted transaction hash against a note and mark it pending.
    ///
    /// Confirmed notes are left untouched; `None` is returned for them as
    /// well as for missing rows, so callers re-read to tell the two apart.
    pub async fn attach_proof(
        pool: &PgPool,
        id: DbId,
        tx_hash: &str,
        wallet_address: Option<&str>,
    ) -> Result<Option<Note>, sqlx::Error> {
        let query = format!(
            "UPDATE notes SET
                tx_hash = $2,
                chain_status = $3,
                wallet_address = COALESCE($4, wallet_address),
                confirmed_at = NULL
             WHERE id = $1 AND chain_status IS DISTINCT FROM $5
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Note>(&query)
            .bind(id)
            .bind(tx_hash)
            .bind(ChainStatus::Pending)
            .bind(wallet_address)
            .bind(ChainStatus::Confirmed)
            .fetch_optional(pool)
            .await
    }

    /// Flip a pending note to confirmed, but only if it still carries `tx_hash`.
    ///
    /// Returns `true` if a row was written.
    pub async fn mark_confirmed(
        pool: &PgPool,
        id: DbId,
        tx_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notes SET chain_status = $3, confirmed_at = NOW()
             WHERE id = $1 AND tx_hash = $2 AND chain_status = $4",
        )
        .bind(id)
        .bind(tx_hash)
        .bind(ChainStatus::Confirmed)
        .bind(ChainStatus::Pending)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
