//! Note entity model and DTOs.

use quicknotes_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// On-chain state of a note's proof transaction.
///
/// Absent (`None` on the note) means no chain interaction was attempted.
/// `Confirmed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "chain_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChainStatus {
    Pending,
    Confirmed,
}

/// A row from the `notes` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Note {
    pub id: DbId,
    pub title: String,
    pub content: String,
    #[serde(rename = "walletAddress")]
    pub wallet_address: Option<String>,
    #[serde(rename = "txHash")]
    pub tx_hash: Option<String>,
    #[serde(rename = "status")]
    pub chain_status: Option<ChainStatus>,
    #[serde(rename = "confirmedAt")]
    pub confirmed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Note {
    /// Whether the note's proof has reached its terminal state.
    pub fn is_confirmed(&self) -> bool {
        self.chain_status == Some(ChainStatus::Confirmed)
    }
}

/// DTO for creating a new note.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNote {
    pub title: String,
    pub content: String,
    #[serde(default, rename = "walletAddress")]
    pub wallet_address: Option<String>,
}

/// DTO for updating an existing note. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateNote {
    pub title: Option<String>,
    pub content: Option<String>,
}
