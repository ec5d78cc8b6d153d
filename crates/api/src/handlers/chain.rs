//! Handlers for the client-signed transaction protocol.
//!
//! The browser wallet signs; the server builds, assembles and submits.
//!
//! ```text
//! buildUnsignedTx -> (wallet signTx) -> assembleTx -> submitTx
//! ```
//!
//! A client whose wallet submits on its own reports the hash through
//! `attachOnChainProof` instead of `submitTx`. A client whose user declined
//! to sign calls `abandonTx` so the wallet address can build again.

use std::str::FromStr;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use quicknotes_cardano::wallet::parse_utxo_cbor;
use quicknotes_cardano::Utxo;
use quicknotes_core::payload::NoteAction;
use quicknotes_core::types::DbId;
use quicknotes_db::models::note::Note;
use quicknotes_pipeline::BuildRequest;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

fn required<T>(value: Option<T>, field: &str) -> AppResult<T> {
    value.ok_or_else(|| AppError::BadRequest(format!("{field} is required")))
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTxRequest {
    pub note_id: Option<DbId>,
    pub hash: Option<String>,
    pub wallet_address: Option<String>,
    /// `CREATE_NOTE` (default), `UPDATE_NOTE` or `DELETE_NOTE`.
    pub action: Option<String>,
    /// CIP-30 `TransactionUnspentOutput` CBOR hex strings.
    pub utxos: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTxResponse {
    pub unsigned_tx_hex: String,
    pub tx_id: String,
    pub fee: u64,
    pub ttl: u64,
}

/// POST /buildUnsignedTx
pub async fn build_unsigned_tx(
    State(state): State<AppState>,
    payload: Result<Json<BuildTxRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = payload?;
    let note_id = required(input.note_id, "noteId")?;
    let wallet_address = required(input.wallet_address, "walletAddress")?;
    let action = match input.action.as_deref() {
        Some(action) => NoteAction::from_str(action)?,
        None => NoteAction::default(),
    };
    let hash = input.hash.filter(|h| !h.trim().is_empty());
    let utxos = input
        .utxos
        .map(|raw| {
            raw.iter()
                .map(|hex| parse_utxo_cbor(hex))
                .collect::<Result<Vec<Utxo>, _>>()
        })
        .transpose()?;

    let unsigned = state
        .chain
        .build_unsigned(&BuildRequest {
            note_id,
            wallet_address,
            action,
            hash,
            utxos,
        })
        .await?;

    Ok(Json(BuildTxResponse {
        unsigned_tx_hex: unsigned.cbor_hex,
        tx_id: unsigned.tx_id,
        fee: unsigned.fee,
        ttl: unsigned.ttl,
    }))
}

// ---------------------------------------------------------------------------
// Assemble
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembleTxRequest {
    pub unsigned_tx_hex: Option<String>,
    pub witness_set_hex: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembleTxResponse {
    pub signed_tx_hex: String,
    pub tx_id: String,
}

/// POST /assembleTx
pub async fn assemble_tx(
    State(state): State<AppState>,
    payload: Result<Json<AssembleTxRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = payload?;
    let unsigned = required(input.unsigned_tx_hex, "unsignedTxHex")?;
    let witnesses = required(input.witness_set_hex, "witnessSetHex")?;

    let signed = state.chain.assemble(&unsigned, &witnesses)?;

    Ok(Json(AssembleTxResponse {
        signed_tx_hex: signed.cbor_hex,
        tx_id: signed.tx_id,
    }))
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// Either a signed transaction, or an unsigned one plus the wallet's
/// witness set to assemble first.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTxRequest {
    pub signed_tx_hex: Option<String>,
    pub unsigned_tx_hex: Option<String>,
    pub witness_set_hex: Option<String>,
    /// Note to attach the resulting hash to, as a pending proof.
    pub note_id: Option<DbId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTxResponse {
    pub success: bool,
    pub tx_hash: String,
}

/// POST /submitTx
pub async fn submit_tx(
    State(state): State<AppState>,
    payload: Result<Json<SubmitTxRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = payload?;

    let outcome = match (input.signed_tx_hex, input.unsigned_tx_hex, input.witness_set_hex) {
        (Some(signed), _, _) => state.chain.submit(&signed, input.note_id).await?,
        (None, Some(unsigned), Some(witnesses)) => {
            state
                .chain
                .assemble_and_submit(&unsigned, &witnesses, input.note_id)
                .await?
        }
        _ => {
            return Err(AppError::BadRequest(
                "signedTxHex, or unsignedTxHex with witnessSetHex, is required".to_string(),
            ))
        }
    };

    Ok(Json(SubmitTxResponse {
        success: true,
        tx_hash: outcome.tx_hash,
    }))
}

// ---------------------------------------------------------------------------
// Attach proof
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachProofRequest {
    pub note_id: Option<DbId>,
    pub tx_hash: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AttachProofResponse {
    pub success: bool,
    pub note: Note,
}

/// POST /attachOnChainProof
pub async fn attach_on_chain_proof(
    State(state): State<AppState>,
    payload: Result<Json<AttachProofRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = payload?;
    let note_id = required(input.note_id, "noteId")?;
    let tx_hash = required(input.tx_hash, "txHash")?;

    let note = state.chain.attach_proof(note_id, tx_hash.trim()).await?;

    Ok(Json(AttachProofResponse {
        success: true,
        note,
    }))
}

// ---------------------------------------------------------------------------
// Abandon
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbandonTxRequest {
    pub wallet_address: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbandonTxResponse {
    pub success: bool,
    /// Note whose unsubmitted build was dropped, if there was one.
    pub note_id: Option<DbId>,
}

/// POST /abandonTx
pub async fn abandon_tx(
    State(state): State<AppState>,
    payload: Result<Json<AbandonTxRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = payload?;
    let wallet_address = required(input.wallet_address, "walletAddress")?;

    let released = state.chain.abandon(wallet_address.trim()).await?;

    Ok(Json(AbandonTxResponse {
        success: true,
        note_id: released.map(|r| r.note_id),
    }))
}
