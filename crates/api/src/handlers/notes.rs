//! Handlers for note CRUD.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use quicknotes_core::error::CoreError;
use quicknotes_core::note::{validate_content, validate_title, validate_wallet_address};
use quicknotes_core::types::DbId;
use quicknotes_db::models::note::{CreateNote, UpdateNote};
use serde_json::json;

use crate::error::AppResult;
use crate::state::AppState;

fn not_found(id: DbId) -> CoreError {
    CoreError::NotFound { entity: "Note", id }
}

/// GET /api/notes
///
/// All notes, newest first.
pub async fn list_notes(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let notes = state.store.list().await?;
    Ok(Json(notes))
}

/// GET /api/notes/{id}
pub async fn get_note(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let note = state.store.get(id).await?.ok_or_else(|| not_found(id))?;
    Ok(Json(note))
}

/// POST /api/notes
pub async fn create_note(
    State(state): State<AppState>,
    payload: Result<Json<CreateNote>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(mut input) = payload?;
    input.title = input.title.trim().to_string();
    validate_title(&input.title)?;
    validate_content(&input.content)?;
    if let Some(address) = &input.wallet_address {
        validate_wallet_address(address)?;
    }

    let note = state.store.create(&input).await?;

    tracing::info!(note_id = note.id, "Note created");

    Ok((StatusCode::CREATED, Json(note)))
}

/// PUT /api/notes/{id}
///
/// Partial update; omitted fields keep their value.
pub async fn update_note(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    payload: Result<Json<UpdateNote>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(mut input) = payload?;
    if let Some(title) = &mut input.title {
        *title = title.trim().to_string();
        validate_title(title)?;
    }
    if let Some(content) = &input.content {
        validate_content(content)?;
    }

    let note = state
        .store
        .update(id, &input)
        .await?
        .ok_or_else(|| not_found(id))?;

    tracing::info!(note_id = id, "Note updated");

    Ok(Json(note))
}

/// DELETE /api/notes/{id}
pub async fn delete_note(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    if !state.store.delete(id).await? {
        return Err(not_found(id).into());
    }

    tracing::info!(note_id = id, "Note deleted");

    Ok(Json(json!({ "message": "Note deleted successfully" })))
}
