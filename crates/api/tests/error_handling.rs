//! Tests for `AppError` -> HTTP response mapping.
//!
//! These call `IntoResponse` directly on `AppError` values; no server needed.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use quicknotes_api::error::AppError;
use quicknotes_cardano::{IndexerError, TxError};
use quicknotes_core::error::CoreError;
use quicknotes_db::StoreError;
use quicknotes_pipeline::PipelineError;

/// Convert an `AppError` into its status code and parsed JSON body.
async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn not_found_error_returns_404() {
    let err = AppError::Core(CoreError::NotFound {
        entity: "Note",
        id: 42,
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Note with id 42 not found");
}

#[tokio::test]
async fn bad_request_error_returns_400() {
    let (status, json) = error_to_response(AppError::BadRequest("noteId is required".into())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
    assert_eq!(json["error"], "noteId is required");
}

#[tokio::test]
async fn no_spendable_input_returns_400() {
    let (status, json) = error_to_response(TxError::NoSpendableInput.into()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "NO_SPENDABLE_INPUT");
}

#[tokio::test]
async fn parameter_fetch_returns_502() {
    let err = TxError::ParameterFetch(IndexerError::Unavailable("timeout".into()));
    let (status, json) = error_to_response(err.into()).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["code"], "PARAMETER_FETCH_ERROR");
}

#[tokio::test]
async fn submission_returns_422_verbatim() {
    let err = TxError::Submission("BadInputsUTxO".into());
    let (status, json) = error_to_response(err.into()).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "SUBMISSION_ERROR");
    assert_eq!(json["error"], "BadInputsUTxO");
}

#[tokio::test]
async fn signing_rejected_returns_400() {
    let err = TxError::SigningRejected("user declined".into());
    let (status, json) = error_to_response(err.into()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "SIGNING_REJECTED");
}

#[tokio::test]
async fn address_busy_returns_409() {
    let err = PipelineError::AddressBusy {
        address: "addr_test1".into(),
        note_id: 7,
    };
    let (status, json) = error_to_response(err.into()).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "ADDRESS_BUSY");
}

#[tokio::test]
async fn store_conflict_returns_409() {
    let err = StoreError::Conflict("confirmed".into());
    let (status, json) = error_to_response(err.into()).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");
}

#[tokio::test]
async fn database_error_is_sanitized() {
    let err = StoreError::Database(sqlx::Error::PoolTimedOut);
    let (status, json) = error_to_response(err.into()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}
