use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use quicknotes_cardano::TxError;
use quicknotes_core::error::CoreError;
use quicknotes_db::StoreError;
use quicknotes_pipeline::PipelineError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain, store and pipeline errors and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent
/// `{ "error", "code" }` JSON responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `quicknotes_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A failure of the build / assemble / submit pipeline.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<TxError> for AppError {
    fn from(err: TxError) -> Self {
        AppError::Pipeline(PipelineError::Tx(err))
    }
}

type Classified = (StatusCode, &'static str, String);

fn internal() -> Classified {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
            },

            AppError::Store(err) => classify_store_error(err),

            AppError::Pipeline(err) => match err {
                PipelineError::Tx(tx) => classify_tx_error(tx),
                PipelineError::Store(store) => classify_store_error(store),
                PipelineError::NoteNotFound(id) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("Note with id {id} not found"),
                ),
                PipelineError::AddressBusy { .. } => {
                    (StatusCode::CONFLICT, "ADDRESS_BUSY", err.to_string())
                }
                PipelineError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                PipelineError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a transaction protocol error.
///
/// User-fixable preconditions and malformed input map to 400, an indexer
/// rejection to 422 with the indexer's message verbatim, and an unreachable
/// indexer to 502.
fn classify_tx_error(err: &TxError) -> Classified {
    let message = err.to_string();
    match err {
        TxError::ParameterFetch(source) => {
            tracing::warn!(error = %source, "Chain indexer unavailable");
            (StatusCode::BAD_GATEWAY, "PARAMETER_FETCH_ERROR", message)
        }
        TxError::NoSpendableInput => (StatusCode::BAD_REQUEST, "NO_SPENDABLE_INPUT", message),
        TxError::InsufficientFunds { .. } => {
            (StatusCode::BAD_REQUEST, "INSUFFICIENT_FUNDS", message)
        }
        TxError::MalformedTransaction(_) => {
            (StatusCode::BAD_REQUEST, "MALFORMED_TRANSACTION", message)
        }
        TxError::SigningRejected(_) => (StatusCode::BAD_REQUEST, "SIGNING_REJECTED", message),
        TxError::Submission(msg) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "SUBMISSION_ERROR",
            msg.clone(),
        ),
        TxError::Metadata(_) => (StatusCode::BAD_REQUEST, "INVALID_METADATA", message),
        TxError::TooLarge { .. } => (StatusCode::BAD_REQUEST, "TRANSACTION_TOO_LARGE", message),
        TxError::ValueTooLarge { .. } => {
            (StatusCode::BAD_REQUEST, "OUTPUT_VALUE_TOO_LARGE", message)
        }
        TxError::InvalidAddress(_) => (StatusCode::BAD_REQUEST, "INVALID_ADDRESS", message),
    }
}

fn classify_store_error(err: &StoreError) -> Classified {
    match err {
        StoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        StoreError::Database(db) => classify_sqlx_error(db),
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Check constraint violations map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> Classified {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL check constraint violation: error code 23514
            if db_err.code().as_deref() == Some("23514") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                return (
                    StatusCode::CONFLICT,
                    "CONFLICT",
                    format!("Write violates constraint: {constraint}"),
                );
            }
            tracing::error!(error = %db_err, "Database error");
            internal()
        }
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}
