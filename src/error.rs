use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::datasource::ReplayError;
use crate::db::StoreError;
use crate::ledger::LedgerError;
use crate::recompute::PassError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unprocessable: {0}")]
    Unprocessable(String),
    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AppError::NotFound(err.to_string()),
            StoreError::Conflict(_) | StoreError::UnitHeld { .. } | StoreError::BudgetFloor { .. } => {
                AppError::Conflict(err.to_string())
            }
            StoreError::Db(_) | StoreError::Corrupt(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let msg = err.to_string();
        match err {
            LedgerError::NotFound(_) => AppError::NotFound(msg),
            LedgerError::OwnershipMismatch(_) => AppError::Forbidden(msg),
            LedgerError::TradeLocked { .. }
            | LedgerError::TooManyUnits { .. }
            | LedgerError::InsufficientBudget { .. }
            | LedgerError::QuotaExhausted { .. }
            | LedgerError::UnitUnavailable(_) => AppError::Conflict(msg),
            LedgerError::BannedUnit { .. } | LedgerError::UnsupportedUndo(_) => {
                AppError::Unprocessable(msg)
            }
            LedgerError::InvalidRequest(_) => AppError::BadRequest(msg),
            LedgerError::Store(store) => store.into(),
        }
    }
}

impl From<PassError> for AppError {
    fn from(err: PassError) -> Self {
        match err {
            PassError::Store(store) => store.into(),
        }
    }
}

impl From<ReplayError> for AppError {
    fn from(err: ReplayError) -> Self {
        match err {
            ReplayError::Parse(_) | ReplayError::Mismatch(_) => {
                AppError::Unprocessable(err.to_string())
            }
            ReplayError::Network(_) | ReplayError::Http { .. } | ReplayError::RateLimited => {
                AppError::Upstream(err.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        if status.is_server_error() {
            tracing::error!(status = %status, error = %error_message, "Request failed");
        }

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
