//! Uniform error taxonomy and response shaping (spec C12 / §7).
//!
//! Grounded on the teacher's `api/vault_error.rs` (thiserror enum + a
//! `code()`-bearing response type) and `api_service/error.rs` (one error
//! type shared across the whole service layer).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::crypto::CryptoError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request data.")]
    Validation(String),

    #[error("Authentication required.")]
    Unauthorized,

    #[error("Request not allowed.")]
    CsrfInvalid,

    #[error("Vault already initialized.")]
    VaultExists,

    #[error("Vault not initialized.")]
    VaultNotInitialized,

    #[error("Vault unavailable.")]
    VaultInvalid,

    #[error("Too many attempts. Try again later.")]
    RateLimited,

    #[error("Entry not found.")]
    EntryNotFound,

    #[error("Entry unavailable.")]
    EntryUnavailable,

    #[error("Import failed.")]
    ImportFailed,

    #[error("Unexpected error.")]
    Internal,
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::CsrfInvalid => "CSRF_INVALID",
            AppError::VaultExists => "VAULT_EXISTS",
            AppError::VaultNotInitialized => "VAULT_NOT_INITIALIZED",
            AppError::VaultInvalid => "VAULT_INVALID",
            AppError::RateLimited => "RATE_LIMITED",
            AppError::EntryNotFound => "ENTRY_NOT_FOUND",
            AppError::EntryUnavailable => "ENTRY_UNAVAILABLE",
            AppError::ImportFailed => "IMPORT_FAILED",
            AppError::Internal => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::CsrfInvalid => StatusCode::FORBIDDEN,
            AppError::VaultExists => StatusCode::CONFLICT,
            AppError::VaultNotInitialized => StatusCode::BAD_REQUEST,
            AppError::VaultInvalid => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::EntryNotFound => StatusCode::NOT_FOUND,
            AppError::EntryUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ImportFailed => StatusCode::BAD_REQUEST,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Validation(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, AppError::Internal) {
            tracing::error!("internal error");
        }

        let status = self.status_code();
        let body = ErrorEnvelope {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.message(),
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Crypto integrity failures never surface the underlying cause; callers
/// decide per spec §7 whether that maps to ENTRY_UNAVAILABLE (stored data)
/// or a user-facing "Invalid backup file." response (backup import).
///
/// `PasswordLength`/`SaltLength` are input-validation failures, not
/// decrypt-integrity failures — they fall out of `derive_master_key` when a
/// caller skips its own length pre-check (e.g. an export password) and have
/// nothing to do with entries, so they map to a bare internal error instead
/// of `EntryUnavailable`.
impl From<CryptoError> for AppError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::PasswordLength | CryptoError::SaltLength => AppError::Internal,
            _ => AppError::EntryUnavailable,
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        tracing::error!(error = %err, "record store error");
        AppError::Internal
    }
}

pub type AppResult<T> = Result<T, AppError>;
