//! Error types and HTTP response mapping.
//!
//! `AppError` is the single failure type of every handler and middleware. Each
//! variant maps to exactly one status code and JSON body, so a request either
//! fully succeeds or fails with one error envelope.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    constants::{
        FORBIDDEN_MSG, INVALID_DATA_MSG, NOT_FOUND_MSG, SERVER_ERROR_MSG, TOO_MANY_ATTEMPTS_MSG,
        UNAUTHENTICATED_MSG, USER_LOGIN_FAILED_MSG,
    },
    repository::RepoError,
    validation::ValidationErrors,
};

/// Top-level application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed, missing or conflicting input on a resource endpoint (422).
    #[error("invalid data: {0}")]
    InvalidData(ValidationErrors),

    /// Malformed input on the registration and sign-in endpoints (400).
    #[error("bad request: {0}")]
    BadRequest(ValidationErrors),

    #[error("not found")]
    NotFound,

    /// Role, ownership or business-rule failure (403).
    #[error("forbidden")]
    Forbidden,

    /// Missing, unknown, revoked or expired bearer token (401).
    #[error("unauthenticated")]
    Unauthenticated,

    /// Credentials did not match a stored user (401).
    #[error("login failed")]
    LoginFailed,

    #[error("too many attempts")]
    TooManyAttempts,

    /// Storage failure other than a missing row.
    #[error(transparent)]
    Database(RepoError),

    #[error(transparent)]
    Hash(#[from] bcrypt::BcryptError),

    /// Anything else; the message is logged, never returned.
    #[error("{0}")]
    Internal(String),
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => AppError::NotFound,
            // A storage-level uniqueness violation means a business rule already
            // guarded by the middleware chain was raced past.
            RepoError::Conflict(_) => AppError::Forbidden,
            other => AppError::Database(other),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidData(ValidationErrors::from(rejection))
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::InvalidData(errors)
    }
}

/// A path segment that does not parse as an id cannot name a stored row.
impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!("path rejected: {}", rejection.body_text());
        AppError::NotFound
    }
}

impl AppError {
    /// Re-labels a validation failure as 400, used by the auth endpoints.
    pub fn into_bad_request(self) -> Self {
        match self {
            AppError::InvalidData(errors) => AppError::BadRequest(errors),
            other => other,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidData(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Unauthenticated | AppError::LoginFailed => StatusCode::UNAUTHORIZED,
            AppError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_) | AppError::Hash(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// `{"error": "..."}` envelope.
#[derive(Debug, Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

/// `{"message": "..."}` envelope, used for successes and for the 401/429 framework-style errors.
#[derive(Debug, Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            AppError::InvalidData(errors) | AppError::BadRequest(errors) => {
                tracing::debug!(%errors, "request rejected by validation");
                error_body(status, INVALID_DATA_MSG)
            }
            AppError::NotFound => error_body(status, NOT_FOUND_MSG),
            AppError::Forbidden => error_body(status, FORBIDDEN_MSG),
            AppError::LoginFailed => error_body(status, USER_LOGIN_FAILED_MSG),
            AppError::Unauthenticated => {
                (status, Json(MessageBody::new(UNAUTHENTICATED_MSG))).into_response()
            }
            AppError::TooManyAttempts => {
                (status, Json(MessageBody::new(TOO_MANY_ATTEMPTS_MSG))).into_response()
            }
            err => {
                tracing::error!("internal error: {}", err);
                error_body(status, SERVER_ERROR_MSG)
            }
        }
    }
}
