use crate::middleware::error_handling;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use crypto_core::CryptoError;
use std::fmt;
use thiserror::Error;

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(AppError::status_code(self)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        error_handling::into_response(self)
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Coarse error family exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    PermissionDenied,
    Crypto,
    Conflict,
    Unauthorized,
    Internal,
}

/// What a [`AppError::NotFound`] failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    User,
    PublicKey,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Resource::User => "user",
            Resource::PublicKey => "public key",
        })
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("cannot send a message to yourself")]
    SelfMessage,

    #[error("{0} not found")]
    NotFound(Resource),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Deliberately carries no detail.
    #[error("cryptographic operation failed")]
    Crypto,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal server error")]
    Internal,
}

impl From<CryptoError> for AppError {
    fn from(_: CryptoError) -> Self {
        AppError::Crypto
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) | AppError::SelfMessage => ErrorKind::Validation,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            AppError::Crypto => ErrorKind::Crypto,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::Unauthorized => ErrorKind::Unauthorized,
            AppError::Config(_)
            | AppError::StartServer(_)
            | AppError::Database(_)
            | AppError::Internal => ErrorKind::Internal,
        }
    }

    /// Returns whether this error is retryable (e.g., database connection timeout)
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Database(e) => {
                matches!(
                    e,
                    sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
                )
            }
            AppError::Internal => true,
            _ => false,
        }
    }

    /// Returns HTTP status code
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::PermissionDenied => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Crypto | ErrorKind::Internal => 500,
        }
    }

    /// Stable machine-readable code from [`error_types::error_codes`].
    pub fn error_code(&self) -> &'static str {
        use error_types::error_codes;

        match self {
            AppError::Validation(_) => error_codes::VALIDATION_ERROR,
            AppError::SelfMessage => error_codes::SELF_MESSAGE,
            AppError::NotFound(Resource::User) => error_codes::USER_NOT_FOUND,
            AppError::NotFound(Resource::PublicKey) => error_codes::PUBLIC_KEY_NOT_FOUND,
            AppError::PermissionDenied(_) => error_codes::PERMISSION_DENIED,
            AppError::Crypto => error_codes::CRYPTO_ERROR,
            AppError::Conflict(_) => error_codes::CONFLICT,
            AppError::Unauthorized => error_codes::UNAUTHORIZED,
            AppError::Database(_) => error_codes::DATABASE_ERROR,
            AppError::Config(_) | AppError::StartServer(_) | AppError::Internal => {
                error_codes::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Postgres unique-constraint violation (SQLSTATE 23505).
    pub fn is_unique_violation(&self) -> bool {
        match self {
            AppError::Database(sqlx::Error::Database(db_err)) => {
                db_err.code().as_deref() == Some("23505")
            }
            _ => false,
        }
    }
}
