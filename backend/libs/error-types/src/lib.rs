//! Wire format and stable codes for API errors returned by Nova messaging services.

use serde::{Deserialize, Serialize};

/// Unified API error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP reason phrase, e.g. "Forbidden"
    pub error: String,

    /// Human readable message. Never carries plaintext or key material.
    pub message: String,

    /// HTTP status code
    pub status: u16,

    /// Error family, one of [`error_types`]
    pub error_type: String,

    /// Stable machine-readable code, one of [`error_codes`]
    pub code: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    /// ISO 8601
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str, status: u16, error_type: &str, code: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            status,
            error_type: error_type.to_string(),
            code: code.to_string(),
            trace_id: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_trace_id(mut self, trace_id: String) -> Self {
        self.trace_id = Some(trace_id);
        self
    }
}

pub mod error_codes {
    // Validation
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const SELF_MESSAGE: &str = "SELF_MESSAGE";
    pub const INVALID_PUBLIC_KEY: &str = "INVALID_PUBLIC_KEY";

    // Lookup
    pub const USER_NOT_FOUND: &str = "USER_NOT_FOUND";
    pub const PUBLIC_KEY_NOT_FOUND: &str = "PUBLIC_KEY_NOT_FOUND";
    pub const NOT_FOUND: &str = "NOT_FOUND";

    // Permission
    pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";

    // Crypto
    pub const CRYPTO_ERROR: &str = "CRYPTO_ERROR";

    // Storage/System
    pub const CONFLICT: &str = "CONFLICT";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
}

pub mod error_types {
    pub const VALIDATION_ERROR: &str = "validation_error";
    pub const AUTHENTICATION_ERROR: &str = "authentication_error";
    pub const AUTHORIZATION_ERROR: &str = "authorization_error";
    pub const NOT_FOUND_ERROR: &str = "not_found_error";
    pub const CRYPTO_ERROR: &str = "crypto_error";
    pub const CONFLICT_ERROR: &str = "conflict_error";
    pub const SERVER_ERROR: &str = "server_error";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_creation() {
        let error = ErrorResponse::new(
            "Forbidden",
            "permission denied",
            403,
            error_types::AUTHORIZATION_ERROR,
            error_codes::PERMISSION_DENIED,
        );

        assert_eq!(error.status, 403);
        assert_eq!(error.error_type, error_types::AUTHORIZATION_ERROR);
        assert_eq!(error.code, error_codes::PERMISSION_DENIED);
        assert!(error.trace_id.is_none());
    }

    #[test]
    fn test_trace_id_is_omitted_when_absent() {
        let error = ErrorResponse::new(
            "Not Found",
            "not found",
            404,
            error_types::NOT_FOUND_ERROR,
            error_codes::USER_NOT_FOUND,
        );
        let json = serde_json::to_value(&error).unwrap();
        assert!(json.get("trace_id").is_none());

        let json = serde_json::to_value(error.with_trace_id("abc".into())).unwrap();
        assert_eq!(json["trace_id"], "abc");
    }
}
