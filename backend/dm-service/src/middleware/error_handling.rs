use crate::error::{AppError, ErrorKind};
use actix_web::{http::StatusCode, HttpResponse};
use error_types::{error_types as families, ErrorResponse};

/// Map a domain error to its HTTP status and wire body.
///
/// Infrastructure failures are logged here and replaced with a generic message so that
/// driver errors never reach the client.
pub fn map_error(err: &AppError) -> (StatusCode, ErrorResponse) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let error_type = match err.kind() {
        ErrorKind::Validation => families::VALIDATION_ERROR,
        ErrorKind::Unauthorized => families::AUTHENTICATION_ERROR,
        ErrorKind::PermissionDenied => families::AUTHORIZATION_ERROR,
        ErrorKind::NotFound => families::NOT_FOUND_ERROR,
        ErrorKind::Crypto => families::CRYPTO_ERROR,
        ErrorKind::Conflict => families::CONFLICT_ERROR,
        ErrorKind::Internal => families::SERVER_ERROR,
    };

    let message = match err.kind() {
        ErrorKind::Internal => {
            tracing::error!(error = %err, "request failed");
            "internal server error".to_string()
        }
        _ => err.to_string(),
    };

    let response = ErrorResponse::new(
        status.canonical_reason().unwrap_or("Error"),
        &message,
        status.as_u16(),
        error_type,
        err.error_code(),
    );

    (status, response)
}

pub fn into_response(err: &AppError) -> HttpResponse {
    let (status, response) = map_error(err);
    HttpResponse::build(status).json(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Resource;

    #[test]
    fn test_permission_denied_maps_to_403() {
        let (status, body) = map_error(&AppError::PermissionDenied("blocked".into()));
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.error, "Forbidden");
        assert_eq!(body.code, "PERMISSION_DENIED");
        assert_eq!(body.error_type, "authorization_error");
    }

    #[test]
    fn test_database_details_are_hidden() {
        let (status, body) = map_error(&AppError::Database(sqlx::Error::PoolTimedOut));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message, "internal server error");
        assert_eq!(body.code, "DATABASE_ERROR");
    }

    #[test]
    fn test_missing_key_maps_to_404() {
        let (status, body) = map_error(&AppError::NotFound(Resource::PublicKey));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.message, "public key not found");
    }
}
