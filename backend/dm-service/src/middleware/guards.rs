//! Caller identity extracted at the type level, so handlers cannot forget to authenticate.

use std::future::{ready, Ready};

use actix_web::{dev::Payload, Error, FromRequest, HttpRequest};
use uuid::Uuid;

use crate::error::AppError;

/// Header carrying the user id authenticated by the upstream gateway.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// The authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct User {
    pub id: Uuid,
}

impl FromRequest for User {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user_id = req
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value.trim()).ok());

        ready(match user_id {
            Some(id) => Ok(User { id }),
            None => Err(AppError::Unauthorized.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[actix_web::test]
    async fn test_extracts_user_from_header() {
        let id = Uuid::new_v4();
        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, id.to_string()))
            .to_http_request();

        let user = User::extract(&req).await.unwrap();
        assert_eq!(user.id, id);
    }

    #[actix_web::test]
    async fn test_missing_or_garbage_header_is_rejected() {
        let req = TestRequest::default().to_http_request();
        assert!(User::extract(&req).await.is_err());

        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, "not-a-uuid"))
            .to_http_request();
        assert!(User::extract(&req).await.is_err());
    }
}
