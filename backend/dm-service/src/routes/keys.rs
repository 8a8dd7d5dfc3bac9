use crate::error::AppError;
use crate::middleware::guards::User;
use crate::state::AppState;
use actix_web::{get, put, web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RegisterKeyRequest {
    pub public_key_pem: String,
}

/// Register or rotate the caller's public key.
/// PUT /api/v1/keys
#[put("/api/v1/keys")]
pub async fn register_key(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<RegisterKeyRequest>,
) -> Result<HttpResponse, AppError> {
    let key = state
        .service
        .register_key(user.id, &body.public_key_pem)
        .await?;
    Ok(HttpResponse::Ok().json(key))
}

/// GET /api/v1/keys/{user_id}
#[get("/api/v1/keys/{user_id}")]
pub async fn get_key(
    state: web::Data<AppState>,
    _user: User,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let key = state.service.lookup_key(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(key))
}
