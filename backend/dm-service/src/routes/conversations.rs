use crate::error::AppError;
use crate::middleware::guards::User;
use crate::models::PageQuery;
use crate::state::AppState;
use actix_web::{delete, get, web, HttpResponse};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct DeleteConversationResponse {
    pub deleted_count: u64,
}

/// GET /api/v1/conversations
#[get("/api/v1/conversations")]
pub async fn list_conversations(
    state: web::Data<AppState>,
    user: User,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let page = query.into_inner().into_page(state.config.default_page_size)?;
    let summaries = state.service.conversations(user.id, page).await?;
    Ok(HttpResponse::Ok().json(summaries))
}

/// GET /api/v1/conversations/{peer_id}/unread
#[get("/api/v1/conversations/{peer_id}/unread")]
pub async fn unread_count(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let unread_count = state.service.unread_count(user.id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(UnreadCountResponse { unread_count }))
}

/// Hide the conversation from the caller only. Succeeds even if nothing was left to hide.
/// DELETE /api/v1/conversations/{peer_id}
#[delete("/api/v1/conversations/{peer_id}")]
pub async fn delete_conversation(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let deleted_count = state
        .service
        .delete_conversation(user.id, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(DeleteConversationResponse { deleted_count }))
}
