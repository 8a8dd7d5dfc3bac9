use crate::error::AppError;
use crate::middleware::guards::User;
use crate::models::{MessageView, PageQuery};
use crate::state::AppState;
use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroizing;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub receiver_id: Uuid,
    pub plaintext: String,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub marked: u64,
}

/// Encrypt and store a direct message.
/// POST /api/v1/messages
#[post("/api/v1/messages")]
pub async fn send_message(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, AppError> {
    let SendMessageRequest {
        receiver_id,
        plaintext,
    } = body.into_inner();
    let plaintext = Zeroizing::new(plaintext);

    let sent = state
        .service
        .send(user.id, receiver_id, plaintext.as_bytes())
        .await?;

    Ok(HttpResponse::Created().json(sent))
}

/// Page of the conversation with `peer_id`, newest first. Marks the peer's messages read.
/// GET /api/v1/conversations/{peer_id}/messages
#[get("/api/v1/conversations/{peer_id}/messages")]
pub async fn get_messages(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<Uuid>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let peer_id = path.into_inner();
    let page = query.into_inner().into_page(state.config.default_page_size)?;

    let views: Vec<MessageView> = state
        .service
        .fetch(user.id, peer_id, page)
        .await?
        .into_iter()
        .filter_map(|m| MessageView::for_viewer(m, user.id))
        .collect();

    Ok(HttpResponse::Ok().json(views))
}

/// POST /api/v1/conversations/{peer_id}/read
#[post("/api/v1/conversations/{peer_id}/read")]
pub async fn mark_read(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let marked = state.service.mark_read(user.id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(MarkReadResponse { marked }))
}
