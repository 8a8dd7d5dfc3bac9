//! HTTP surface: routing, the caller guard and error bodies.

mod common;

use std::sync::Arc;

use actix_web::{http::StatusCode, test, web, App};
use common::{Harness, INTEGRITY_SECRET};
use dm_service::config::{Config, StorageBackend};
use dm_service::middleware::guards::USER_ID_HEADER;
use dm_service::routes;
use dm_service::state::AppState;
use serde_json::{json, Value};
use uuid::Uuid;
use zeroize::Zeroizing;

fn app_state(h: &Harness) -> AppState {
    let config = Config {
        storage: StorageBackend::Memory,
        db: None,
        port: 0,
        integrity_key: Zeroizing::new(INTEGRITY_SECRET.to_vec()),
        default_page_size: 20,
        max_page_size: 100,
    };
    AppState::new(h.service.clone(), Arc::new(config))
}

macro_rules! init_app {
    ($h:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(app_state(&$h)))
                .configure(routes::configure),
        )
        .await
    };
}

fn as_user(req: test::TestRequest, user: Uuid) -> test::TestRequest {
    req.insert_header((USER_ID_HEADER, user.to_string()))
}

#[actix_web::test]
async fn test_missing_caller_is_unauthorized() {
    let h = Harness::new();
    let app = init_app!(h);

    let req = test::TestRequest::get()
        .uri("/api/v1/conversations")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[actix_web::test]
async fn test_send_and_read_over_http() {
    let h = Harness::new();
    let u1 = h.user_with_key(0).await;
    let u2 = h.user_with_key(1).await;
    let app = init_app!(h);

    let req = as_user(test::TestRequest::post().uri("/api/v1/messages"), u1)
        .set_json(json!({ "receiver_id": u2, "plaintext": "hello" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let sent: Value = test::read_body_json(resp).await;
    let message_id = sent["message_id"].as_str().unwrap().to_string();
    assert!(sent["conversation_id"].is_string());

    let req = as_user(
        test::TestRequest::get().uri(&format!("/api/v1/conversations/{u1}/unread")),
        u2,
    )
    .to_request();
    let unread: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(unread["unread_count"], 1);

    let req = as_user(
        test::TestRequest::get().uri(&format!("/api/v1/conversations/{u1}/messages")),
        u2,
    )
    .to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    let entries = page.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["message_id"], message_id.as_str());
    assert_eq!(entries[0]["sender_id"], u1.to_string().as_str());
    assert_eq!(entries[0]["is_read"], true);
    assert!(entries[0]["wrapped_key"].is_string());
    assert!(entries[0].get("wrapped_key_for_sender").is_none());

    let req = as_user(test::TestRequest::get().uri("/api/v1/conversations"), u1).to_request();
    let list: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(list[0]["other_user_id"], u2.to_string().as_str());
}

#[actix_web::test]
async fn test_self_message_returns_validation_body() {
    let h = Harness::new();
    let u1 = h.user_with_key(0).await;
    let app = init_app!(h);

    let req = as_user(test::TestRequest::post().uri("/api/v1/messages"), u1)
        .set_json(json!({ "receiver_id": u1, "plaintext": "hi" }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "SELF_MESSAGE");
    assert_eq!(body["error_type"], "validation_error");
}

#[actix_web::test]
async fn test_malformed_input_is_a_validation_error() {
    let h = Harness::new();
    let u1 = h.user_with_key(0).await;
    let app = init_app!(h);

    let req = as_user(test::TestRequest::post().uri("/api/v1/messages"), u1)
        .set_json(json!({ "receiver_id": "not-a-uuid", "plaintext": "hi" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let req = as_user(
        test::TestRequest::get().uri("/api/v1/conversations/not-a-uuid/messages"),
        u1,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = as_user(
        test::TestRequest::get().uri("/api/v1/conversations?page=0"),
        u1,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_blocked_send_is_forbidden() {
    let h = Harness::new();
    let u1 = h.user_with_key(0).await;
    let u2 = h.user_with_key(1).await;
    h.directory.block(u2, u1);
    let app = init_app!(h);

    let req = as_user(test::TestRequest::post().uri("/api/v1/messages"), u1)
        .set_json(json!({ "receiver_id": u2, "plaintext": "hi" }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "PERMISSION_DENIED");
}

#[actix_web::test]
async fn test_delete_and_mark_read_endpoints() {
    let h = Harness::new();
    let u1 = h.user_with_key(0).await;
    let u2 = h.user_with_key(1).await;
    h.service.send(u1, u2, b"one").await.unwrap();
    h.service.send(u1, u2, b"two").await.unwrap();
    let app = init_app!(h);

    let req = as_user(
        test::TestRequest::post().uri(&format!("/api/v1/conversations/{u1}/read")),
        u2,
    )
    .to_request();
    let marked: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(marked["marked"], 2);

    let req = as_user(
        test::TestRequest::delete().uri(&format!("/api/v1/conversations/{u2}")),
        u1,
    )
    .to_request();
    let deleted: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(deleted["deleted_count"], 2);

    let req = as_user(
        test::TestRequest::delete().uri(&format!("/api/v1/conversations/{u2}")),
        u1,
    )
    .to_request();
    let deleted: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(deleted["deleted_count"], 0);
}

#[actix_web::test]
async fn test_key_endpoints() {
    let h = Harness::new();
    let user = h.directory.add_user();
    let app = init_app!(h);

    let req = as_user(
        test::TestRequest::get().uri(&format!("/api/v1/keys/{user}")),
        user,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "PUBLIC_KEY_NOT_FOUND");

    let req = as_user(test::TestRequest::put().uri("/api/v1/keys"), user)
        .set_json(json!({ "public_key_pem": common::public_key_pem(2) }))
        .to_request();
    let registered: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(registered["user_id"], user.to_string().as_str());

    let req = as_user(
        test::TestRequest::get().uri(&format!("/api/v1/keys/{user}")),
        user,
    )
    .to_request();
    let fetched: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(fetched["fingerprint"], registered["fingerprint"]);
}

#[actix_web::test]
async fn test_health_endpoint() {
    let h = Harness::new();
    let app = init_app!(h);

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
