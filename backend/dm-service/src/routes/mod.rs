pub mod conversations;
pub mod keys;
pub mod messages;

use actix_web::web;

use crate::error::AppError;
use crate::metrics;

/// Register every dm-service endpoint. Malformed bodies, queries and path ids are reported as
/// validation errors in the standard error body.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::Validation(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::Validation(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| AppError::Validation(err.to_string()).into()),
    );

    cfg.service(messages::send_message)
        .service(messages::get_messages)
        .service(messages::mark_read)
        .service(conversations::list_conversations)
        .service(conversations::unread_count)
        .service(conversations::delete_conversation)
        .service(keys::register_key)
        .service(keys::get_key)
        .route("/health", web::get().to(|| async { "OK" }))
        .route("/metrics", web::get().to(metrics::serve_metrics));
}
