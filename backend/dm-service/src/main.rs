use actix_web::{web, App, HttpServer};
use crypto_core::ContentIntegrity;
use dm_service::{
    config::{Config, StorageBackend},
    db,
    directory::InMemoryDirectory,
    error::AppError,
    logging, metrics, routes,
    services::MessagingService,
    state::{self, AppState},
};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    logging::init_tracing();
    let cfg = Arc::new(Config::from_env()?);
    tracing::info!(config = ?cfg, "loaded configuration");

    let integrity = ContentIntegrity::new(&cfg.integrity_key)
        .map_err(|e| AppError::Config(format!("integrity key: {e}")))?;

    let collaborators = match (cfg.storage, cfg.db.as_ref()) {
        (StorageBackend::Postgres, Some(db_cfg)) => {
            let pool = db::init_pool(db_cfg)
                .await
                .map_err(|e| AppError::StartServer(format!("db: {e}")))?;
            db::run_migrations(&pool)
                .await
                .map_err(|e| AppError::StartServer(format!("migrations: {e}")))?;
            state::postgres_collaborators(pool)
        }
        (StorageBackend::Postgres, None) => {
            return Err(AppError::Config("DATABASE_URL missing".into()));
        }
        (StorageBackend::Memory, _) => {
            tracing::warn!("using in-memory storage; data is lost on restart");
            state::memory_collaborators(Arc::new(InMemoryDirectory::open()))
        }
    };

    let service = Arc::new(
        MessagingService::new(collaborators, integrity).with_max_page_size(cfg.max_page_size),
    );
    let app_state = AppState::new(service, cfg.clone());

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting dm-service");

    HttpServer::new(move || {
        App::new()
            .wrap(metrics::MetricsMiddleware)
            .wrap(tracing_actix_web::TracingLogger::default())
            .app_data(web::Data::new(app_state.clone()))
            .configure(routes::configure)
    })
    .bind(&bind_addr)
    .map_err(|e| AppError::StartServer(format!("bind REST: {e}")))?
    .run()
    .await
    .map_err(|e| AppError::StartServer(format!("REST server: {e}")))
}
