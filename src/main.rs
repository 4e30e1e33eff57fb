mod config;
mod crypto;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;
mod storage;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::crypto::EnvelopeCodec;
use crate::db::Database;
use crate::storage::BlobStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub blobs: Arc<dyn BlobStore>,
    pub codec: Arc<EnvelopeCodec>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crypted_vault=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Crypted Vault...");

    // Load configuration
    let config = Config::load()?;
    let config = Arc::new(config);
    tracing::info!("Configuration loaded");

    // Initialize database
    let db = Database::new(&config.database.path).await?;
    db.run_migrations().await?;
    tracing::info!("Database initialized");

    // Cipher key
    let codec = EnvelopeCodec::from_secret(&config.encryption.key)
        .map_err(|e| anyhow::anyhow!("Invalid encryption key: {}", e))?;
    let codec = Arc::new(codec);

    // Blob store
    let blobs = storage::build_blob_store(&config.blob_store).await;
    tracing::info!("Blob store ready ({})", blobs.store_type());

    let state = AppState {
        db,
        config: config.clone(),
        blobs,
        codec,
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (signature checked in the handler)
    let public_routes = Router::new().route(
        "/webhooks/identity",
        post(handlers::webhooks::identity_webhook),
    );

    // Protected routes (session token required)
    let protected_routes = Router::new()
        .route("/upload", post(handlers::upload::upload_image))
        .route("/images", get(handlers::images::list_images))
        .route(
            "/image/:cid",
            get(handlers::images::get_image).delete(handlers::images::delete_image),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        .layer(DefaultBodyLimit::max(state.config.upload.max_size_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
