//! Bookshelf Backend
//!
//! A multi-tenant book catalog REST backend with SQLite persistence.
//! Every book, tag and review is owned by exactly one authenticated user.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod images;
mod models;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use images::ImageStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub images: Arc<ImageStore>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Bookshelf Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Media path: {:?}", config.media_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    // Initialize media storage
    let image_store = Arc::new(ImageStore::new(config.media_path.clone()));

    // Create application state
    let state = AppState {
        repo,
        images: image_store,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Signup and token exchange are the only unauthenticated API routes
    let public_routes = Router::new()
        .route("/users", post(api::create_user))
        .route("/users/token", post(api::create_token));

    let protected_routes = Router::new()
        // Account
        .route("/users/me", get(api::me))
        // Books
        .route("/books", get(api::list_books))
        .route("/books", post(api::create_book))
        .route("/books/{id}", get(api::get_book))
        .route("/books/{id}", patch(api::patch_book))
        .route("/books/{id}", put(api::put_book))
        .route("/books/{id}", delete(api::delete_book))
        .route("/books/{id}/upload-image", post(api::upload_book_image))
        // Tags
        .route("/tags", get(api::list_tags))
        .route("/tags/{id}", patch(api::update_tag))
        .route("/tags/{id}", delete(api::delete_tag))
        // Reviews
        .route("/reviews", get(api::list_reviews))
        .route("/reviews/{id}", patch(api::update_review))
        .route("/reviews/{id}", delete(api::delete_review))
        // Resolve the bearer token before any handler runs
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
