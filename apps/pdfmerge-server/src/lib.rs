//! PDF merge web server
//!
//! Provides endpoints for:
//! - Uploading PDFs into a scratch directory
//! - Merging uploads, in a chosen order, into the output directory
//! - Downloading results and clearing the scratch directory

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub mod error;
pub mod handlers;
pub mod models;
pub mod state;
pub mod template;

pub use error::ApiError;
pub use state::AppState;

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/upload", post(handlers::upload))
        .route("/merge", post(handlers::merge))
        .route("/download/:filename", get(handlers::download))
        .route("/clear", post(handlers::clear))
        .route("/files", get(handlers::list_files))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
