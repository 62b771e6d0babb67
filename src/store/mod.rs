//! Snapshot store: accepts captured documents over HTTP and re-serves them
//! by identifier until they expire.

pub mod client;
pub mod error;
pub mod handlers;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::StoreConfig;

pub use client::upload_snapshot;
pub use error::StoreError;
pub use handlers::{UploadRequest, UploadResponse};
pub use state::{ReadOutcome, SnapshotMetadata, StoreState, StoredSnapshot};

/// Build the store router over shared state.
pub fn router(state: Arc<StoreState>) -> Router {
    // The framework-level limit is a backstop above the explicit ceiling
    // check, sized to leave room for JSON framing around the document.
    let body_limit = state.config.max_upload_bytes.saturating_mul(2);

    Router::new()
        .route("/api/upload", post(handlers::upload))
        .route("/{id}", get(handlers::fetch_snapshot))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the store server until the process is stopped.
pub async fn run(config: StoreConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = config.listen_addr.parse()?;
    let state = Arc::new(StoreState::new(config));
    let app = router(state);

    log::info!("snapshot store listening on {addr}");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
