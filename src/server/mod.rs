//! HTTP service exposing analysis and signature search.
//!
//! Routes:
//! - `GET /` health check
//! - `POST /analyze-content` multipart `file` plus optional `document_type`
//! - `POST /find-signatures` multipart `file` plus optional `keywords`

mod handlers;
mod routes;

pub use routes::{create_router, MAX_UPLOAD_BYTES};

use std::net::SocketAddr;
use std::sync::Arc;

use crate::analysis::DocumentAnalyzer;

/// Shared state for the server.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<DocumentAnalyzer>,
}

impl AppState {
    pub fn new(analyzer: DocumentAnalyzer) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
        }
    }
}

/// Start the server and run until the process is stopped.
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
