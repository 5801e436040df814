//! HTTP front end for the OCR pipeline.
//!
//! - `POST /api/ocr`: multipart upload with an `image` (or `file`) field
//! - `GET /api/status`: active backend and whether it can run

mod handlers;
mod routes;

pub use handlers::status_for;
pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Settings;
use crate::pipeline::Pipeline;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub async fn new(settings: &Settings) -> anyhow::Result<Self> {
        let pipeline = Pipeline::new(settings)?;
        pipeline.store().ensure_dir().await?;

        let backend = pipeline.backend();
        if !backend.is_available() {
            tracing::warn!(
                "{} backend is not available: {}",
                backend.backend_type(),
                backend.availability_hint()
            );
        }

        Ok(Self {
            pipeline: Arc::new(pipeline),
        })
    }

    pub fn from_pipeline(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Start the web server.
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(settings).await?;
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
