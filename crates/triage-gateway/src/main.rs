//! Triage gateway: `POST /api/extract` turns a finished call transcript into a clinical
//! triage record. Binds to `TRIAGE_HOST:TRIAGE_PORT` (default 127.0.0.1:8000).

mod app;

use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use triage_core::{AnthropicModel, ExtractionPipeline, TriageConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = TriageConfig::load()?;
    let model = AnthropicModel::from_config(&config);
    if !model.has_credential() {
        warn!("ANTHROPIC_API_KEY is not set; extraction requests will fail until it is");
    }
    info!(model = model.model(), timeout = ?config.model_timeout(), "Extraction model configured");

    let pipeline = ExtractionPipeline::new(Arc::new(model), config.model_timeout());
    let state = Arc::new(app::AppState::new(pipeline));
    let app = app::build_app(state, &config.origins());

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚑 Triage gateway listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
