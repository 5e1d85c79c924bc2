//! Router, shared state, and handlers.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info, warn};
use triage_core::{
    ExtractionError, ExtractionFailure, ExtractionPipeline, ExtractionReply, ExtractionRequest,
};

pub struct AppState {
    pipeline: ExtractionPipeline,
}

impl AppState {
    pub fn new(pipeline: ExtractionPipeline) -> Self {
        Self { pipeline }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

pub fn build_app(state: Arc<AppState>, origins: &[String]) -> Router {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/extract", post(extract))
        .with_state(state)
        .layer(cors)
        .layer(axum::middleware::from_fn(log_request))
}

async fn log_request(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request handled"
    );
    response
}

async fn health() -> &'static str {
    "OK"
}

/// POST /api/extract: 200 `{result}`, 500 `{error, raw}` for unparseable model output,
/// 502 for model transport/credential failures, 504 when the model call times out.
async fn extract(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExtractionRequest>,
) -> Response {
    match state.pipeline.extract(&request).await {
        Ok(conformed) => (
            StatusCode::OK,
            Json(ExtractionReply {
                result: conformed.record,
            }),
        )
            .into_response(),
        Err(ExtractionError::Parse { error, raw }) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ExtractionFailure { error, raw }),
        )
            .into_response(),
        Err(e @ ExtractionError::Timeout(_)) => {
            error!("Extraction failed: {}", e);
            (
                StatusCode::GATEWAY_TIMEOUT,
                Json(ErrorBody { error: e.to_string() }),
            )
                .into_response()
        }
        Err(e @ ExtractionError::Model(_)) => {
            error!("Extraction failed: {}", e);
            (StatusCode::BAD_GATEWAY, Json(ErrorBody { error: e.to_string() })).into_response()
        }
    }
}
