use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::Instrument;
use uuid::Uuid;

use planforge_core::plan::PlanRequest;
use planforge_core::{ErrorKind, PlanError, PlanPipeline};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl From<PlanError> for AppError {
    fn from(err: PlanError) -> Self {
        match err.kind() {
            ErrorKind::Validation => Self::bad_request(err.to_string()),
            _ => Self::internal(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GeneratePlanBody {
    description: Option<String>,
    strategy: Option<String>,
}

/// Decode and validate a `/generate-plan` body.
fn parse_plan_request(body: &[u8]) -> Result<PlanRequest, AppError> {
    let parsed: GeneratePlanBody =
        serde_json::from_slice(body).map_err(|_| AppError::bad_request("Missing JSON body"))?;

    match parsed.description {
        Some(description) if !description.trim().is_empty() => {
            Ok(PlanRequest::new(description, parsed.strategy))
        }
        _ => Err(PlanError::Validation("description is required".to_string()).into()),
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<PlanPipeline>,
}

impl AppState {
    pub fn new(pipeline: PlanPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/generate-plan", post(generate_plan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(pipeline: PlanPipeline, bind: &str, port: u16) -> Result<()> {
    let app = build_router(AppState::new(pipeline));
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("planforge serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("planforge serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C; shutting down");
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn liveness() -> &'static str {
    "planforge is up"
}

async fn generate_plan(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<axum::response::Response, AppError> {
    let request = parse_plan_request(&body)?;

    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("generate_plan", %request_id, strategy = %request.strategy);
    let outcome = state.pipeline.run(&request).instrument(span).await?;

    tracing::info!(
        %request_id,
        generation_calls = outcome.generation_calls,
        audit_calls = outcome.audit_calls,
        score = outcome.envelope.audit_score,
        "plan delivered"
    );
    Ok(Json(outcome.envelope).into_response())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
