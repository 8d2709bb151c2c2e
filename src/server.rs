//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/search` | Run a natural-language product search |
//! | `POST` | `/api/search/invoke` | Same, with `{"input": ...}` / `{"output": ...}` wrapping |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Request / Response
//!
//! ```json
//! POST /api/search
//! { "query": "red screwdriver set" }
//!
//! 200 OK
//! {
//!   "products": [ { "product_id": "...", "brand": "...", "score": "0.92" } ],
//!   "query": { "original_query": "red screwdriver set", "product_category": "hand tools",
//!              "brand": null, "specs": { "color": "red" } },
//!   "available_brands": [ "Stanley", "Bosch" ]
//! }
//! ```
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "extraction_failed", "message": "..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `extraction_failed` (502),
//! `retrieval_failed` (502), `timeout` (504). A failed request never
//! carries a `products` field.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! search frontends.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use product_search_core::{SearchError, SearchPipeline, SearchResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::service;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    pipeline: Arc<SearchPipeline>,
}

/// Starts the HTTP server.
///
/// Builds the pipeline from `config` (loading the vocabulary and reading
/// credentials from the environment), binds to `[server].bind`, and serves
/// until the process is terminated. Any configuration problem surfaces here,
/// before the listener is bound.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = Arc::new(service::build_pipeline(config)?);
    run_server_with_pipeline(&config.server.bind, pipeline).await
}

/// Starts the HTTP server around an already-built pipeline.
///
/// Used by [`run_server`] and by tests that supply their own model and index.
pub async fn run_server_with_pipeline(
    bind_addr: &str,
    pipeline: Arc<SearchPipeline>,
) -> anyhow::Result<()> {
    let app = router(pipeline);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("search server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router with all routes and middleware.
pub fn router(pipeline: Arc<SearchPipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/search", post(handle_search))
        .route("/api/search/invoke", post(handle_invoke))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { pipeline })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"timeout"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        let message = err.to_string();
        if err.is_timeout() {
            return AppError {
                status: StatusCode::GATEWAY_TIMEOUT,
                code: "timeout".to_string(),
                message,
            };
        }
        let code = match err {
            SearchError::Extraction(_) => "extraction_failed",
            SearchError::Retrieval(_) => "retrieval_failed",
        };
        AppError {
            status: StatusCode::BAD_GATEWAY,
            code: code.to_string(),
            message,
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/search ============

/// Request body for `POST /api/search`.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// Free-text customer query, in any language.
    pub query: String,
}

async fn run(state: &AppState, req: SearchRequest) -> Result<SearchResponse, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    Ok(state.pipeline.handle(&req.query).await?)
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    run(&state, req).await.map(Json)
}

// ============ POST /api/search/invoke ============

#[derive(Debug, Deserialize)]
pub struct InvokeRequest {
    pub input: SearchRequest,
}

#[derive(Serialize)]
struct InvokeResponse {
    output: SearchResponse,
}

async fn handle_invoke(
    State(state): State<AppState>,
    Json(req): Json<InvokeRequest>,
) -> Result<Json<InvokeResponse>, AppError> {
    let output = run(&state, req.input).await?;
    Ok(Json(InvokeResponse { output }))
}
