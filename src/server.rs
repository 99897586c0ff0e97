//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Answer a question from the indexed documents |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! `POST /ask` takes `{"question": "...", "top_k": 3}` (`top_k` optional)
//! and returns:
//!
//! ```json
//! {
//!   "answer": "Expense reports are due on the fifth.",
//!   "sources": [{ "doc_id": "handbook.docx", "chunk_index": 4 }]
//! }
//! ```
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `bad_request` | 400 |
//! | `embedding_failed`, `store_unavailable`, `backend_error`, `internal` | 500 |
//! | `timeout` | 504 |
//!
//! Requests are served concurrently; handlers share only the read-only
//! answer service.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::answer::AnswerService;
use crate::error::RagError;
use crate::models::SourceRef;

#[derive(Clone)]
struct AppState {
    service: Arc<AnswerService>,
}

/// Build the router. Exposed separately from [`run_server`] for tests.
pub fn router(service: AnswerService) -> Router {
    let state = AppState {
        service: Arc::new(service),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ask", post(handle_ask))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Serve the API on `bind` until Ctrl-C.
pub async fn run_server(service: AnswerService, bind: &str) -> anyhow::Result<()> {
    let app = router(service);
    let listener = tokio::net::TcpListener::bind(bind).await?;

    println!("LocalMind API listening on http://{}", listener.local_addr()?);
    tracing::info!(bind, "server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let (status, code) = match &err {
            RagError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            RagError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            RagError::Embedding { .. } | RagError::DimensionMismatch { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "embedding_failed")
            }
            RagError::StoreUnavailable { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "store_unavailable")
            }
            RagError::Backend { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "backend_error"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        if status.is_server_error() {
            tracing::error!(error = %err, code, "request failed");
        }
        AppError {
            status,
            code,
            message: err.to_string(),
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

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    sources: Vec<SourceRef>,
}

async fn handle_ask(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let Json(req) = payload.map_err(|e| bad_request(e.body_text()))?;

    let answer = state.service.answer(&req.question, req.top_k).await?;
    Ok(Json(AskResponse {
        answer: answer.text,
        sources: answer.sources,
    }))
}
