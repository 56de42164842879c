//! Thin HTTP wrapper around [`Pipeline::ask`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | `{"query": "..."}` → `{answer, sources}` |
//! | `POST` | `/rag` | Alias of `/ask` |
//! | `GET`  | `/health` | Liveness plus pipeline state |
//! | `GET`  | `/` | Endpoint listing |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_ready", "message": "pipeline not ready: ..." } }
//! ```
//!
//! | Error kind | Status | Code |
//! |------------|--------|------|
//! | Input (incl. missing `query`) | 400 | `bad_request` |
//! | NotReady | 503 | `not_ready` |
//! | Backend (timeout) | 504 | `backend_timeout` |
//! | Backend | 502 | `backend_unavailable` |
//! | Consistency | 500 | `consistency` |
//! | Storage | 500 | `internal` |
//!
//! The wrapper only maps status codes; it adds no behaviour to `ask`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use facility_rag_core::models::QaResult;
use facility_rag_core::{ErrorKind, RagError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::pipeline::Pipeline;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

/// Bind `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config, pipeline: Arc<Pipeline>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "listening");
    eprintln!("Serving on http://{}", config.server.bind);
    axum::serve(listener, router(pipeline)).await?;
    Ok(())
}

pub fn router(pipeline: Arc<Pipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/ask", post(handle_ask))
        .route("/rag", post(handle_ask))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { pipeline })
}

// ============ Error Handling ============

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

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let (status, code) = match err.kind() {
            ErrorKind::Input => (StatusCode::BAD_REQUEST, "bad_request"),
            ErrorKind::NotReady => (StatusCode::SERVICE_UNAVAILABLE, "not_ready"),
            ErrorKind::Backend if err.is_timeout() => {
                (StatusCode::GATEWAY_TIMEOUT, "backend_timeout")
            }
            ErrorKind::Backend => (StatusCode::BAD_GATEWAY, "backend_unavailable"),
            ErrorKind::Consistency => (StatusCode::INTERNAL_SERVER_ERROR, "consistency"),
            ErrorKind::Storage => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

/// A body that is not `{"query": "<string>"}` is a bad request like any
/// other input error.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: rejection.body_text(),
        }
    }
}

// ============ Handlers ============

#[derive(Deserialize)]
struct AskRequest {
    query: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<QaResult>, AppError> {
    let Json(req) = body?;
    tracing::info!(query = %req.query, "received query");
    match state.pipeline.ask(&req.query).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            tracing::warn!(error = %e, "query failed");
            Err(e.into())
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.pipeline.status().await;
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        state: status.state,
        error: status.error,
    })
}

async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "facility-rag",
        "endpoints": {
            "POST /ask": "Ask a question about the room logs",
            "POST /rag": "Alias of POST /ask",
            "GET /health": "Health check and pipeline state",
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use facility_rag_core::Backend;

    #[test]
    fn test_error_kind_to_status() {
        let cases = [
            (RagError::InvalidInput("empty".into()), StatusCode::BAD_REQUEST),
            (RagError::NotReady("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (
                RagError::InitializationFailed("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                RagError::BackendUnavailable {
                    backend: Backend::Generation,
                    message: "refused".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                RagError::BackendTimeout {
                    backend: Backend::Embedding,
                    timeout_secs: 30,
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                RagError::Consistency("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (RagError::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }
}
