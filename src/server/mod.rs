//! HTTP ingestion endpoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::error::{EmbeddingError, VectorStoreError};
use crate::models::{DEFAULT_N_RESULTS, Document};
use crate::services::AsyncVectorStore;

pub type SharedStore = Arc<dyn AsyncVectorStore>;

/// Shared state for all handlers.
pub struct AppState {
    /// Connected store with an active collection; without one, log lines are
    /// acknowledged but not stored.
    store: Option<SharedStore>,
    received: AtomicU64,
}

impl AppState {
    pub fn new(store: Option<SharedStore>) -> Self {
        Self {
            store,
            received: AtomicU64::new(0),
        }
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("no vector store configured; start the server with --store")]
    NoStore,

    #[error(transparent)]
    Store(#[from] VectorStoreError),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NoStore => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Store(e) => match e {
                VectorStoreError::Validation(_)
                | VectorStoreError::Embedding(EmbeddingError::Validation) => {
                    StatusCode::BAD_REQUEST
                }
                VectorStoreError::NotConnected(_) => StatusCode::SERVICE_UNAVAILABLE,
                VectorStoreError::Upstream(_)
                | VectorStoreError::Schema(_)
                | VectorStoreError::Embedding(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(target: "server", "request failed: {self}");
        } else {
            tracing::warn!(target: "server", "request rejected: {self}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct LogRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub text: String,
    #[serde(default)]
    pub n_results: Option<usize>,
}

async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Chroma ingestion API is running" }))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json("Healthy"))
}

async fn ingest_log(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LogRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }

    let document = Document::from_log_message(&request.message);
    let id = document.id.clone();
    state.received.fetch_add(1, Ordering::Relaxed);

    let stored = match state.store {
        Some(ref store) => {
            store.insert_documents(vec![document]).await?;
            true
        }
        None => false,
    };
    tracing::info!(target: "server", %id, stored, "received log line");

    Ok(Json(json!({
        "status": "ok",
        "id": id,
        "received": request.message,
        "stored": stored,
    })))
}

async fn query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.as_ref().ok_or(ApiError::NoStore)?;
    let n_results = request.n_results.unwrap_or(DEFAULT_N_RESULTS);
    if n_results == 0 {
        return Err(ApiError::BadRequest("n_results must be at least 1".to_string()));
    }

    let results = store.query(&[request.text], n_results).await?;
    let matches: Vec<_> = results
        .first()
        .map(|r| r.ranked().into_iter().cloned().collect())
        .unwrap_or_default();

    Ok(Json(json!({ "results": matches })))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/ingest/log", post(ingest_log))
        .route("/query", post(query))
        .with_state(state)
}

/// Serve until Ctrl+C.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(target: "server", %addr, "listening");
    eprintln!("Listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!(target: "server", "received SIGINT, shutting down");
        })
        .await
}
