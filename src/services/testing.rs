//! Local stand-in for an Ollama embedding server, for tests.
//!
//! Each text embeds to `[len, 1.0]`. The server runs on its own thread and
//! runtime so blocking clients can call it from plain `#[test]`s.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Embeddings,
    /// Answer with a body that has no embeddings field.
    WrongShape,
}

#[derive(Debug)]
struct Fake {
    reply: Reply,
    /// 1-based request number answered with a 500.
    fail_on: Option<usize>,
    calls: AtomicUsize,
    requests: Mutex<Vec<Value>>,
}

impl Fake {
    fn record(&self, body: Value) -> usize {
        self.requests.lock().unwrap().push(body);
        self.calls.fetch_add(1, Ordering::SeqCst) + 1
    }
}

fn vector(text: &Value) -> Vec<f32> {
    vec![text.as_str().unwrap_or_default().len() as f32, 1.0]
}

async fn embed(State(fake): State<Arc<Fake>>, Json(body): Json<Value>) -> Response {
    let call = fake.record(body.clone());
    if fake.fail_on == Some(call) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "model not loaded").into_response();
    }
    if fake.reply == Reply::WrongShape {
        return Json(json!({ "data": [] })).into_response();
    }
    let embeddings: Vec<Vec<f32>> = body["input"]
        .as_array()
        .map(|inputs| inputs.iter().map(vector).collect())
        .unwrap_or_default();
    Json(json!({ "embeddings": embeddings })).into_response()
}

async fn legacy(State(fake): State<Arc<Fake>>, Json(body): Json<Value>) -> Response {
    let call = fake.record(body.clone());
    if fake.fail_on == Some(call) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "model not loaded").into_response();
    }
    if fake.reply == Reply::WrongShape {
        return Json(json!({ "data": [] })).into_response();
    }
    Json(json!({ "embedding": vector(&body["prompt"]) })).into_response()
}

pub struct FakeEmbeddingServer {
    url: String,
    fake: Arc<Fake>,
}

impl FakeEmbeddingServer {
    pub fn start(reply: Reply, fail_on: Option<usize>) -> Self {
        let fake = Arc::new(Fake {
            reply,
            fail_on,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/api/embed", post(embed))
            .route("/api/embeddings", post(legacy))
            .with_state(fake.clone());

        // Bound before the thread starts, so early connections wait in the backlog.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();

        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                axum::serve(listener, app).await.unwrap();
            });
        });

        Self {
            url: format!("http://{addr}"),
            fake,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn calls(&self) -> usize {
        self.fake.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Value> {
        self.fake.requests.lock().unwrap().clone()
    }
}
