//! Embedding client for an Ollama-compatible embedding server.

use std::time::Duration;

use serde::Serialize;

use crate::error::EmbeddingError;
use crate::models::{EmbeddingApi, EmbeddingConfig};
use crate::services::batch::{Batch, BatchPlan, parse_embed_response, parse_legacy_response};

/// Request body for `POST /api/embed`.
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Request body for the legacy `POST /api/embeddings`.
#[derive(Debug, Serialize)]
struct LegacyEmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

/// Turns texts into vectors. Output is aligned with the input; blank texts map
/// to `None`.
pub trait Embedder: Send + Sync {
    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>, EmbeddingError>;

    fn model(&self) -> &str;
}

/// Settings shared by the blocking and async clients.
#[derive(Debug, Clone)]
struct Endpoint {
    base_url: String,
    model: String,
    batch_size: usize,
    api: EmbeddingApi,
}

impl Endpoint {
    fn from_config(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        if config.model.trim().is_empty() {
            tracing::error!(
                target: "embedding",
                "missing model in [Embedding] section; expected e.g. `model = nomic-embed-text`"
            );
            return Err(EmbeddingError::Configuration(
                "missing [Embedding] model".to_string(),
            ));
        }
        if config.host.trim().is_empty() {
            return Err(EmbeddingError::Configuration(
                "missing [Embedding] host".to_string(),
            ));
        }
        if config.batch_size == 0 {
            return Err(EmbeddingError::Configuration(
                "batch size must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            base_url: config.host.trim().trim_end_matches('/').to_string(),
            model: config.model.trim().to_string(),
            batch_size: config.batch_size,
            api: config.api,
        })
    }

    fn url(&self) -> String {
        match self.api {
            EmbeddingApi::Embed => format!("{}/api/embed", self.base_url),
            EmbeddingApi::Embeddings => format!("{}/api/embeddings", self.base_url),
        }
    }

    /// The legacy endpoint takes one prompt per request.
    fn effective_batch_size(&self) -> usize {
        match self.api {
            EmbeddingApi::Embed => self.batch_size,
            EmbeddingApi::Embeddings => 1,
        }
    }
}

fn upstream_status(status: reqwest::StatusCode, body: &str) -> EmbeddingError {
    let preview: String = body.chars().take(200).collect();
    EmbeddingError::Upstream(format!("status {status}: {preview}"))
}

/// Blocking client used on the interactive path.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    client: reqwest::blocking::Client,
    endpoint: Endpoint,
}

impl EmbeddingClient {
    /// Create a new embedding client with the given configuration.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let endpoint = Endpoint::from_config(config)?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::Configuration(e.to_string()))?;

        Ok(Self { client, endpoint })
    }

    /// Get the base URL of the embedding server.
    pub fn base_url(&self) -> &str {
        &self.endpoint.base_url
    }

    /// Check that the embedding server answers at all.
    pub fn health_check(&self) -> Result<(), EmbeddingError> {
        let url = format!("{}/api/tags", self.endpoint.base_url);
        let response = self.client.get(&url).send()?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(upstream_status(status, &body));
        }
        Ok(())
    }

    fn embed_batch(&self, batch: Batch<'_>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = self.endpoint.url();
        let model = self.endpoint.model.as_str();

        let request = match self.endpoint.api {
            EmbeddingApi::Embed => self.client.post(&url).json(&EmbedRequest {
                model,
                input: batch.texts,
            }),
            EmbeddingApi::Embeddings => self.client.post(&url).json(&LegacyEmbedRequest {
                model,
                prompt: &batch.texts[0],
            }),
        };

        let response = request.send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(upstream_status(status, &body));
        }

        match self.endpoint.api {
            EmbeddingApi::Embed => parse_embed_response(&body, batch.len()),
            EmbeddingApi::Embeddings => parse_legacy_response(&body).map(|v| vec![v]),
        }
    }
}

impl Embedder for EmbeddingClient {
    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>, EmbeddingError> {
        let plan = BatchPlan::new(texts, self.endpoint.effective_batch_size())?;
        tracing::debug!(
            target: "embedding",
            texts = plan.input_len(),
            skipped = plan.skipped(),
            batches = plan.batch_count(),
            "embedding texts"
        );

        plan.run(|batch| {
            self.embed_batch(batch).inspect_err(|e| {
                tracing::error!(target: "embedding", offset = batch.offset, size = batch.len(), "batch failed: {e}");
            })
        })
    }

    fn model(&self) -> &str {
        &self.endpoint.model
    }
}

/// Async client used by the async HTTP store and the ingestion endpoint.
#[derive(Debug, Clone)]
pub struct AsyncEmbeddingClient {
    client: reqwest::Client,
    endpoint: Endpoint,
}

impl AsyncEmbeddingClient {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let endpoint = Endpoint::from_config(config)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::Configuration(e.to_string()))?;

        Ok(Self { client, endpoint })
    }

    pub fn model(&self) -> &str {
        &self.endpoint.model
    }

    pub async fn embed_texts(
        &self,
        texts: &[String],
    ) -> Result<Vec<Option<Vec<f32>>>, EmbeddingError> {
        let plan = BatchPlan::new(texts, self.endpoint.effective_batch_size())?;
        tracing::debug!(
            target: "embedding",
            texts = plan.input_len(),
            batches = plan.batch_count(),
            "embedding texts (async)"
        );

        let mut assembler = plan.assembler();
        for batch in plan.batches() {
            let embeddings = self.embed_batch(batch).await?;
            assembler.accept(batch, embeddings)?;
        }
        assembler.finish()
    }

    async fn embed_batch(&self, batch: Batch<'_>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = self.endpoint.url();
        let model = self.endpoint.model.as_str();

        let request = match self.endpoint.api {
            EmbeddingApi::Embed => self.client.post(&url).json(&EmbedRequest {
                model,
                input: batch.texts,
            }),
            EmbeddingApi::Embeddings => self.client.post(&url).json(&LegacyEmbedRequest {
                model,
                prompt: &batch.texts[0],
            }),
        };

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(upstream_status(status, &body));
        }

        match self.endpoint.api {
            EmbeddingApi::Embed => parse_embed_response(&body, batch.len()),
            EmbeddingApi::Embeddings => parse_legacy_response(&body).map(|v| vec![v]),
        }
    }
}
