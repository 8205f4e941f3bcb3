//! Async client for a remote Chroma server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use super::protocol::{
    AddRequest, CollectionResponse, CreateCollectionRequest, QueryRequest, QueryResponse, Routes,
    upstream,
};
use super::{AsyncVectorStore, InsertReport, assemble_query_results, attach_embeddings};
use crate::error::VectorStoreError;
use crate::models::{ChromaConfig, Document, Metadata, QueryMatch, QueryResult};
use crate::services::embedding::AsyncEmbeddingClient;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct AsyncHttpStore {
    config: ChromaConfig,
    connection: Option<(Client, Routes)>,
    collection: Option<CollectionResponse>,
    embedder: AsyncEmbeddingClient,
}

impl AsyncHttpStore {
    pub fn new(config: &ChromaConfig, embedder: AsyncEmbeddingClient) -> Self {
        Self {
            config: config.clone(),
            connection: None,
            collection: None,
            embedder,
        }
    }

    fn connection(&self) -> Result<(&Client, &Routes), VectorStoreError> {
        self.connection
            .as_ref()
            .map(|(client, routes)| (client, routes))
            .ok_or(VectorStoreError::NotConnected("create_client has not been called"))
    }

    fn collection_id(&self) -> Result<&str, VectorStoreError> {
        self.collection
            .as_ref()
            .map(|c| c.id.as_str())
            .ok_or(VectorStoreError::NotConnected("no active collection"))
    }

    async fn add(&self, documents: &[Document]) -> Result<(), VectorStoreError> {
        let (client, routes) = self.connection()?;
        let id = self.collection_id()?;
        let response = client
            .post(routes.collection_op(id, "add"))
            .json(&AddRequest::from_documents(documents)?)
            .send()
            .await?;
        check_status(response).await
    }

    async fn query_embeddings(
        &self,
        embeddings: &[Vec<f32>],
        n_results: usize,
    ) -> Result<Vec<Vec<QueryMatch>>, VectorStoreError> {
        if embeddings.is_empty() {
            return Ok(Vec::new());
        }
        let (client, routes) = self.connection()?;
        let id = self.collection_id()?;
        let response = client
            .post(routes.collection_op(id, "query"))
            .json(&QueryRequest::new(embeddings, n_results))
            .send()
            .await?;
        let parsed: QueryResponse = read_json(response).await?;
        parsed.into_matches(embeddings.len())
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, VectorStoreError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(upstream(status, &body));
    }
    serde_json::from_str(&body).map_err(|e| VectorStoreError::Schema(e.to_string()))
}

async fn check_status(response: Response) -> Result<(), VectorStoreError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(upstream(status, &body));
    }
    Ok(())
}

#[async_trait]
impl AsyncVectorStore for AsyncHttpStore {
    async fn create_client(&mut self) -> Result<(), VectorStoreError> {
        let routes = Routes::from_config(&self.config).inspect_err(|e| {
            tracing::error!(target: "chroma", "cannot create async HTTP client: {e}");
        })?;

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| VectorStoreError::Upstream(e.to_string()))?;

        check_status(client.get(routes.heartbeat()).send().await?).await?;
        tracing::info!(target: "chroma", url = routes.base_url(), "connected to Chroma (async)");

        self.connection = Some((client, routes));
        self.collection = None;
        Ok(())
    }

    async fn get_collection(&mut self, name: &str) -> Result<(), VectorStoreError> {
        let name = name.trim();
        let (client, routes) = self.connection()?;
        if name.is_empty() {
            return Err(VectorStoreError::Validation(
                "collection name must not be empty".to_string(),
            ));
        }

        let response = client
            .post(routes.collections())
            .json(&CreateCollectionRequest::get_or_create(name, self.config.distance))
            .send()
            .await?;
        let collection: CollectionResponse = read_json(response).await?;
        tracing::info!(target: "chroma", collection = %collection.name, id = %collection.id, "using collection");

        self.collection = Some(collection);
        Ok(())
    }

    fn collection(&self) -> Option<&str> {
        self.collection.as_ref().map(|c| c.name.as_str())
    }

    async fn insert(
        &self,
        id: &str,
        text: &str,
        metadata: Metadata,
    ) -> Result<(), VectorStoreError> {
        let report = self
            .insert_documents(vec![Document::new(id, text, metadata)])
            .await?;
        if report.inserted == 0 {
            return Err(VectorStoreError::Validation(format!(
                "document '{id}' has no embeddable text"
            )));
        }
        Ok(())
    }

    async fn insert_documents(
        &self,
        documents: Vec<Document>,
    ) -> Result<InsertReport, VectorStoreError> {
        self.collection_id()?;
        if documents.is_empty() {
            return Ok(InsertReport::default());
        }

        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let embedded = self.embedder.embed_texts(&texts).await;
        let (ready, skipped_ids) = attach_embeddings(embedded, documents)?;

        if !ready.is_empty() {
            self.add(&ready).await?;
        }
        tracing::info!(
            target: "chroma",
            collection = self.collection().unwrap_or_default(),
            inserted = ready.len(),
            skipped = skipped_ids.len(),
            "inserted documents (async)"
        );

        Ok(InsertReport {
            inserted: ready.len(),
            skipped_ids,
        })
    }

    async fn query(
        &self,
        texts: &[String],
        n_results: usize,
    ) -> Result<Vec<QueryResult>, VectorStoreError> {
        self.collection_id()?;
        if n_results == 0 {
            return Err(VectorStoreError::Validation(
                "n_results must be at least 1".to_string(),
            ));
        }

        let embeddings = self.embedder.embed_texts(texts).await?;
        let present: Vec<Vec<f32>> = embeddings.iter().flatten().cloned().collect();
        let matches = self.query_embeddings(&present, n_results).await?;

        Ok(assemble_query_results(texts, &embeddings, matches.into_iter()))
    }

    async fn count(&self) -> Result<u64, VectorStoreError> {
        let (client, routes) = self.connection()?;
        let id = self.collection_id()?;
        let response = client.get(routes.collection_op(id, "count")).send().await?;
        read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::models::{Config, EmbeddingConfig};

    fn embedder() -> AsyncEmbeddingClient {
        AsyncEmbeddingClient::new(&EmbeddingConfig {
            model: "nomic-embed-text".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_client_requires_host() {
        let config = Config::parse("[Chroma]\nHttpClient_Port = 8000\n").unwrap();
        let mut store = AsyncHttpStore::new(&config.chroma, embedder());
        assert!(matches!(
            store.create_client().await,
            Err(VectorStoreError::Configuration(ConfigError::Missing { .. }))
        ));
    }

    #[tokio::test]
    async fn test_operations_before_connect() {
        let mut store = AsyncHttpStore::new(&ChromaConfig::default(), embedder());
        assert!(matches!(
            store.get_collection("docs").await,
            Err(VectorStoreError::NotConnected(_))
        ));
        assert!(matches!(
            store.insert("1", "text", Metadata::new()).await,
            Err(VectorStoreError::NotConnected(_))
        ));
        assert!(matches!(
            store.count().await,
            Err(VectorStoreError::NotConnected(_))
        ));
        assert!(store.collection().is_none());
    }
}
