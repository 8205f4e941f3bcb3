//! Blocking client for a remote Chroma server.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;

use super::protocol::{
    AddRequest, CollectionResponse, CreateCollectionRequest, QueryRequest, QueryResponse, Routes,
    upstream,
};
use super::{BackendKind, VectorStore};
use crate::error::VectorStoreError;
use crate::models::{ChromaConfig, Document, QueryMatch};
use crate::services::embedding::Embedder;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

struct Connection {
    client: Client,
    routes: Routes,
}

pub struct HttpStore {
    config: ChromaConfig,
    connection: Option<Connection>,
    collection: Option<CollectionResponse>,
    embedder: Box<dyn Embedder>,
}

impl HttpStore {
    pub fn new(config: &ChromaConfig, embedder: Box<dyn Embedder>) -> Self {
        Self {
            config: config.clone(),
            connection: None,
            collection: None,
            embedder,
        }
    }

    fn connection(&self) -> Result<&Connection, VectorStoreError> {
        self.connection
            .as_ref()
            .ok_or(VectorStoreError::NotConnected("create_client has not been called"))
    }

    fn collection_id(&self) -> Result<&str, VectorStoreError> {
        self.collection
            .as_ref()
            .map(|c| c.id.as_str())
            .ok_or(VectorStoreError::NotConnected("no active collection"))
    }
}

fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, VectorStoreError> {
    let status = response.status();
    let body = response.text()?;
    if !status.is_success() {
        return Err(upstream(status, &body));
    }
    serde_json::from_str(&body).map_err(|e| VectorStoreError::Schema(e.to_string()))
}

/// Check that the configured Chroma server answers its heartbeat. Returns the
/// base URL that was probed.
pub fn ping(config: &ChromaConfig) -> Result<String, VectorStoreError> {
    let routes = Routes::from_config(config)?;
    let client = Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| VectorStoreError::Upstream(e.to_string()))?;
    check_status(client.get(routes.heartbeat()).send()?)?;
    Ok(routes.base_url().to_string())
}

fn check_status(response: Response) -> Result<(), VectorStoreError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(upstream(status, &body));
    }
    Ok(())
}

impl VectorStore for HttpStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Http
    }

    fn create_client(&mut self) -> Result<(), VectorStoreError> {
        let routes = Routes::from_config(&self.config).inspect_err(|e| {
            tracing::error!(target: "chroma", "cannot create HTTP client: {e}");
        })?;

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| VectorStoreError::Upstream(e.to_string()))?;

        check_status(client.get(routes.heartbeat()).send()?)?;
        tracing::info!(target: "chroma", url = routes.base_url(), "connected to Chroma");

        self.connection = Some(Connection { client, routes });
        self.collection = None;
        Ok(())
    }

    fn get_collection(&mut self, name: &str) -> Result<(), VectorStoreError> {
        let name = name.trim();
        let conn = self.connection()?;
        if name.is_empty() {
            return Err(VectorStoreError::Validation(
                "collection name must not be empty".to_string(),
            ));
        }

        let response = conn
            .client
            .post(conn.routes.collections())
            .json(&CreateCollectionRequest::get_or_create(name, self.config.distance))
            .send()?;
        let collection: CollectionResponse = read_json(response)?;
        tracing::info!(target: "chroma", collection = %collection.name, id = %collection.id, "using collection");

        self.collection = Some(collection);
        Ok(())
    }

    fn collection(&self) -> Option<&str> {
        self.collection.as_ref().map(|c| c.name.as_str())
    }

    fn add(&mut self, documents: &[Document]) -> Result<(), VectorStoreError> {
        let conn = self.connection()?;
        let id = self.collection_id()?;

        let response = conn
            .client
            .post(conn.routes.collection_op(id, "add"))
            .json(&AddRequest::from_documents(documents)?)
            .send()?;
        check_status(response)
    }

    fn query_embeddings(
        &self,
        embeddings: &[Vec<f32>],
        n_results: usize,
    ) -> Result<Vec<Vec<QueryMatch>>, VectorStoreError> {
        if embeddings.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.connection()?;
        let id = self.collection_id()?;

        let response = conn
            .client
            .post(conn.routes.collection_op(id, "query"))
            .json(&QueryRequest::new(embeddings, n_results))
            .send()?;
        let parsed: QueryResponse = read_json(response)?;
        parsed.into_matches(embeddings.len())
    }

    fn count(&self) -> Result<u64, VectorStoreError> {
        let conn = self.connection()?;
        let id = self.collection_id()?;
        let response = conn.client.get(conn.routes.collection_op(id, "count")).send()?;
        read_json(response)
    }

    fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, EmbeddingError};
    use crate::models::{Config, Metadata};

    struct NoEmbedder;

    impl Embedder for NoEmbedder {
        fn embed_texts(&self, _texts: &[String]) -> Result<Vec<Option<Vec<f32>>>, EmbeddingError> {
            Err(EmbeddingError::Upstream("unused".to_string()))
        }

        fn model(&self) -> &str {
            "none"
        }
    }

    #[test]
    fn test_create_client_requires_port() {
        let config = Config::parse("[Chroma]\nHttpClient_Host = localhost\n").unwrap();
        let mut store = HttpStore::new(&config.chroma, Box::new(NoEmbedder));
        let err = store.create_client().unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::Configuration(ConfigError::Missing { .. })
        ));
    }

    #[test]
    fn test_create_client_rejects_bad_port() {
        let config =
            Config::parse("[Chroma]\nHttpClient_Host = localhost\nHttpClient_Port = eighty\n")
                .unwrap();
        let mut store = HttpStore::new(&config.chroma, Box::new(NoEmbedder));
        assert!(matches!(
            store.create_client(),
            Err(VectorStoreError::Configuration(ConfigError::Invalid { .. }))
        ));
    }

    #[test]
    fn test_operations_before_connect() {
        let mut store = HttpStore::new(&ChromaConfig::default(), Box::new(NoEmbedder));
        assert!(matches!(
            store.get_collection("docs"),
            Err(VectorStoreError::NotConnected(_))
        ));
        assert!(matches!(
            store.insert("1", "text", Metadata::new()),
            Err(VectorStoreError::NotConnected(_))
        ));
        assert!(matches!(
            store.query(&["text".to_string()], 3),
            Err(VectorStoreError::NotConnected(_))
        ));
        assert_eq!(store.kind(), BackendKind::Http);
    }
}
