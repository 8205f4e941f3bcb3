//! Chroma REST API (v2) request and response shapes.

use serde::{Deserialize, Serialize};

use crate::error::VectorStoreError;
use crate::models::{ChromaConfig, Distance, Document, Metadata, QueryMatch};

/// Fields requested from the query endpoint.
pub const QUERY_INCLUDE: [&str; 3] = ["documents", "metadatas", "distances"];

/// URL builder for one tenant/database pair.
#[derive(Debug, Clone)]
pub struct Routes {
    base_url: String,
    tenant: String,
    database: String,
}

impl Routes {
    pub fn from_config(config: &ChromaConfig) -> Result<Self, VectorStoreError> {
        Ok(Self {
            base_url: config.base_url()?,
            tenant: config.tenant.clone(),
            database: config.database.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn heartbeat(&self) -> String {
        format!("{}/api/v2/heartbeat", self.base_url)
    }

    pub fn collections(&self) -> String {
        format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            self.base_url, self.tenant, self.database
        )
    }

    pub fn collection_op(&self, collection_id: &str, op: &str) -> String {
        format!("{}/{}/{}", self.collections(), collection_id, op)
    }
}

#[derive(Debug, Serialize)]
pub struct CollectionMetadata {
    #[serde(rename = "hnsw:space")]
    pub space: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CreateCollectionRequest<'a> {
    pub name: &'a str,
    pub metadata: CollectionMetadata,
    pub get_or_create: bool,
}

impl<'a> CreateCollectionRequest<'a> {
    pub fn get_or_create(name: &'a str, distance: Distance) -> Self {
        Self {
            name,
            metadata: CollectionMetadata {
                space: distance.as_str(),
            },
            get_or_create: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionResponse {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct AddRequest<'a> {
    pub ids: Vec<&'a str>,
    pub embeddings: Vec<&'a [f32]>,
    pub documents: Vec<&'a str>,
    /// Chroma rejects empty metadata maps, so those are sent as null.
    pub metadatas: Vec<Option<&'a Metadata>>,
}

impl<'a> AddRequest<'a> {
    /// Every document must already carry its embedding.
    pub fn from_documents(documents: &'a [Document]) -> Result<Self, VectorStoreError> {
        let mut request = AddRequest {
            ids: Vec::with_capacity(documents.len()),
            embeddings: Vec::with_capacity(documents.len()),
            documents: Vec::with_capacity(documents.len()),
            metadatas: Vec::with_capacity(documents.len()),
        };

        for doc in documents {
            let embedding = doc.embedding.as_deref().ok_or_else(|| {
                VectorStoreError::Validation(format!("document '{}' has no embedding", doc.id))
            })?;
            request.ids.push(&doc.id);
            request.embeddings.push(embedding);
            request.documents.push(&doc.text);
            request
                .metadatas
                .push((!doc.metadata.is_empty()).then_some(&doc.metadata));
        }

        Ok(request)
    }
}

#[derive(Debug, Serialize)]
pub struct QueryRequest<'a> {
    pub query_embeddings: &'a [Vec<f32>],
    pub n_results: usize,
    pub include: [&'static str; 3],
}

impl<'a> QueryRequest<'a> {
    pub fn new(query_embeddings: &'a [Vec<f32>], n_results: usize) -> Self {
        Self {
            query_embeddings,
            n_results,
            include: QUERY_INCLUDE,
        }
    }
}

/// Column-oriented query response: one inner list per query embedding.
#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    pub ids: Vec<Vec<String>>,
    #[serde(default)]
    pub documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    pub metadatas: Option<Vec<Vec<Option<Metadata>>>>,
    #[serde(default)]
    pub distances: Option<Vec<Vec<Option<f32>>>>,
}

impl QueryResponse {
    /// Pivot the columns into per-query match lists.
    pub fn into_matches(self, expected: usize) -> Result<Vec<Vec<QueryMatch>>, VectorStoreError> {
        if self.ids.len() != expected {
            return Err(VectorStoreError::Schema(format!(
                "query returned {} result lists for {} queries",
                self.ids.len(),
                expected
            )));
        }

        let mut documents = self.documents.unwrap_or_default().into_iter();
        let mut metadatas = self.metadatas.unwrap_or_default().into_iter();
        let mut distances = self.distances.unwrap_or_default().into_iter();

        let mut out = Vec::with_capacity(expected);
        for ids in self.ids {
            let mut docs = documents.next().unwrap_or_default().into_iter();
            let mut metas = metadatas.next().unwrap_or_default().into_iter();
            let mut dists = distances.next().unwrap_or_default().into_iter();

            let matches = ids
                .into_iter()
                .map(|id| {
                    let distance = dists.next().flatten().ok_or_else(|| {
                        VectorStoreError::Schema(format!("missing distance for '{id}'"))
                    })?;
                    Ok(QueryMatch {
                        document: docs.next().flatten().unwrap_or_default(),
                        metadata: metas.next().flatten().unwrap_or_default(),
                        distance,
                        id,
                    })
                })
                .collect::<Result<Vec<_>, VectorStoreError>>()?;
            out.push(matches);
        }

        Ok(out)
    }
}

/// Turn a non-success response into an upstream error.
pub fn upstream(status: reqwest::StatusCode, body: &str) -> VectorStoreError {
    let preview: String = body.chars().take(200).collect();
    VectorStoreError::Upstream(format!("status {status}: {preview}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Config, MetadataValue};

    fn routes() -> Routes {
        let config = Config::parse("[Chroma]\nHttpClient_Host = localhost\nHttpClient_Port = 8000\n")
            .unwrap();
        Routes::from_config(&config.chroma).unwrap()
    }

    #[test]
    fn test_routes() {
        let routes = routes();
        assert_eq!(routes.heartbeat(), "http://localhost:8000/api/v2/heartbeat");
        assert_eq!(
            routes.collection_op("abc", "query"),
            "http://localhost:8000/api/v2/tenants/default_tenant/databases/default_database/collections/abc/query"
        );
    }

    #[test]
    fn test_routes_require_endpoint() {
        let err = Routes::from_config(&ChromaConfig::default()).unwrap_err();
        assert!(matches!(err, VectorStoreError::Configuration(_)));
    }

    #[test]
    fn test_create_request_shape() {
        let body =
            serde_json::to_value(CreateCollectionRequest::get_or_create("docs", Distance::Cosine))
                .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "name": "docs",
                "metadata": {"hnsw:space": "cosine"},
                "get_or_create": true
            })
        );
    }

    #[test]
    fn test_add_request_sends_null_for_empty_metadata() {
        let mut meta = Metadata::new();
        meta.insert("tag".to_string(), MetadataValue::from("demo"));
        let docs = vec![
            Document::new("1", "first", meta).with_embedding(vec![1.0, 0.0]),
            Document::new("2", "second", Metadata::new()).with_embedding(vec![0.0, 1.0]),
        ];
        let body = serde_json::to_value(AddRequest::from_documents(&docs).unwrap()).unwrap();
        assert_eq!(body["ids"], serde_json::json!(["1", "2"]));
        assert_eq!(body["metadatas"], serde_json::json!([{"tag": "demo"}, null]));
    }

    #[test]
    fn test_add_request_requires_embeddings() {
        let docs = vec![Document::new("1", "first", Metadata::new())];
        assert!(AddRequest::from_documents(&docs).is_err());
    }

    #[test]
    fn test_query_response_pivot() {
        let body = r#"{
            "ids": [["a", "b"]],
            "documents": [["doc a", null]],
            "metadatas": [[{"n": 1}, null]],
            "distances": [[0.5, 0.25]],
            "embeddings": null
        }"#;
        let response: QueryResponse = serde_json::from_str(body).unwrap();
        let matches = response.into_matches(1).unwrap();
        assert_eq!(matches[0].len(), 2);
        assert_eq!(matches[0][0].document, "doc a");
        assert_eq!(matches[0][0].metadata["n"], MetadataValue::Int(1));
        assert_eq!(matches[0][1].document, "");
        assert_eq!(matches[0][1].distance, 0.25);
    }

    #[test]
    fn test_query_response_count_mismatch() {
        let response: QueryResponse = serde_json::from_str(r#"{"ids": [["a"]]}"#).unwrap();
        assert!(matches!(
            response.into_matches(2),
            Err(VectorStoreError::Schema(_))
        ));
    }
}
