//! Vector store abstraction layer.
//!
//! One capability set (`create_client`, `get_collection`, `insert`, `query`)
//! over three backends: a local on-disk store, a remote Chroma server reached
//! with a blocking client, and the same server reached asynchronously.

mod async_http;
mod http;
mod persistent;
pub mod protocol;

pub use async_http::AsyncHttpStore;
pub use http::{HttpStore, ping};
pub use persistent::{PersistentStore, distance};

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{EmbeddingError, VectorStoreError};
use crate::models::{Config, Document, Metadata, QueryMatch, QueryResult};
use crate::services::embedding::Embedder;

/// Which backend a session talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    Persistent,
    Http,
    AsyncHttp,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Persistent => write!(f, "persistent"),
            BackendKind::Http => write!(f, "http"),
            BackendKind::AsyncHttp => write!(f, "async-http"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "persistent" | "local" => Ok(BackendKind::Persistent),
            "http" | "remote" => Ok(BackendKind::Http),
            "async-http" | "async" => Ok(BackendKind::AsyncHttp),
            _ => Err(format!("unknown backend: {s}")),
        }
    }
}

/// Outcome of a bulk insert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InsertReport {
    pub inserted: usize,
    /// Documents left out because their text was blank.
    pub skipped_ids: Vec<String>,
}

impl InsertReport {
    pub fn merge(&mut self, other: InsertReport) {
        self.inserted += other.inserted;
        self.skipped_ids.extend(other.skipped_ids);
    }
}

/// Attach embeddings to documents, splitting off those with blank text.
///
/// A batch consisting only of blank documents is not an error here: it just
/// produces an empty list.
pub fn attach_embeddings(
    embedder_output: Result<Vec<Option<Vec<f32>>>, EmbeddingError>,
    documents: Vec<Document>,
) -> Result<(Vec<Document>, Vec<String>), VectorStoreError> {
    let embeddings = match embedder_output {
        Ok(embeddings) => embeddings,
        Err(EmbeddingError::Validation) => {
            let skipped = documents.into_iter().map(|d| d.id).collect();
            return Ok((Vec::new(), skipped));
        }
        Err(e) => return Err(e.into()),
    };

    let mut ready = Vec::with_capacity(documents.len());
    let mut skipped = Vec::new();
    for (doc, embedding) in documents.into_iter().zip(embeddings) {
        match embedding {
            Some(embedding) => ready.push(doc.with_embedding(embedding)),
            None => {
                tracing::warn!(target: "chroma", id = %doc.id, "skipping document with blank text");
                skipped.push(doc.id);
            }
        }
    }
    Ok((ready, skipped))
}

/// Pair query texts with per-embedding matches; blank queries get no matches.
pub fn assemble_query_results(
    texts: &[String],
    embeddings: &[Option<Vec<f32>>],
    mut matches: impl Iterator<Item = Vec<QueryMatch>>,
) -> Vec<QueryResult> {
    texts
        .iter()
        .zip(embeddings)
        .map(|(text, embedding)| {
            let found = if embedding.is_some() {
                matches.next().unwrap_or_default()
            } else {
                Vec::new()
            };
            QueryResult::new(text.trim(), found)
        })
        .collect()
}

/// Blocking vector store.
///
/// Backends implement the connection and raw vector operations; insertion and
/// querying by text are provided on top using the store's embedder.
pub trait VectorStore {
    fn kind(&self) -> BackendKind;

    /// Construct the backend client.
    fn create_client(&mut self) -> Result<(), VectorStoreError>;

    /// Fetch or create `name` and make it the active collection.
    fn get_collection(&mut self, name: &str) -> Result<(), VectorStoreError>;

    /// Name of the active collection, if any.
    fn collection(&self) -> Option<&str>;

    /// Store documents that already carry embeddings.
    fn add(&mut self, documents: &[Document]) -> Result<(), VectorStoreError>;

    /// Nearest neighbors for each embedding, closest first.
    fn query_embeddings(
        &self,
        embeddings: &[Vec<f32>],
        n_results: usize,
    ) -> Result<Vec<Vec<QueryMatch>>, VectorStoreError>;

    /// Number of documents in the active collection.
    fn count(&self) -> Result<u64, VectorStoreError>;

    fn embedder(&self) -> &dyn Embedder;

    fn require_collection(&self) -> Result<&str, VectorStoreError> {
        self.collection()
            .ok_or(VectorStoreError::NotConnected("no active collection"))
    }

    /// Embed and store a single document.
    fn insert(&mut self, id: &str, text: &str, metadata: Metadata) -> Result<(), VectorStoreError> {
        let report = self.insert_documents(vec![Document::new(id, text, metadata)])?;
        if report.inserted == 0 {
            return Err(VectorStoreError::Validation(format!(
                "document '{id}' has no embeddable text"
            )));
        }
        Ok(())
    }

    /// Embed and store documents; blank-text documents are skipped and reported.
    fn insert_documents(
        &mut self,
        documents: Vec<Document>,
    ) -> Result<InsertReport, VectorStoreError> {
        self.require_collection()?;
        if documents.is_empty() {
            return Ok(InsertReport::default());
        }

        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let (ready, skipped_ids) =
            attach_embeddings(self.embedder().embed_texts(&texts), documents)?;

        if !ready.is_empty() {
            self.add(&ready)?;
        }
        tracing::info!(
            target: "chroma",
            collection = self.collection().unwrap_or_default(),
            inserted = ready.len(),
            skipped = skipped_ids.len(),
            "inserted documents"
        );

        Ok(InsertReport {
            inserted: ready.len(),
            skipped_ids,
        })
    }

    /// Similarity search for each query text.
    fn query(&self, texts: &[String], n_results: usize) -> Result<Vec<QueryResult>, VectorStoreError> {
        self.require_collection()?;
        if n_results == 0 {
            return Err(VectorStoreError::Validation(
                "n_results must be at least 1".to_string(),
            ));
        }

        let embeddings = self.embedder().embed_texts(texts)?;
        let present: Vec<Vec<f32>> = embeddings.iter().flatten().cloned().collect();
        let matches = self.query_embeddings(&present, n_results)?;

        Ok(assemble_query_results(texts, &embeddings, matches.into_iter()))
    }
}

/// Asynchronous counterpart of [`VectorStore`] for the remote server.
#[async_trait]
pub trait AsyncVectorStore: Send + Sync {
    async fn create_client(&mut self) -> Result<(), VectorStoreError>;

    async fn get_collection(&mut self, name: &str) -> Result<(), VectorStoreError>;

    fn collection(&self) -> Option<&str>;

    async fn insert(
        &self,
        id: &str,
        text: &str,
        metadata: Metadata,
    ) -> Result<(), VectorStoreError>;

    async fn insert_documents(
        &self,
        documents: Vec<Document>,
    ) -> Result<InsertReport, VectorStoreError>;

    async fn query(
        &self,
        texts: &[String],
        n_results: usize,
    ) -> Result<Vec<QueryResult>, VectorStoreError>;

    async fn count(&self) -> Result<u64, VectorStoreError>;
}

/// Build a blocking store for `kind`. The async backend is built separately.
pub fn create_store(
    kind: BackendKind,
    config: &Config,
    embedder: Box<dyn Embedder>,
) -> Result<Box<dyn VectorStore>, VectorStoreError> {
    match kind {
        BackendKind::Persistent => Ok(Box::new(PersistentStore::new(&config.chroma, embedder))),
        BackendKind::Http => Ok(Box::new(HttpStore::new(&config.chroma, embedder))),
        BackendKind::AsyncHttp => Err(VectorStoreError::Validation(
            "the async backend has no blocking interface".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!(
            "persistent".parse::<BackendKind>().unwrap(),
            BackendKind::Persistent
        );
        assert_eq!("HTTP".parse::<BackendKind>().unwrap(), BackendKind::Http);
        assert_eq!(
            "async-http".parse::<BackendKind>().unwrap(),
            BackendKind::AsyncHttp
        );
        assert!("mongo".parse::<BackendKind>().is_err());
        assert_eq!(BackendKind::AsyncHttp.to_string(), "async-http");
    }

    #[test]
    fn test_attach_embeddings_skips_blank() {
        let docs = vec![
            Document::new("a", "text", Metadata::new()),
            Document::new("b", "  ", Metadata::new()),
        ];
        let (ready, skipped) =
            attach_embeddings(Ok(vec![Some(vec![1.0]), None]), docs).unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].embedding, Some(vec![1.0]));
        assert_eq!(skipped, vec!["b".to_string()]);
    }

    #[test]
    fn test_attach_embeddings_all_blank() {
        let docs = vec![Document::new("a", "", Metadata::new())];
        let (ready, skipped) = attach_embeddings(Err(EmbeddingError::Validation), docs).unwrap();
        assert!(ready.is_empty());
        assert_eq!(skipped, vec!["a".to_string()]);
    }

    #[test]
    fn test_attach_embeddings_propagates_upstream() {
        let docs = vec![Document::new("a", "x", Metadata::new())];
        let err = attach_embeddings(Err(EmbeddingError::Upstream("down".into())), docs).unwrap_err();
        assert!(matches!(err, VectorStoreError::Embedding(EmbeddingError::Upstream(_))));
    }

    #[test]
    fn test_assemble_query_results_keeps_positions() {
        let texts = vec!["first".to_string(), " ".to_string(), "third".to_string()];
        let embeddings = vec![Some(vec![1.0]), None, Some(vec![2.0])];
        let hit = |id: &str| QueryMatch {
            id: id.to_string(),
            document: String::new(),
            metadata: Metadata::new(),
            distance: 0.0,
        };
        let results = assemble_query_results(
            &texts,
            &embeddings,
            vec![vec![hit("x")], vec![hit("y")]].into_iter(),
        );
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].matches[0].id, "x");
        assert!(results[1].is_empty());
        assert_eq!(results[2].matches[0].id, "y");
    }

    #[test]
    fn test_insert_report_merge() {
        let mut total = InsertReport::default();
        total.merge(InsertReport {
            inserted: 2,
            skipped_ids: vec!["x".into()],
        });
        total.merge(InsertReport {
            inserted: 1,
            skipped_ids: vec![],
        });
        assert_eq!(total.inserted, 3);
        assert_eq!(total.skipped_ids.len(), 1);
    }
}
