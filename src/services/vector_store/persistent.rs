//! Local on-disk store: a SQLite file holding documents and their vectors,
//! searched exhaustively.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};

use super::{BackendKind, VectorStore};
use crate::error::VectorStoreError;
use crate::models::{ChromaConfig, Distance, Document, Metadata, QueryMatch};
use crate::services::embedding::Embedder;

pub const DATABASE_FILE: &str = "chroma.sqlite3";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    name TEXT PRIMARY KEY,
    distance TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL REFERENCES collections(name),
    id TEXT NOT NULL,
    document TEXT NOT NULL,
    metadata TEXT NOT NULL,
    embedding BLOB NOT NULL,
    PRIMARY KEY (collection, id)
);
"#;

/// Distance functions matching Chroma's `hnsw:space` options. Lower is closer.
pub mod distance {
    use crate::models::Distance;

    pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
    }

    pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
        1.0 - a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>()
    }

    pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 1.0;
        }
        1.0 - dot / (norm_a * norm_b)
    }

    pub fn measure(metric: Distance, a: &[f32], b: &[f32]) -> f32 {
        match metric {
            Distance::L2 => squared_l2(a, b),
            Distance::Cosine => cosine(a, b),
            Distance::Ip => inner_product(a, b),
        }
    }
}

/// Little-endian f32 encoding used for the `embedding` column.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn blob_to_vec(blob: &[u8]) -> Result<Vec<f32>, VectorStoreError> {
    if blob.len() % 4 != 0 {
        return Err(VectorStoreError::Schema(format!(
            "embedding blob of {} bytes is not a whole number of f32 values",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[derive(Debug, Clone)]
struct ActiveCollection {
    name: String,
    distance: Distance,
}

pub struct PersistentStore {
    dir: PathBuf,
    distance: Distance,
    conn: Option<Connection>,
    active: Option<ActiveCollection>,
    embedder: Box<dyn Embedder>,
}

impl PersistentStore {
    pub fn new(config: &ChromaConfig, embedder: Box<dyn Embedder>) -> Self {
        Self::at(&config.persist_dir, config.distance, embedder)
    }

    pub fn at(dir: &Path, distance: Distance, embedder: Box<dyn Embedder>) -> Self {
        Self {
            dir: dir.to_path_buf(),
            distance,
            conn: None,
            active: None,
            embedder,
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.dir.join(DATABASE_FILE)
    }

    /// Documents across all collections in the store at `dir`, or `None` when
    /// no store has been created there yet.
    pub fn total_documents(dir: &Path) -> Result<Option<u64>, VectorStoreError> {
        let path = dir.join(DATABASE_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(Some(count as u64))
    }

    fn conn(&self) -> Result<&Connection, VectorStoreError> {
        self.conn
            .as_ref()
            .ok_or(VectorStoreError::NotConnected("create_client has not been called"))
    }

    fn active(&self) -> Result<&ActiveCollection, VectorStoreError> {
        self.active
            .as_ref()
            .ok_or(VectorStoreError::NotConnected("no active collection"))
    }
}

impl VectorStore for PersistentStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Persistent
    }

    fn create_client(&mut self) -> Result<(), VectorStoreError> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir)?;
            tracing::info!(target: "chroma", dir = %self.dir.display(), "created storage directory");
        }

        let conn = Connection::open(self.database_path())?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;
        tracing::info!(target: "chroma", path = %self.database_path().display(), "opened persistent store");

        self.conn = Some(conn);
        self.active = None;
        Ok(())
    }

    fn get_collection(&mut self, name: &str) -> Result<(), VectorStoreError> {
        let name = name.trim();
        let conn = self.conn()?;
        if name.is_empty() {
            return Err(VectorStoreError::Validation(
                "collection name must not be empty".to_string(),
            ));
        }

        let existing: Option<String> = conn
            .query_row(
                "SELECT distance FROM collections WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        let distance = match existing {
            Some(stored) => stored.parse::<Distance>().map_err(|e| {
                VectorStoreError::Schema(format!("collection '{name}' has bad distance: {e}"))
            })?,
            None => {
                conn.execute(
                    "INSERT INTO collections (name, distance, created_at) VALUES (?1, ?2, ?3)",
                    params![name, self.distance.as_str(), chrono::Utc::now().to_rfc3339()],
                )?;
                tracing::info!(target: "chroma", collection = name, distance = %self.distance, "created collection");
                self.distance
            }
        };

        self.active = Some(ActiveCollection {
            name: name.to_string(),
            distance,
        });
        Ok(())
    }

    fn collection(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.name.as_str())
    }

    fn add(&mut self, documents: &[Document]) -> Result<(), VectorStoreError> {
        let collection = self.active()?.name.clone();
        let conn = self
            .conn
            .as_mut()
            .ok_or(VectorStoreError::NotConnected("create_client has not been called"))?;

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO documents (collection, id, document, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for doc in documents {
                let embedding = doc.embedding.as_deref().ok_or_else(|| {
                    VectorStoreError::Validation(format!("document '{}' has no embedding", doc.id))
                })?;
                let metadata = serde_json::to_string(&doc.metadata)
                    .map_err(|e| VectorStoreError::Validation(e.to_string()))?;
                stmt.execute(params![
                    collection,
                    doc.id,
                    doc.text,
                    metadata,
                    vec_to_blob(embedding)
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn query_embeddings(
        &self,
        embeddings: &[Vec<f32>],
        n_results: usize,
    ) -> Result<Vec<Vec<QueryMatch>>, VectorStoreError> {
        let active = self.active()?;
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, document, metadata, embedding FROM documents WHERE collection = ?1",
        )?;
        let rows = stmt.query_map(params![active.name], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Vec<u8>>(3)?,
            ))
        })?;

        let mut stored = Vec::new();
        for row in rows {
            let (id, document, metadata, blob) = row?;
            let metadata: Metadata = serde_json::from_str(&metadata)
                .map_err(|e| VectorStoreError::Schema(format!("metadata of '{id}': {e}")))?;
            stored.push((id, document, metadata, blob_to_vec(&blob)?));
        }

        embeddings
            .iter()
            .map(|query| {
                let mut scored = Vec::with_capacity(stored.len());
                for (id, document, metadata, vector) in &stored {
                    if vector.len() != query.len() {
                        return Err(VectorStoreError::Validation(format!(
                            "embedding dimension {} does not match collection dimension {}",
                            query.len(),
                            vector.len()
                        )));
                    }
                    scored.push(QueryMatch {
                        id: id.clone(),
                        document: document.clone(),
                        metadata: metadata.clone(),
                        distance: distance::measure(active.distance, query, vector),
                    });
                }
                scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
                scored.truncate(n_results);
                Ok(scored)
            })
            .collect()
    }

    fn count(&self) -> Result<u64, VectorStoreError> {
        let active = self.active()?;
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![active.name],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbeddingError;
    use crate::models::MetadataValue;
    use tempfile::TempDir;

    /// Embeds by keyword presence so distances are predictable.
    struct KeywordEmbedder;

    impl Embedder for KeywordEmbedder {
        fn embed_texts(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>, EmbeddingError> {
            if texts.iter().all(|t| t.trim().is_empty()) {
                return Err(EmbeddingError::Validation);
            }
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.trim().to_lowercase();
                    (!t.is_empty()).then(|| {
                        vec![
                            t.contains("cat") as i32 as f32,
                            t.contains("dog") as i32 as f32,
                            t.contains("fish") as i32 as f32,
                        ]
                    })
                })
                .collect())
        }

        fn model(&self) -> &str {
            "keyword"
        }
    }

    fn store(dir: &TempDir) -> PersistentStore {
        PersistentStore::at(&dir.path().join("Embeddings"), Distance::L2, Box::new(KeywordEmbedder))
    }

    fn connected(dir: &TempDir) -> PersistentStore {
        let mut store = store(dir);
        store.create_client().unwrap();
        store.get_collection("animals").unwrap();
        store
    }

    #[test]
    fn test_create_client_makes_directory() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        store.create_client().unwrap();
        assert!(dir.path().join("Embeddings").join(DATABASE_FILE).exists());
    }

    #[test]
    fn test_get_collection_before_connect() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        assert!(matches!(
            store.get_collection("animals"),
            Err(VectorStoreError::NotConnected(_))
        ));
    }

    #[test]
    fn test_insert_without_collection() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        store.create_client().unwrap();
        assert!(matches!(
            store.insert("1", "cat", Metadata::new()),
            Err(VectorStoreError::NotConnected(_))
        ));
    }

    #[test]
    fn test_get_collection_rejects_blank_name() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        store.create_client().unwrap();
        assert!(matches!(
            store.get_collection("  "),
            Err(VectorStoreError::Validation(_))
        ));
    }

    #[test]
    fn test_get_collection_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut store = connected(&dir);
        store.insert("1", "a cat", Metadata::new()).unwrap();

        store.get_collection("animals").unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.collection(), Some("animals"));
    }

    #[test]
    fn test_collections_are_isolated() {
        let dir = TempDir::new().unwrap();
        let mut store = connected(&dir);
        store.insert("1", "a cat", Metadata::new()).unwrap();

        store.get_collection("other").unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = connected(&dir);
            store.insert("1", "a cat", Metadata::new()).unwrap();
        }
        let store = connected(&dir);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_insert_existing_id_keeps_first_document() {
        let dir = TempDir::new().unwrap();
        let mut store = connected(&dir);
        store.insert("1", "a cat", Metadata::new()).unwrap();
        store.insert("1", "a dog", Metadata::new()).unwrap();
        assert_eq!(store.count().unwrap(), 1);

        let results = store.query(&["dog".to_string()], 1).unwrap();
        assert_eq!(results[0].matches[0].document, "a cat");
    }

    #[test]
    fn test_insert_documents_skips_blank() {
        let dir = TempDir::new().unwrap();
        let mut store = connected(&dir);
        let report = store
            .insert_documents(vec![
                Document::new("1", "cat", Metadata::new()),
                Document::new("2", "   ", Metadata::new()),
                Document::new("3", "dog", Metadata::new()),
            ])
            .unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(report.skipped_ids, vec!["2".to_string()]);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_insert_blank_single_document_fails() {
        let dir = TempDir::new().unwrap();
        let mut store = connected(&dir);
        assert!(matches!(
            store.insert("1", " ", Metadata::new()),
            Err(VectorStoreError::Validation(_))
        ));
    }

    #[test]
    fn test_query_orders_by_ascending_distance() {
        let dir = TempDir::new().unwrap();
        let mut store = connected(&dir);
        let mut meta = Metadata::new();
        meta.insert("kind".to_string(), MetadataValue::from("pet"));
        store
            .insert_documents(vec![
                Document::new("fish", "a fish", Metadata::new()),
                Document::new("catdog", "a cat and a dog", Metadata::new()),
                Document::new("cat", "a cat", meta),
            ])
            .unwrap();

        let results = store.query(&["cat".to_string()], 10).unwrap();
        let ids: Vec<&str> = results[0].matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["cat", "catdog", "fish"]);
        assert_eq!(results[0].matches[0].distance, 0.0);
        assert_eq!(results[0].matches[0].metadata["kind"], MetadataValue::from("pet"));

        let limited = store.query(&["cat".to_string()], 2).unwrap();
        assert_eq!(limited[0].matches.len(), 2);
    }

    #[test]
    fn test_query_multiple_texts_with_blank() {
        let dir = TempDir::new().unwrap();
        let mut store = connected(&dir);
        store.insert("d", "dog", Metadata::new()).unwrap();

        let results = store
            .query(&["dog".to_string(), "".to_string(), "cat".to_string()], 5)
            .unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].matches.len(), 1);
        assert!(results[1].is_empty());
        assert_eq!(results[2].matches.len(), 1);
    }

    #[test]
    fn test_query_rejects_zero_results() {
        let dir = TempDir::new().unwrap();
        let store = connected(&dir);
        assert!(store.query(&["cat".to_string()], 0).is_err());
    }

    #[test]
    fn test_cosine_collection_keeps_its_metric() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Embeddings");
        let mut store = PersistentStore::at(&path, Distance::Cosine, Box::new(KeywordEmbedder));
        store.create_client().unwrap();
        store.get_collection("animals").unwrap();
        store.insert("1", "cat dog", Metadata::new()).unwrap();

        // Reopened with a different default; the stored metric wins.
        let mut store = PersistentStore::at(&path, Distance::L2, Box::new(KeywordEmbedder));
        store.create_client().unwrap();
        store.get_collection("animals").unwrap();
        let results = store.query(&["cat".to_string()], 1).unwrap();
        let expected = 1.0 - 1.0 / 2f32.sqrt();
        assert!((results[0].matches[0].distance - expected).abs() < 1e-6);
    }

    #[test]
    fn test_total_documents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Embeddings");
        assert_eq!(PersistentStore::total_documents(&path).unwrap(), None);

        let mut store = connected(&dir);
        store.insert("1", "cat", Metadata::new()).unwrap();
        store.get_collection("more").unwrap();
        store.insert("2", "dog", Metadata::new()).unwrap();
        assert_eq!(PersistentStore::total_documents(&path).unwrap(), Some(2));
    }

    #[test]
    fn test_distance_functions() {
        assert_eq!(distance::squared_l2(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
        assert!((distance::cosine(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!(distance::cosine(&[1.0, 1.0], &[2.0, 2.0]).abs() < 1e-6);
        assert_eq!(distance::cosine(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(distance::inner_product(&[1.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_blob_round_trip_and_bad_length() {
        let v = vec![1.5f32, -2.0, 0.25];
        assert_eq!(blob_to_vec(&vec_to_blob(&v)).unwrap(), v);
        assert!(blob_to_vec(&[0, 1, 2]).is_err());
    }
}
