//! A connected store for the lifetime of one command.
//!
//! Blocking backends are driven directly. The async backend runs on a
//! current-thread runtime owned by the session, one awaited step at a time.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::error::{AppError, VectorStoreError};
use crate::models::{Config, Document, QueryResult};
use crate::services::{
    AsyncEmbeddingClient, AsyncHttpStore, AsyncVectorStore, BackendKind, EmbeddingClient,
    InsertReport, VectorStore, create_store,
};

pub enum Session {
    Blocking(Box<dyn VectorStore>),
    Async {
        runtime: tokio::runtime::Runtime,
        store: AsyncHttpStore,
    },
}

impl Session {
    /// Build the backend and connect it.
    pub fn open(kind: BackendKind, config: &Config) -> Result<Self, AppError> {
        tracing::info!(target: "cli", backend = %kind, "opening session");

        let session = match kind {
            BackendKind::AsyncHttp => {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| AppError::Other(format!("failed to start async runtime: {e}")))?;
                let embedder = AsyncEmbeddingClient::new(&config.embedding)?;
                let mut store = AsyncHttpStore::new(&config.chroma, embedder);
                runtime.block_on(store.create_client())?;
                Session::Async { runtime, store }
            }
            kind => {
                let embedder = EmbeddingClient::new(&config.embedding)?;
                let mut store = create_store(kind, config, Box::new(embedder))?;
                store.create_client()?;
                Session::Blocking(store)
            }
        };
        Ok(session)
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Session::Blocking(store) => store.kind(),
            Session::Async { .. } => BackendKind::AsyncHttp,
        }
    }

    pub fn get_collection(&mut self, name: &str) -> Result<(), VectorStoreError> {
        match self {
            Session::Blocking(store) => store.get_collection(name),
            Session::Async { runtime, store } => runtime.block_on(store.get_collection(name)),
        }
    }

    pub fn collection(&self) -> Option<&str> {
        match self {
            Session::Blocking(store) => store.collection(),
            Session::Async { store, .. } => store.collection(),
        }
    }

    pub fn insert_documents(
        &mut self,
        documents: Vec<Document>,
    ) -> Result<InsertReport, VectorStoreError> {
        match self {
            Session::Blocking(store) => store.insert_documents(documents),
            Session::Async { runtime, store } => runtime.block_on(store.insert_documents(documents)),
        }
    }

    pub fn query(
        &self,
        texts: &[String],
        n_results: usize,
    ) -> Result<Vec<QueryResult>, VectorStoreError> {
        match self {
            Session::Blocking(store) => store.query(texts, n_results),
            Session::Async { runtime, store } => runtime.block_on(store.query(texts, n_results)),
        }
    }

    pub fn count(&self) -> Result<u64, VectorStoreError> {
        match self {
            Session::Blocking(store) => store.count(),
            Session::Async { runtime, store } => runtime.block_on(store.count()),
        }
    }

    /// Insert every document as one operation under a spinner.
    ///
    /// The embedder batches internally; nothing is stored unless every
    /// embeddable document was embedded.
    pub fn insert_with_progress(
        &mut self,
        documents: Vec<Document>,
        show_progress: bool,
    ) -> Result<InsertReport, VectorStoreError> {
        let pb = if show_progress {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            ProgressBar::hidden()
        };
        pb.set_message(format!("Embedding {} document(s)...", documents.len()));

        match self.insert_documents(documents) {
            Ok(report) => {
                pb.finish_and_clear();
                Ok(report)
            }
            Err(e) => {
                pb.abandon_with_message("Insert failed; nothing was stored");
                Err(e)
            }
        }
    }
}
