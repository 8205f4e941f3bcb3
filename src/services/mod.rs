mod batch;
mod embedding;
#[cfg(test)]
pub(crate) mod testing;
mod vector_store;

pub use batch::{Assembler, Batch, BatchPlan, parse_embed_response, parse_legacy_response};
pub use embedding::{AsyncEmbeddingClient, Embedder, EmbeddingClient};
pub use vector_store::{
    AsyncHttpStore, AsyncVectorStore, BackendKind, HttpStore, InsertReport, PersistentStore,
    VectorStore, create_store, distance, ping, protocol,
};
