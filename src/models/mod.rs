mod config;
mod document;
mod search;

pub use config::{
    CONFIG_ENV_VAR, CONFIG_FILE_NAME, CONFIG_TEMPLATE, ChromaConfig, Config, DEFAULT_BATCH_SIZE,
    DEFAULT_EMBEDDING_HOST, Distance, EmbeddingApi, EmbeddingConfig, LoggingConfig, RawConfig,
    ServerConfig, lookup,
};
pub use document::{Document, Metadata, MetadataValue, format_metadata, zip_documents};
pub use search::{
    DEFAULT_N_RESULTS, OutputFormat, QueryMatch, QueryResult, rank_by_distance,
};
