//! Hierarchical hybrid retrieval and authority-resolved fact extraction
//!
//! Features:
//! - Ordered-pattern query classification with synonym expansion
//! - Flat inner-product vector index with index-aligned metadata
//! - Scheme and (scheme, field) pre-filtering before vector search
//! - Hybrid scoring (vector + keyword + source authority + query-type boosts)
//! - Optional cross-encoder re-ranking with authority and recency multipliers
//! - Strict metric extraction with HIGH/MEDIUM/LOW confidence
//! - Cross-source conflict detection over the fact table
//! - LRU + TTL response cache and a query engine tying it together

pub mod cache;
pub mod classifier;
pub mod conflict;
pub mod embeddings;
pub mod engine;
pub mod extractor;
pub mod index;
pub mod manager;
pub mod reranker;
pub mod retriever;
pub mod store;

pub use cache::{CacheStats, ResponseCache};
pub use classifier::{
    classify, expand_query, expanded_keywords, identify_field, identify_scheme, keywords_for_type,
};
pub use conflict::ConflictDetector;
pub use embeddings::{build_embedder, EmbeddingConfig, HashEmbedder};
#[cfg(feature = "onnx")]
pub use embeddings::OnnxEmbedder;
pub use engine::{FactsheetEngine, MetricAnswer, QueryOutcome};
pub use extractor::{normalize_value, Confidence, ExtractedMetric, ExtractionMethod, MetricExtractor};
pub use index::FlatIndex;
pub use manager::{find_fund_manager, FundManager};
pub use reranker::{build_reranker, Reranker, RerankerConfig};
#[cfg(feature = "onnx")]
pub use reranker::OnnxCrossEncoder;
pub use retriever::{
    HierarchicalRetriever, RetrievalCandidate, RetrievalOptions, RetrievalPlan, RetrieverConfig,
};
pub use store::{
    enforce_fact_invariants, load_corpus, load_fact_table, read_chunks_jsonl, write_chunks_jsonl, write_fact_table,
    write_metadata, ChunkMetadata, CorpusStore,
};

use thiserror::Error;

/// RAG errors
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Reranker error: {0}")]
    Reranker(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] fundfacts_core::Error),
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for RagError {
    fn from(err: csv::Error) -> Self {
        RagError::Serialization(err.to_string())
    }
}

impl From<RagError> for fundfacts_core::Error {
    fn from(err: RagError) -> Self {
        use fundfacts_core::Error;

        match err {
            RagError::Embedding(msg) => Error::Embedding(msg),
            RagError::Index(msg) => Error::Retrieval(msg),
            RagError::Reranker(msg) => Error::Reranker(msg),
            RagError::Model(msg) => Error::DependencyUnavailable(msg),
            RagError::DataIntegrity(msg) | RagError::Serialization(msg) => Error::DataIntegrity(msg),
            RagError::Io(e) => Error::Io(e),
            RagError::Core(e) => e,
        }
    }
}
