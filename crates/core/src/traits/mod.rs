//! Collaborator traits
//!
//! ```text
//! EmbeddingProvider: texts -> normalized dense vectors
//! CrossEncoder:      (query, text) pairs -> relevance scores
//! ```
//!
//! Both are synchronous and shared read-only across requests; async callers
//! run them on the blocking pool.

mod embedding;
mod reranker;

pub use embedding::EmbeddingProvider;
pub use reranker::CrossEncoder;
