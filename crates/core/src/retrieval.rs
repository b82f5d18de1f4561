//! Query classes and retrieval output

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Chunk;

/// Query classification result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Entity,
    Metric,
    List,
    HowTo,
    Comparison,
    General,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Entity => "entity",
            QueryType::Metric => "metric",
            QueryType::List => "list",
            QueryType::HowTo => "how_to",
            QueryType::Comparison => "comparison",
            QueryType::General => "general",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ranked chunk returned to the answer layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    /// Inner product against the query vector
    pub similarity: f32,
    /// Hybrid score computed by the retriever
    pub relevance_score: f32,
    /// Cross-encoder score, set only when re-ranking ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
    /// Re-rank score after authority and recency multipliers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_score: Option<f32>,
}

impl RetrievedChunk {
    pub fn new(chunk: Chunk, similarity: f32, relevance_score: f32) -> Self {
        Self {
            chunk,
            similarity,
            relevance_score,
            rerank_score: None,
            final_score: None,
        }
    }
}
