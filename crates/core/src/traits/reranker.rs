use crate::Result;

/// Cross-encoder relevance model
pub trait CrossEncoder: Send + Sync {
    /// One score per `(query, text)` pair, higher is more relevant
    fn predict(&self, pairs: &[(&str, &str)]) -> Result<Vec<f32>>;

    fn model_name(&self) -> &str;
}
