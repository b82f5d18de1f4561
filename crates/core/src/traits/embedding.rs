use crate::Result;

/// Dense text encoder
///
/// Deterministic for a fixed model version. Implementations must be safe for
/// concurrent use or serialize access internally.
pub trait EmbeddingProvider: Send + Sync {
    /// Encode texts into vectors of length [`Self::dimension`]
    fn encode(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;

    /// Identifier recorded in the index manifest
    fn model_name(&self) -> &str;

    /// Encode a single text
    fn encode_one(&self, text: &str) -> Result<Vec<f32>> {
        self.encode(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| crate::Error::Embedding("encoder returned no vector".to_string()))
    }
}
