//! Text Embeddings
//!
//! Dense encoders implementing [`EmbeddingProvider`]:
//! - `OnnxEmbedder`: sentence-transformer ONNX model with mean pooling (`onnx` feature)
//! - `HashEmbedder`: deterministic token-hash embedding for development and tests

use std::path::Path;
use std::sync::Arc;

#[cfg(feature = "onnx")]
use ndarray::Array2;
#[cfg(feature = "onnx")]
use ort::{session::builder::GraphOptimizationLevel, session::Session, value::Tensor};
#[cfg(feature = "onnx")]
use parking_lot::Mutex;
#[cfg(feature = "onnx")]
use tokenizers::Tokenizer;

use fundfacts_config::EmbeddingSettings;
use fundfacts_core::{EmbeddingProvider, Error};

use crate::RagError;

/// Embedding configuration
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub max_seq_len: usize,
    pub embedding_dim: usize,
    pub normalize: bool,
    /// Batch size for bulk embedding
    pub batch_size: usize,
    /// ONNX output tensor holding token embeddings
    pub output_name: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        use fundfacts_config::constants::embedding;

        Self {
            max_seq_len: embedding::MAX_SEQ_LEN,
            embedding_dim: embedding::DIMENSION,
            normalize: true,
            batch_size: embedding::BATCH_SIZE,
            output_name: embedding::OUTPUT_NAME.to_string(),
        }
    }
}

impl From<&EmbeddingSettings> for EmbeddingConfig {
    fn from(settings: &EmbeddingSettings) -> Self {
        Self {
            max_seq_len: settings.max_seq_len,
            embedding_dim: settings.dimension,
            normalize: settings.normalize,
            batch_size: settings.batch_size,
            ..Self::default()
        }
    }
}

fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Sentence embedder backed by an ONNX model
#[cfg(feature = "onnx")]
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    config: EmbeddingConfig,
    model_name: String,
}

#[cfg(feature = "onnx")]
impl OnnxEmbedder {
    pub fn new(
        model_path: impl AsRef<Path>,
        tokenizer_path: impl AsRef<Path>,
        config: EmbeddingConfig,
    ) -> Result<Self, RagError> {
        let model_name = model_path
            .as_ref()
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onnx-embedder".to_string());

        let session = Session::builder()
            .map_err(|e| RagError::Model(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| RagError::Model(e.to_string()))?
            .with_intra_threads(2)
            .map_err(|e| RagError::Model(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| RagError::Model(e.to_string()))?;

        let tokenizer =
            Tokenizer::from_file(tokenizer_path).map_err(|e| RagError::Model(e.to_string()))?;

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            config,
            model_name,
        })
    }

    fn embed_batch_internal(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, RagError> {
        let batch_size = texts.len();
        let seq = self.config.max_seq_len;

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        let mut input_ids = vec![0i64; batch_size * seq];
        let mut attention_mask = vec![0i64; batch_size * seq];
        let mut token_type_ids = vec![0i64; batch_size * seq];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let types = encoding.get_type_ids();
            let len = ids.len().min(seq);
            let offset = i * seq;

            for j in 0..len {
                input_ids[offset + j] = ids[j] as i64;
                attention_mask[offset + j] = mask[j] as i64;
                token_type_ids[offset + j] = types[j] as i64;
            }
        }

        let input_ids = Array2::from_shape_vec((batch_size, seq), input_ids)
            .map_err(|e| RagError::Embedding(e.to_string()))?;
        let attention = Array2::from_shape_vec((batch_size, seq), attention_mask.clone())
            .map_err(|e| RagError::Embedding(e.to_string()))?;
        let token_types = Array2::from_shape_vec((batch_size, seq), token_type_ids)
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        let input_ids_tensor =
            Tensor::from_array(input_ids).map_err(|e| RagError::Model(e.to_string()))?;
        let attention_tensor =
            Tensor::from_array(attention).map_err(|e| RagError::Model(e.to_string()))?;
        let token_types_tensor =
            Tensor::from_array(token_types).map_err(|e| RagError::Model(e.to_string()))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_tensor,
                "token_type_ids" => token_types_tensor,
            ])
            .map_err(|e| RagError::Model(e.to_string()))?;

        let (shape, hidden) = outputs
            .get(self.config.output_name.as_str())
            .ok_or_else(|| {
                RagError::Model(format!("Missing output tensor: {}", self.config.output_name))
            })?
            .try_extract_tensor::<f32>()
            .map_err(|e| RagError::Model(e.to_string()))?;

        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        let (tensor_batch, tensor_seq, hidden_dim) = match dims.as_slice() {
            [b, s, h] => (*b, *s, *h),
            _ => return Err(RagError::Model(format!("Unexpected tensor shape: {:?}", dims))),
        };

        let dim = self.config.embedding_dim.min(hidden_dim);
        let mut embeddings = Vec::with_capacity(batch_size);

        // Mean pooling over attended tokens
        for i in 0..batch_size.min(tensor_batch) {
            let mut embedding = vec![0.0f32; self.config.embedding_dim];
            let mut count = 0.0f32;

            for j in 0..seq.min(tensor_seq) {
                if attention_mask[i * seq + j] == 0 {
                    continue;
                }
                count += 1.0;
                let base = i * tensor_seq * hidden_dim + j * hidden_dim;
                for k in 0..dim {
                    embedding[k] += hidden[base + k];
                }
            }

            if count > 0.0 {
                for v in &mut embedding {
                    *v /= count;
                }
            }
            if self.config.normalize {
                l2_normalize(&mut embedding);
            }
            embeddings.push(embedding);
        }

        Ok(embeddings)
    }
}

#[cfg(feature = "onnx")]
impl EmbeddingProvider for OnnxEmbedder {
    fn encode(&self, texts: &[&str]) -> fundfacts_core::Result<Vec<Vec<f32>>> {
        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size.max(1)) {
            all.extend(self.embed_batch_internal(batch)?);
        }
        Ok(all)
    }

    fn dimension(&self) -> usize {
        self.config.embedding_dim
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Deterministic bag-of-words embedder (no model required)
///
/// Each lowercase alphanumeric token is hashed into a bucket, so texts that
/// share words have positive similarity.
pub struct HashEmbedder {
    config: EmbeddingConfig,
}

impl HashEmbedder {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self { config }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let dim = self.config.embedding_dim.max(1);
        let mut embedding = vec![0.0f32; dim];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            embedding[(fnv1a(token.as_bytes()) % dim as u64) as usize] += 1.0;
        }

        if self.config.normalize {
            l2_normalize(&mut embedding);
        }
        embedding
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(EmbeddingConfig::default())
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn encode(&self, texts: &[&str]) -> fundfacts_core::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.config.embedding_dim
    }

    fn model_name(&self) -> &str {
        "hash-bow"
    }
}

/// Stable across platforms and releases, unlike `DefaultHasher`
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Build the configured embedder.
///
/// A configured model that fails to load is fatal; with no model configured
/// the hash embedder is used.
pub fn build_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingProvider>, RagError> {
    let config = EmbeddingConfig::from(settings);

    match (&settings.model_path, &settings.tokenizer_path) {
        (Some(model), Some(tokenizer)) => load_onnx(model, tokenizer, config),
        (Some(_), None) | (None, Some(_)) => Err(RagError::Core(Error::Config(
            "embedding.model_path and embedding.tokenizer_path must be set together".to_string(),
        ))),
        (None, None) => {
            tracing::warn!(
                dim = config.embedding_dim,
                "No embedding model configured, using hash embeddings"
            );
            Ok(Arc::new(HashEmbedder::new(config)))
        }
    }
}

#[cfg(feature = "onnx")]
fn load_onnx(
    model: &Path,
    tokenizer: &Path,
    config: EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>, RagError> {
    let embedder = OnnxEmbedder::new(model, tokenizer, config).map_err(|e| {
        RagError::Core(Error::DependencyUnavailable(format!(
            "embedding model {}: {}",
            model.display(),
            e
        )))
    })?;
    tracing::info!(model = %model.display(), "Loaded ONNX embedding model");
    Ok(Arc::new(embedder))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx(
    model: &Path,
    _tokenizer: &Path,
    _config: EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>, RagError> {
    Err(RagError::Core(Error::DependencyUnavailable(format!(
        "embedding model {} configured but built without the onnx feature",
        model.display()
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_embedder_normalized() {
        let embedder = HashEmbedder::default();
        let embedding = embedder.embed("Exit load of 1% within one year");

        assert_eq!(embedding.len(), 384);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_hash_embedder_deterministic_and_case_insensitive() {
        let embedder = HashEmbedder::default();
        assert_eq!(embedder.embed("Expense Ratio"), embedder.embed("expense ratio"));
    }

    #[test]
    fn test_shared_words_score_higher() {
        let embedder = HashEmbedder::default();
        let q = embedder.embed("exit load elss");
        let related = embedder.embed("ELSS exit load is nil");
        let unrelated = embedder.embed("portfolio holdings sector allocation");

        let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        assert!(dot(&q, &related) > dot(&q, &unrelated));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::default();
        assert!(embedder.embed("").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_build_embedder_without_model() {
        let embedder = build_embedder(&EmbeddingSettings::default()).unwrap();
        assert_eq!(embedder.dimension(), 384);
        assert_eq!(embedder.encode(&["a", "b"]).unwrap().len(), 2);
    }

    #[test]
    fn test_build_embedder_requires_both_paths() {
        let settings = EmbeddingSettings {
            model_path: Some("model.onnx".into()),
            ..EmbeddingSettings::default()
        };
        assert!(build_embedder(&settings).is_err());
    }
}
