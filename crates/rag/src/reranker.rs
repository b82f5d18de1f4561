//! Cross-Encoder Re-ranker
//!
//! Optional second pass over the top hybrid candidates. Without a loaded
//! model every call is a passthrough (input truncated to `top_k`), so
//! retrieval degrades gracefully instead of failing.
//!
//! `rerank_with_metadata` applies multipliers after the base cross-encoder
//! score, never blended into it:
//!
//! ```text
//! final = rerank_score * authority_multiplier(source) * (1.05 if timestamped)
//! ```

use parking_lot::Mutex;
use std::cmp::Ordering;
use std::sync::Arc;

#[cfg(feature = "onnx")]
use ndarray::Array2;
#[cfg(feature = "onnx")]
use ort::{session::builder::GraphOptimizationLevel, session::Session, value::Tensor};
#[cfg(feature = "onnx")]
use std::path::Path;
#[cfg(feature = "onnx")]
use tokenizers::Tokenizer;

use fundfacts_config::RerankerSettings;
use fundfacts_core::{CrossEncoder, RetrievedChunk, SourceType};

#[cfg(feature = "onnx")]
use crate::RagError;

/// Reranker configuration
#[derive(Debug, Clone)]
pub struct RerankerConfig {
    /// Maximum sequence length of a (query, text) pair
    pub max_seq_len: usize,
    /// Multiplier for candidates with a fetch timestamp
    pub recency_bonus: f32,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        use fundfacts_config::constants::reranker;

        Self {
            max_seq_len: reranker::MAX_SEQ_LEN,
            recency_bonus: reranker::RECENCY_BONUS,
        }
    }
}

impl From<&RerankerSettings> for RerankerConfig {
    fn from(settings: &RerankerSettings) -> Self {
        Self {
            max_seq_len: settings.max_seq_len,
            ..Self::default()
        }
    }
}

/// Reranker statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RerankerStats {
    /// Total rerank calls
    pub total_calls: usize,
    /// Pairs scored by the cross-encoder
    pub scored_pairs: usize,
    /// Calls served without a model
    pub passthrough_calls: usize,
    /// Model invocations that failed and fell back to passthrough
    pub failures: usize,
}

/// Authority multiplier applied to re-rank scores
pub fn authority_multiplier(source_id: &str, source_type: SourceType) -> f32 {
    match source_type {
        SourceType::SidPdf => 1.2,
        SourceType::KimPdf => 1.1,
        SourceType::FactsheetConsolidated => 1.0,
        SourceType::SchemeOverview => 0.9,
        SourceType::Regulatory | SourceType::Other => {
            let id = source_id.to_lowercase();
            if id.contains("sebi") {
                1.15
            } else if id.contains("amfi") {
                1.1
            } else {
                1.0
            }
        }
    }
}

pub struct Reranker {
    encoder: Option<Arc<dyn CrossEncoder>>,
    config: RerankerConfig,
    stats: Mutex<RerankerStats>,
}

impl Reranker {
    pub fn new(encoder: Arc<dyn CrossEncoder>, config: RerankerConfig) -> Self {
        Self {
            encoder: Some(encoder),
            config,
            stats: Mutex::new(RerankerStats::default()),
        }
    }

    /// Reranker without a model; every call is a passthrough
    pub fn passthrough() -> Self {
        Self {
            encoder: None,
            config: RerankerConfig::default(),
            stats: Mutex::new(RerankerStats::default()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.encoder.is_some()
    }

    /// Score every candidate with the cross-encoder and sort descending.
    ///
    /// Passthrough (truncate to `top_k`, no scores) when the model is
    /// missing or inference fails.
    pub fn rerank(&self, query: &str, candidates: Vec<RetrievedChunk>, top_k: usize) -> Vec<RetrievedChunk> {
        let mut candidates = candidates;
        self.stats.lock().total_calls += 1;

        let encoder = match &self.encoder {
            Some(encoder) => encoder,
            None => {
                self.stats.lock().passthrough_calls += 1;
                candidates.truncate(top_k);
                return candidates;
            }
        };

        if candidates.is_empty() {
            return candidates;
        }

        let pairs: Vec<(&str, &str)> = candidates
            .iter()
            .map(|c| (query, c.chunk.text.as_str()))
            .collect();

        let scores = match encoder.predict(&pairs) {
            Ok(scores) if scores.len() == candidates.len() => scores,
            Ok(scores) => {
                tracing::warn!(
                    expected = candidates.len(),
                    got = scores.len(),
                    "Cross-encoder returned wrong number of scores, skipping re-rank"
                );
                self.stats.lock().failures += 1;
                candidates.truncate(top_k);
                return candidates;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cross-encoder failed, skipping re-rank");
                self.stats.lock().failures += 1;
                candidates.truncate(top_k);
                return candidates;
            }
        };

        self.stats.lock().scored_pairs += scores.len();

        for (candidate, score) in candidates.iter_mut().zip(scores) {
            candidate.rerank_score = Some(score);
        }
        candidates.sort_by(|a, b| {
            b.rerank_score
                .partial_cmp(&a.rerank_score)
                .unwrap_or(Ordering::Equal)
        });
        candidates.truncate(top_k);
        candidates
    }

    /// Re-rank all candidates, then apply authority and recency multipliers and re-sort
    pub fn rerank_with_metadata(
        &self,
        query: &str,
        candidates: Vec<RetrievedChunk>,
        top_k: usize,
    ) -> Vec<RetrievedChunk> {
        let total = candidates.len();
        let mut ranked = self.rerank(query, candidates, total);

        if ranked.iter().any(|c| c.rerank_score.is_none()) {
            ranked.truncate(top_k);
            return ranked;
        }

        for candidate in &mut ranked {
            let base = candidate.rerank_score.unwrap_or(0.0);
            let mut score = base
                * authority_multiplier(&candidate.chunk.source_id, candidate.chunk.source_type);
            if candidate.chunk.has_timestamp() {
                score *= self.config.recency_bonus;
            }
            candidate.final_score = Some(score);
        }

        ranked.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(Ordering::Equal)
        });
        ranked.truncate(top_k);
        ranked
    }

    pub fn stats(&self) -> RerankerStats {
        self.stats.lock().clone()
    }

    pub fn reset_stats(&self) {
        *self.stats.lock() = RerankerStats::default();
    }
}

/// ONNX cross-encoder (MS MARCO style, one or two logits per pair)
#[cfg(feature = "onnx")]
pub struct OnnxCrossEncoder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    max_seq_len: usize,
    model_name: String,
}

#[cfg(feature = "onnx")]
impl OnnxCrossEncoder {
    pub fn new(
        model_path: impl AsRef<Path>,
        tokenizer_path: impl AsRef<Path>,
        config: &RerankerConfig,
    ) -> Result<Self, RagError> {
        let model_name = model_path.as_ref().display().to_string();

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
            max_seq_len: config.max_seq_len,
            model_name,
        })
    }

    fn score_pair(&self, query: &str, document: &str) -> Result<f32, RagError> {
        let encoding = self
            .tokenizer
            .encode((query, document), true)
            .map_err(|e| RagError::Reranker(e.to_string()))?;

        let ids: Vec<i64> = encoding
            .get_ids()
            .iter()
            .take(self.max_seq_len)
            .map(|&id| id as i64)
            .collect();
        let types: Vec<i64> = encoding
            .get_type_ids()
            .iter()
            .take(self.max_seq_len)
            .map(|&t| t as i64)
            .collect();

        let mut padded_ids = vec![0i64; self.max_seq_len];
        let mut padded_mask = vec![0i64; self.max_seq_len];
        let mut padded_types = vec![0i64; self.max_seq_len];
        padded_ids[..ids.len()].copy_from_slice(&ids);
        padded_mask[..ids.len()].fill(1);
        padded_types[..types.len()].copy_from_slice(&types);

        let input_ids = Array2::from_shape_vec((1, self.max_seq_len), padded_ids)
            .map_err(|e| RagError::Reranker(e.to_string()))?;
        let attention = Array2::from_shape_vec((1, self.max_seq_len), padded_mask)
            .map_err(|e| RagError::Reranker(e.to_string()))?;
        let token_types = Array2::from_shape_vec((1, self.max_seq_len), padded_types)
            .map_err(|e| RagError::Reranker(e.to_string()))?;

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

        let (_, logits) = outputs
            .get("logits")
            .ok_or_else(|| RagError::Model("Missing logits output".to_string()))?
            .try_extract_tensor::<f32>()
            .map_err(|e| RagError::Model(e.to_string()))?;

        Ok(relevance_from_logits(logits))
    }
}

/// Softmax probability of the relevant class, or sigmoid of a single logit
#[cfg(feature = "onnx")]
fn relevance_from_logits(logits: &[f32]) -> f32 {
    if logits.len() >= 2 {
        let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let exp_sum: f32 = logits.iter().map(|&x| (x - max).exp()).sum();
        (logits[1] - max).exp() / exp_sum
    } else if logits.len() == 1 {
        1.0 / (1.0 + (-logits[0]).exp())
    } else {
        0.0
    }
}

#[cfg(feature = "onnx")]
impl CrossEncoder for OnnxCrossEncoder {
    fn predict(&self, pairs: &[(&str, &str)]) -> fundfacts_core::Result<Vec<f32>> {
        pairs
            .iter()
            .map(|(q, d)| self.score_pair(q, d).map_err(Into::into))
            .collect()
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Build the configured reranker; any load failure degrades to passthrough
pub fn build_reranker(settings: &RerankerSettings) -> Reranker {
    let config = RerankerConfig::from(settings);

    match (&settings.model_path, &settings.tokenizer_path) {
        (Some(model), Some(tokenizer)) => {
            #[cfg(feature = "onnx")]
            {
                match OnnxCrossEncoder::new(model, tokenizer, &config) {
                    Ok(encoder) => {
                        tracing::info!(model = %model.display(), "Loaded cross-encoder");
                        return Reranker::new(Arc::new(encoder), config);
                    }
                    Err(e) => {
                        tracing::warn!(
                            model = %model.display(),
                            error = %e,
                            "Cross-encoder unavailable, re-ranking disabled"
                        );
                    }
                }
            }
            #[cfg(not(feature = "onnx"))]
            {
                let _ = (tokenizer, &config);
                tracing::warn!(
                    model = %model.display(),
                    "Cross-encoder configured but built without the onnx feature, re-ranking disabled"
                );
            }
            Reranker::passthrough()
        }
        _ => {
            tracing::debug!("No cross-encoder configured, re-ranking is a passthrough");
            Reranker::passthrough()
        }
    }
}
