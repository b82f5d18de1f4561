//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants;
use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - missing model files fall back to hash embeddings
    #[default]
    Development,
    /// Staging mode - stricter validation
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if strict validation should be applied
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Artifact locations
    #[serde(default)]
    pub data: DataConfig,

    /// Hierarchical retriever tuning
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub embedding: EmbeddingSettings,

    #[serde(default)]
    pub reranker: RerankerSettings,

    /// Response cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Offline build job
    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_retrieval()?;
        self.validate_embedding()?;
        self.validate_cache()?;
        self.validate_ingest()?;
        self.validate_model_paths()?;
        Ok(())
    }

    fn validate_retrieval(&self) -> Result<(), ConfigError> {
        let retrieval = &self.retrieval;

        if retrieval.default_top_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.default_top_k".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if retrieval.field_filter_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.field_filter_threshold".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if retrieval.dedup_prefix_chars == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.dedup_prefix_chars".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    fn validate_embedding(&self) -> Result<(), ConfigError> {
        if self.embedding.dimension == 0 {
            return Err(ConfigError::InvalidValue {
                field: "embedding.dimension".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "embedding.batch_size".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    fn validate_cache(&self) -> Result<(), ConfigError> {
        if !self.cache.enabled {
            return Ok(());
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.max_entries".to_string(),
                message: "Must be at least 1 when the cache is enabled".to_string(),
            });
        }
        if self.cache.ttl_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.ttl_seconds".to_string(),
                message: "Must be at least 1 when the cache is enabled".to_string(),
            });
        }
        Ok(())
    }

    fn validate_ingest(&self) -> Result<(), ConfigError> {
        let ingest = &self.ingest;

        if ingest.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ingest.chunk_size".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if ingest.chunk_overlap >= ingest.chunk_size {
            return Err(ConfigError::InvalidValue {
                field: "ingest.chunk_overlap".to_string(),
                message: format!(
                    "Overlap ({}) must be smaller than chunk_size ({})",
                    ingest.chunk_overlap, ingest.chunk_size
                ),
            });
        }

        if ingest.max_fact_chunk_chars > ingest.max_chunk_chars {
            return Err(ConfigError::InvalidValue {
                field: "ingest.max_fact_chunk_chars".to_string(),
                message: format!("Must not exceed max_chunk_chars ({})", ingest.max_chunk_chars),
            });
        }

        Ok(())
    }

    /// In strict environments configured model files must exist
    fn validate_model_paths(&self) -> Result<(), ConfigError> {
        if !self.environment.is_strict() {
            return Ok(());
        }

        let paths = [
            ("embedding.model_path", &self.embedding.model_path),
            ("embedding.tokenizer_path", &self.embedding.tokenizer_path),
            ("reranker.model_path", &self.reranker.model_path),
            ("reranker.tokenizer_path", &self.reranker.tokenizer_path),
        ];

        for (field, path) in paths {
            if let Some(path) = path {
                if !path.exists() {
                    return Err(ConfigError::FileNotFound(format!(
                        "{} = {}",
                        field,
                        path.display()
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Locations of the persisted artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Source registry CSV
    #[serde(default = "default_sources_csv")]
    pub sources_csv: PathBuf,

    /// Directory holding `{source_id}.txt` extracted text
    #[serde(default = "default_raw_text_dir")]
    pub raw_text_dir: PathBuf,

    /// JSON-Lines chunk corpus
    #[serde(default = "default_chunks_path")]
    pub chunks_path: PathBuf,

    /// Flat vector index file
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Index-aligned metadata JSON array
    #[serde(default = "default_metadata_path")]
    pub metadata_path: PathBuf,

    #[serde(default = "default_manifest_path")]
    pub index_manifest_path: PathBuf,

    /// Fact table CSV
    #[serde(default = "default_facts_path")]
    pub facts_path: PathBuf,

    #[serde(default = "default_conflicts_log_path")]
    pub conflicts_log_path: PathBuf,

    /// Sources whose text is too short to use
    #[serde(default = "default_ocr_required_path")]
    pub ocr_required_path: PathBuf,
}

fn default_sources_csv() -> PathBuf {
    PathBuf::from("data/sources.csv")
}
fn default_raw_text_dir() -> PathBuf {
    PathBuf::from("data/raw")
}
fn default_chunks_path() -> PathBuf {
    PathBuf::from("data/chunks.jsonl")
}
fn default_index_path() -> PathBuf {
    PathBuf::from("data/index/vectors.bin")
}
fn default_metadata_path() -> PathBuf {
    PathBuf::from("data/index/metadata.json")
}
fn default_manifest_path() -> PathBuf {
    PathBuf::from("data/index/index_metadata.json")
}
fn default_facts_path() -> PathBuf {
    PathBuf::from("data/extracted_facts.csv")
}
fn default_conflicts_log_path() -> PathBuf {
    PathBuf::from("data/conflicts.json")
}
fn default_ocr_required_path() -> PathBuf {
    PathBuf::from("data/ocr_required.txt")
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            sources_csv: default_sources_csv(),
            raw_text_dir: default_raw_text_dir(),
            chunks_path: default_chunks_path(),
            index_path: default_index_path(),
            metadata_path: default_metadata_path(),
            index_manifest_path: default_manifest_path(),
            facts_path: default_facts_path(),
            conflicts_log_path: default_conflicts_log_path(),
            ocr_required_path: default_ocr_required_path(),
        }
    }
}

/// Hierarchical retriever settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Minimum (scheme, field) bucket size before narrowing
    #[serde(default = "default_field_filter_threshold")]
    pub field_filter_threshold: usize,

    /// Narrow by scheme and field before filtering search results
    #[serde(default = "default_true")]
    pub hierarchical: bool,

    /// Use the cross-encoder when one is loaded
    #[serde(default = "default_true")]
    pub reranking_enabled: bool,

    /// Inject an overview chunk for sparse metric results
    #[serde(default = "default_true")]
    pub include_overview: bool,

    #[serde(default = "default_dedup_prefix_chars")]
    pub dedup_prefix_chars: usize,
}

fn default_true() -> bool {
    true
}
fn default_top_k() -> usize {
    constants::retrieval::DEFAULT_TOP_K
}
fn default_field_filter_threshold() -> usize {
    constants::retrieval::FIELD_FILTER_THRESHOLD
}
fn default_dedup_prefix_chars() -> usize {
    constants::retrieval::DEDUP_PREFIX_CHARS
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            field_filter_threshold: default_field_filter_threshold(),
            hierarchical: true,
            reranking_enabled: true,
            include_overview: true,
            dedup_prefix_chars: default_dedup_prefix_chars(),
        }
    }
}

/// Embedding model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// ONNX model file; without it a deterministic hash embedder is used
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    #[serde(default)]
    pub tokenizer_path: Option<PathBuf>,

    #[serde(default = "default_embedding_dim")]
    pub dimension: usize,

    #[serde(default = "default_true")]
    pub normalize: bool,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_embedding_seq_len")]
    pub max_seq_len: usize,
}

fn default_embedding_dim() -> usize {
    constants::embedding::DIMENSION
}
fn default_batch_size() -> usize {
    constants::embedding::BATCH_SIZE
}
fn default_embedding_seq_len() -> usize {
    constants::embedding::MAX_SEQ_LEN
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model_path: None,
            tokenizer_path: None,
            dimension: default_embedding_dim(),
            normalize: true,
            batch_size: default_batch_size(),
            max_seq_len: default_embedding_seq_len(),
        }
    }
}

/// Cross-encoder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerSettings {
    /// ONNX cross-encoder; absent means passthrough re-ranking
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    #[serde(default)]
    pub tokenizer_path: Option<PathBuf>,

    #[serde(default = "default_reranker_seq_len")]
    pub max_seq_len: usize,
}

fn default_reranker_seq_len() -> usize {
    constants::reranker::MAX_SEQ_LEN
}

impl Default for RerankerSettings {
    fn default() -> Self {
        Self {
            model_path: None,
            tokenizer_path: None,
            max_seq_len: default_reranker_seq_len(),
        }
    }
}

/// LRU + TTL response cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,

    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
}

fn default_cache_entries() -> usize {
    constants::cache::MAX_ENTRIES
}
fn default_cache_ttl() -> u64 {
    constants::cache::TTL_SECONDS
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: default_cache_entries(),
            ttl_seconds: default_cache_ttl(),
        }
    }
}

/// Offline build job settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_max_chunks")]
    pub max_chunks_per_source: usize,

    #[serde(default = "default_min_source_chars")]
    pub min_source_chars: usize,

    #[serde(default = "default_max_fact_chunk_chars")]
    pub max_fact_chunk_chars: usize,

    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,

    /// Also emit windowed full-text chunks
    #[serde(default = "default_true")]
    pub include_full_text: bool,
}

fn default_chunk_size() -> usize {
    constants::ingest::CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    constants::ingest::CHUNK_OVERLAP
}
fn default_max_chunks() -> usize {
    constants::ingest::MAX_CHUNKS_PER_SOURCE
}
fn default_min_source_chars() -> usize {
    constants::ingest::MIN_SOURCE_CHARS
}
fn default_max_fact_chunk_chars() -> usize {
    constants::ingest::MAX_FACT_CHUNK_CHARS
}
fn default_max_chunk_chars() -> usize {
    constants::ingest::MAX_CHUNK_CHARS
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_chunks_per_source: default_max_chunks(),
            min_source_chars: default_min_source_chars(),
            max_fact_chunk_chars: default_max_fact_chunk_chars(),
            max_chunk_chars: default_max_chunk_chars(),
            include_full_text: true,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

/// Load settings from files and environment
///
/// Priority: env vars > config/{env} > config/default > defaults
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("FUNDFACTS")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
