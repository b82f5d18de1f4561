//! Centralized constants for the fundfacts engine
//!
//! Single source of truth for tuned defaults used across crates. Settings
//! default to these values and may override them.

/// Retrieval tuning
pub mod retrieval {
    /// Results returned when the caller does not ask for a count
    pub const DEFAULT_TOP_K: usize = 5;

    /// Minimum size of a (scheme, field) bucket before a metric query is narrowed to it.
    /// Empirically tuned; smaller buckets are skipped to avoid over-narrowing.
    pub const FIELD_FILTER_THRESHOLD: usize = 3;

    /// Characters of chunk text used as the dedup fingerprint
    pub const DEDUP_PREFIX_CHARS: usize = 100;

    /// Hybrid score weights
    pub const VECTOR_WEIGHT: f32 = 0.5;
    pub const KEYWORD_WEIGHT: f32 = 0.15;
    pub const AUTHORITY_WEIGHT: f32 = 0.15;
    pub const TYPE_BOOST_WEIGHT: f32 = 0.2;

    /// Keyword score saturates here
    pub const KEYWORD_SCORE_CAP: f32 = 2.0;

    /// Similarity assigned to an injected overview chunk
    pub const OVERVIEW_INJECTION_SIMILARITY: f32 = 0.5;

    /// Characters of an overview chunk scanned for a decimal value
    pub const OVERVIEW_DECIMAL_WINDOW: usize = 300;
}

/// Embedding model defaults
pub mod embedding {
    /// Embedding dimension (all-MiniLM-L6-v2 class models)
    pub const DIMENSION: usize = 384;
    pub const MAX_SEQ_LEN: usize = 256;
    pub const BATCH_SIZE: usize = 32;
    pub const OUTPUT_NAME: &str = "last_hidden_state";
}

/// Cross-encoder defaults
pub mod reranker {
    pub const MAX_SEQ_LEN: usize = 512;

    /// Multiplier applied when a candidate has a fetch timestamp
    pub const RECENCY_BONUS: f32 = 1.05;
}

/// Response cache defaults
pub mod cache {
    pub const MAX_ENTRIES: usize = 100;
    pub const TTL_SECONDS: u64 = 3600;
}

/// Offline ingestion defaults
pub mod ingest {
    /// Full-text window size in characters
    pub const CHUNK_SIZE: usize = 600;
    /// Overlap between consecutive windows
    pub const CHUNK_OVERLAP: usize = 100;
    pub const MAX_CHUNKS_PER_SOURCE: usize = 200;
    /// Windows at or below this length are dropped
    pub const MIN_SEGMENT_CHARS: usize = 100;
    /// Upper bound on any chunk's text
    pub const MAX_CHUNK_CHARS: usize = 1500;
    /// Upper bound on canonical fact chunk text
    pub const MAX_FACT_CHUNK_CHARS: usize = 600;
    /// Sources shorter than this need OCR
    pub const MIN_SOURCE_CHARS: usize = 200;
    /// Fewer populated fields per scheme than this is reported
    pub const MIN_FIELDS_PER_SCHEME: usize = 3;
}

/// Sanity bounds for extracted percentages
pub mod bounds {
    pub const EXPENSE_RATIO_MIN: f64 = 0.1;
    pub const EXPENSE_RATIO_MAX: f64 = 5.0;
    pub const EXIT_LOAD_MIN: f64 = 0.1;
    pub const EXIT_LOAD_MAX: f64 = 10.0;
    /// Smallest plausible SIP instalment in rupees
    pub const MIN_SIP_RUPEES: u64 = 100;
}

/// Conflict detection tolerances
pub mod tolerance {
    /// Percentage points
    pub const PERCENTAGE: f64 = 0.01;
    /// Rupees
    pub const CURRENCY: f64 = 10.0;
}

/// Statutory facts
pub mod statutory {
    /// ELSS lock-in under Section 80C
    pub const ELSS_LOCK_IN: &str = "3 years";
}
