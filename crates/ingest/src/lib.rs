//! Offline ingestion for the fundfacts engine
//!
//! Turns a source registry plus extracted source text into the artifacts the
//! query side loads:
//! - `sources` reads `sources.csv` and the per-source text files
//! - `cleaning` normalizes text, fixes OCR artifacts and redacts PII
//! - `extractors` pull the seven canonical fields out of cleaned text
//! - `builder` applies source allow-lists, dedups and runs quality checks
//! - `chunker` windows full text into retrievable chunks
//! - `indexer` embeds everything and writes the vector index

pub mod builder;
pub mod chunker;
pub mod cleaning;
pub mod extractors;
pub mod indexer;
pub mod sources;

pub use builder::{
    dedup_fact_chunks, fact_chunk_text, field_sources, quality_checks, BuildOutput, BuildReport,
    FactBuilder, SourceFacts,
};
pub use chunker::FullTextChunker;
pub use cleaning::{clean_text, CleanReport, OcrFix, PiiKind};
pub use indexer::{build_index, IndexManifest};
pub use sources::{load_registry, read_source_text, SourceRegistry};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Source registry error: {0}")]
    Registry(String),

    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Rag(#[from] fundfacts_rag::RagError),

    #[error(transparent)]
    Core(#[from] fundfacts_core::Error),
}

impl From<csv::Error> for IngestError {
    fn from(err: csv::Error) -> Self {
        IngestError::Registry(err.to_string())
    }
}

impl From<IngestError> for fundfacts_core::Error {
    fn from(err: IngestError) -> Self {
        use fundfacts_core::Error;

        match err {
            IngestError::Registry(msg) | IngestError::DataIntegrity(msg) => {
                Error::DataIntegrity(msg)
            }
            IngestError::Io(e) => Error::Io(e),
            IngestError::Rag(e) => e.into(),
            IngestError::Core(e) => e,
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
