//! Embedding and vector index build
//!
//! Writes three files that must agree with each other: the flat vector
//! index, the index-aligned metadata array and a manifest describing both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use fundfacts_config::DataConfig;
use fundfacts_core::{write_atomic, Chunk, EmbeddingProvider};
use fundfacts_rag::{write_metadata, FlatIndex};

use crate::{IngestError, Result};

/// Texts sent to the embedder per call
const EMBED_BATCH: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub vector_db: String,
    pub index_path: PathBuf,
    pub metadata_path: PathBuf,
    pub distance_metric: String,
    pub vector_count: usize,
    pub dimension: usize,
    pub embedding_model: String,
    pub built_at: DateTime<Utc>,
}

/// Embed every chunk in order and write index, metadata and manifest
pub fn build_index(
    chunks: &[Chunk],
    embedder: &dyn EmbeddingProvider,
    data: &DataConfig,
) -> Result<IndexManifest> {
    let dimension = embedder.dimension();
    let mut vectors = Vec::with_capacity(chunks.len());

    for (batch_no, batch) in chunks.chunks(EMBED_BATCH).enumerate() {
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        let embedded = embedder.encode(&texts)?;
        if embedded.len() != batch.len() {
            return Err(IngestError::DataIntegrity(format!(
                "embedder returned {} vectors for {} texts",
                embedded.len(),
                batch.len()
            )));
        }
        vectors.extend(embedded);
        tracing::debug!(batch = batch_no, embedded = vectors.len(), total = chunks.len(), "Embedded batch");
    }

    let index = FlatIndex::from_vectors(dimension, &vectors)?;
    index.save(&data.index_path)?;
    write_metadata(&data.metadata_path, chunks)?;

    let manifest = IndexManifest {
        vector_db: "flat".to_string(),
        index_path: data.index_path.clone(),
        metadata_path: data.metadata_path.clone(),
        distance_metric: "inner_product".to_string(),
        vector_count: index.len(),
        dimension,
        embedding_model: embedder.model_name().to_string(),
        built_at: Utc::now(),
    };
    write_atomic(&data.index_manifest_path, |w| {
        serde_json::to_writer_pretty(&mut *w, &manifest)?;
        Ok(())
    })?;

    tracing::info!(
        vectors = manifest.vector_count,
        dimension,
        model = %manifest.embedding_model,
        "Built vector index"
    );
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fundfacts_core::{Field, SchemeTag, SourceType};
    use fundfacts_rag::{load_corpus, HashEmbedder};

    fn chunk(id: &str, text: &str, field: Option<Field>) -> Chunk {
        Chunk {
            id: id.to_string(),
            source_id: "hdfc_flexicap_kim".to_string(),
            text: text.to_string(),
            scheme_tag: SchemeTag::FlexiCap,
            field,
            source_type: SourceType::KimPdf,
            source_url: String::new(),
            last_fetched_date: None,
        }
    }

    #[test]
    fn test_build_index_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let data = DataConfig {
            index_path: dir.path().join("index/vectors.bin"),
            metadata_path: dir.path().join("index/metadata.json"),
            index_manifest_path: dir.path().join("index/index_metadata.json"),
            ..DataConfig::default()
        };
        let chunks = vec![
            chunk("hdfc_flexicap_kim__min_sip", "Minimum SIP: ₹100. Source: hdfc_flexicap_kim (kim_pdf).", Some(Field::MinSip)),
            chunk("hdfc_flexicap_kim::fulltext::0", "HDFC Flexi Cap Fund scheme details", None),
        ];

        let embedder = HashEmbedder::default();
        let manifest = build_index(&chunks, &embedder, &data).unwrap();
        assert_eq!(manifest.vector_count, 2);
        assert_eq!(manifest.dimension, embedder.dimension());
        assert_eq!(manifest.distance_metric, "inner_product");

        let (index, store) = load_corpus(&data.index_path, &data.metadata_path).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(store.get(0).unwrap().field, Some(Field::MinSip));

        let written: IndexManifest =
            serde_json::from_str(&std::fs::read_to_string(&data.index_manifest_path).unwrap()).unwrap();
        assert_eq!(written, manifest);
    }
}
