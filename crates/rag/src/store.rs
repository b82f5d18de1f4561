//! Read-only chunk corpus and fact table
//!
//! The corpus keeps chunks in index order (position `i` matches vector `i`)
//! and precomputes the three lookup maps used by the retriever and the
//! extractor: by scheme, by (scheme, field) and by source id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use fundfacts_config::constants::statutory;
use fundfacts_core::{write_atomic, Chunk, FactRecord, Field, SchemeTag, SourceType};

use crate::index::FlatIndex;
use crate::RagError;

/// One entry of the index-aligned metadata array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub authority: f32,
    /// Field name for fact chunks, `fulltext` otherwise
    pub snippet_keyword: String,
}

impl From<&Chunk> for ChunkMetadata {
    fn from(chunk: &Chunk) -> Self {
        Self {
            authority: chunk.authority(),
            snippet_keyword: chunk
                .field
                .map(|f| f.as_str().to_string())
                .unwrap_or_else(|| "fulltext".to_string()),
            chunk: chunk.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CorpusStore {
    chunks: Vec<Chunk>,
    scheme_indices: HashMap<SchemeTag, Vec<usize>>,
    field_indices: HashMap<(SchemeTag, Field), Vec<usize>>,
    source_indices: HashMap<String, Vec<usize>>,
}

impl CorpusStore {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        let mut scheme_indices: HashMap<SchemeTag, Vec<usize>> = HashMap::new();
        let mut field_indices: HashMap<(SchemeTag, Field), Vec<usize>> = HashMap::new();
        let mut source_indices: HashMap<String, Vec<usize>> = HashMap::new();

        for (idx, chunk) in chunks.iter().enumerate() {
            scheme_indices.entry(chunk.scheme_tag).or_default().push(idx);
            if let Some(field) = chunk.field {
                field_indices
                    .entry((chunk.scheme_tag, field))
                    .or_default()
                    .push(idx);
            }
            source_indices
                .entry(chunk.source_id.clone())
                .or_default()
                .push(idx);
        }

        tracing::debug!(
            chunks = chunks.len(),
            schemes = scheme_indices.len(),
            field_buckets = field_indices.len(),
            sources = source_indices.len(),
            "Built corpus lookup maps"
        );

        Self {
            chunks,
            scheme_indices,
            field_indices,
            source_indices,
        }
    }

    /// Load the index-aligned metadata JSON array
    pub fn load_metadata(path: &Path) -> Result<Self, RagError> {
        let file = File::open(path).map_err(|e| {
            RagError::Index(format!("failed to open metadata {}: {}", path.display(), e))
        })?;
        let entries: Vec<ChunkMetadata> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| RagError::DataIntegrity(format!("{}: {}", path.display(), e)))?;
        Ok(Self::new(entries.into_iter().map(|m| m.chunk).collect()))
    }

    /// Load a JSON-Lines chunk corpus
    pub fn load_jsonl(path: &Path) -> Result<Self, RagError> {
        Ok(Self::new(read_chunks_jsonl(path)?))
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Chunk> {
        self.chunks.get(idx)
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn by_scheme(&self, scheme: SchemeTag) -> &[usize] {
        self.scheme_indices
            .get(&scheme)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn by_scheme_field(&self, scheme: SchemeTag, field: Field) -> &[usize] {
        self.field_indices
            .get(&(scheme, field))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn by_source(&self, source_id: &str) -> &[usize] {
        self.source_indices
            .get(source_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Canonical fact chunk for `field`, preferring the scheme's own row over an ALL row.
    ///
    /// Without a scheme the first fact chunk for the field is returned.
    pub fn lookup_fact(&self, field: Field, scheme: Option<SchemeTag>) -> Option<&Chunk> {
        match scheme {
            Some(scheme) => self
                .by_scheme_field(scheme, field)
                .first()
                .or_else(|| self.by_scheme_field(SchemeTag::All, field).first())
                .and_then(|&idx| self.get(idx)),
            None => self.chunks.iter().find(|c| c.field == Some(field)),
        }
    }

    /// Overview chunks of a fund, by AMC overview id or by type and scheme
    pub fn overview_chunks(&self, scheme: SchemeTag) -> impl Iterator<Item = (usize, &Chunk)> {
        let amc_source = scheme.overview_slug().map(|slug| format!("amc_{}_overview", slug));
        self.chunks.iter().enumerate().filter(move |(_, c)| {
            amc_source.as_deref() == Some(c.source_id.as_str())
                || (c.source_type == SourceType::SchemeOverview && c.scheme_tag == scheme)
        })
    }
}

/// Load vector index and metadata, failing fast when they are not aligned
pub fn load_corpus(index_path: &Path, metadata_path: &Path) -> Result<(FlatIndex, CorpusStore), RagError> {
    let index = FlatIndex::load(index_path)?;
    let store = CorpusStore::load_metadata(metadata_path)?;

    if index.len() != store.len() {
        return Err(RagError::DataIntegrity(format!(
            "vector index has {} entries but metadata has {}",
            index.len(),
            store.len()
        )));
    }

    tracing::info!(
        index = %index_path.display(),
        vectors = index.len(),
        dim = index.dim(),
        "Loaded corpus"
    );
    Ok((index, store))
}

pub fn read_chunks_jsonl(path: &Path) -> Result<Vec<Chunk>, RagError> {
    let file = File::open(path).map_err(|e| {
        RagError::Index(format!("failed to open chunks {}: {}", path.display(), e))
    })?;

    let mut chunks = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let chunk: Chunk = serde_json::from_str(&line).map_err(|e| {
            RagError::DataIntegrity(format!("{}:{}: {}", path.display(), line_no + 1, e))
        })?;
        chunks.push(chunk);
    }
    Ok(chunks)
}

pub fn write_chunks_jsonl(path: &Path, chunks: &[Chunk]) -> Result<(), RagError> {
    write_atomic(path, |w| {
        for chunk in chunks {
            serde_json::to_writer(&mut *w, chunk)?;
            w.write_all(b"\n")?;
        }
        Ok(())
    })?;
    Ok(())
}

pub fn write_metadata(path: &Path, chunks: &[Chunk]) -> Result<(), RagError> {
    let entries: Vec<ChunkMetadata> = chunks.iter().map(ChunkMetadata::from).collect();
    write_atomic(path, |w| {
        serde_json::to_writer_pretty(&mut *w, &entries)?;
        Ok(())
    })?;
    Ok(())
}

/// Row-level fact table rules.
///
/// ELSS lock-in is always the statutory period and no other scheme carries
/// one. The expense ratio is only kept from factsheets and regulatory filings.
pub fn enforce_fact_invariants(row: &mut FactRecord) {
    let lock_in = row.get(Field::LockIn).map(str::to_string);
    if row.scheme_tag == SchemeTag::Elss {
        if lock_in.as_deref() != Some(statutory::ELSS_LOCK_IN) {
            if let Some(stated) = &lock_in {
                tracing::warn!(
                    source_id = %row.source_id,
                    stated = %stated,
                    "ELSS lock-in overridden with statutory period"
                );
            }
            row.set(Field::LockIn, Some(statutory::ELSS_LOCK_IN.to_string()));
        }
    } else if let Some(stated) = lock_in {
        tracing::warn!(
            source_id = %row.source_id,
            scheme = %row.scheme_tag,
            stated = %stated,
            "Dropped lock-in on non-ELSS scheme"
        );
        row.set(Field::LockIn, None);
    }

    let ter_allowed = matches!(
        row.source_type,
        SourceType::FactsheetConsolidated | SourceType::Regulatory
    );
    if !ter_allowed {
        if let Some(value) = row.get(Field::ExpenseRatio).map(str::to_string) {
            tracing::warn!(
                source_id = %row.source_id,
                source_type = %row.source_type,
                value = %value,
                "Dropped expense ratio from disallowed source"
            );
            row.set(Field::ExpenseRatio, None);
        }
    }
}

/// Load the fact table CSV; unknown scheme tags or source types are integrity errors
pub fn load_fact_table(path: &Path) -> Result<Vec<FactRecord>, RagError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        RagError::Index(format!("failed to open fact table {}: {}", path.display(), e))
    })?;

    let mut rows = Vec::new();
    for (row_no, record) in reader.deserialize::<FactRecord>().enumerate() {
        let mut row = record.map_err(|e| {
            RagError::DataIntegrity(format!("{} row {}: {}", path.display(), row_no + 1, e))
        })?;
        enforce_fact_invariants(&mut row);
        rows.push(row);
    }
    Ok(rows)
}

pub fn write_fact_table(path: &Path, rows: &[FactRecord]) -> Result<(), RagError> {
    write_atomic(path, |w| {
        let mut writer = csv::Writer::from_writer(w);
        for row in rows {
            writer
                .serialize(row)
                .map_err(|e| fundfacts_core::Error::DataIntegrity(e.to_string()))?;
        }
        writer.flush()?;
        Ok(())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, source: &str, scheme: SchemeTag, field: Option<Field>, st: SourceType) -> Chunk {
        Chunk {
            id: id.to_string(),
            source_id: source.to_string(),
            text: format!("text of {}", id),
            scheme_tag: scheme,
            field,
            source_type: st,
            source_url: String::new(),
            last_fetched_date: None,
        }
    }

    fn sample() -> CorpusStore {
        CorpusStore::new(vec![
            chunk("a", "elss_kim", SchemeTag::Elss, Some(Field::MinSip), SourceType::KimPdf),
            chunk("b", "all_sebi", SchemeTag::All, Some(Field::Riskometer), SourceType::Regulatory),
            chunk("c", "elss_kim", SchemeTag::Elss, None, SourceType::KimPdf),
            chunk("d", "amc_elss_overview", SchemeTag::Elss, None, SourceType::SchemeOverview),
        ])
    }

    #[test]
    fn test_lookup_maps() {
        let store = sample();
        assert_eq!(store.by_scheme(SchemeTag::Elss), &[0, 2, 3]);
        assert_eq!(store.by_scheme_field(SchemeTag::Elss, Field::MinSip), &[0]);
        assert!(store.by_scheme_field(SchemeTag::Hybrid, Field::MinSip).is_empty());
        assert_eq!(store.by_source("elss_kim"), &[0, 2]);
    }

    #[test]
    fn test_lookup_fact_prefers_scheme_then_all() {
        let store = sample();
        assert_eq!(store.lookup_fact(Field::MinSip, Some(SchemeTag::Elss)).unwrap().id, "a");
        assert_eq!(
            store.lookup_fact(Field::Riskometer, Some(SchemeTag::LargeCap)).unwrap().id,
            "b"
        );
        assert!(store.lookup_fact(Field::MinSip, Some(SchemeTag::Hybrid)).is_none());
        assert_eq!(store.lookup_fact(Field::Riskometer, None).unwrap().id, "b");
    }

    #[test]
    fn test_overview_chunks() {
        let store = sample();
        let ids: Vec<&str> = store
            .overview_chunks(SchemeTag::Elss)
            .map(|(_, c)| c.id.as_str())
            .collect();
        assert_eq!(ids, vec!["d"]);
    }

    #[test]
    fn test_misaligned_corpus_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("vectors.bin");
        let metadata_path = dir.path().join("metadata.json");

        let store = sample();
        FlatIndex::from_vectors(2, &[vec![1.0, 0.0], vec![0.0, 1.0]])
            .unwrap()
            .save(&index_path)
            .unwrap();
        write_metadata(&metadata_path, store.chunks()).unwrap();

        let err = load_corpus(&index_path, &metadata_path).unwrap_err();
        assert!(matches!(err, RagError::DataIntegrity(_)));
    }

    #[test]
    fn test_jsonl_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.jsonl");
        write_chunks_jsonl(&path, sample().chunks()).unwrap();

        let loaded = CorpusStore::load_jsonl(&path).unwrap();
        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded.get(1).unwrap().field, Some(Field::Riskometer));
    }

    #[test]
    fn test_fact_table_rejects_unknown_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.csv");
        std::fs::write(
            &path,
            "source_id,scheme_tag,source_type,min_sip,min_lumpsum,exit_load,lock_in,expense_ratio,benchmark,riskometer,source_url,last_fetched_date\n\
             x,MID_CAP,sid_pdf,,,1%,,,,,,\n",
        )
        .unwrap();

        assert!(matches!(load_fact_table(&path), Err(RagError::DataIntegrity(_))));
    }

    #[test]
    fn test_fact_table_round_trip_keeps_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.csv");
        let row = FactRecord::new("elss_sid", SchemeTag::Elss, SourceType::SidPdf)
            .with(Field::ExitLoad, "1%")
            .with(Field::LockIn, "3 years");
        write_fact_table(&path, &[row]).unwrap();

        let rows = load_fact_table(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(Field::ExitLoad), Some("1%"));
        assert_eq!(rows[0].get(Field::ExpenseRatio), None);
    }

    #[test]
    fn test_loaded_rows_follow_fact_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.csv");
        std::fs::write(
            &path,
            "source_id,scheme_tag,source_type,min_sip,min_lumpsum,exit_load,lock_in,expense_ratio,benchmark,riskometer,source_url,last_fetched_date\n\
             elss_sid,ELSS,sid_pdf,,,1%,5 years,1.20%,,,,\n\
             elss_kim,ELSS,kim_pdf,₹500,,,,,,,,\n\
             flexi_fs,FLEXI_CAP,factsheet_consolidated,,,,3 years,0.97%,,,,\n",
        )
        .unwrap();

        let rows = load_fact_table(&path).unwrap();
        assert_eq!(rows[0].get(Field::LockIn), Some("3 years"));
        assert_eq!(rows[0].get(Field::ExpenseRatio), None);
        assert_eq!(rows[0].get(Field::ExitLoad), Some("1%"));
        assert_eq!(rows[1].get(Field::LockIn), Some("3 years"));
        assert_eq!(rows[2].get(Field::LockIn), None);
        assert_eq!(rows[2].get(Field::ExpenseRatio), Some("0.97%"));
    }
}
