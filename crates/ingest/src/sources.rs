//! Source registry (`sources.csv`) and per-source text files

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use fundfacts_core::{SchemeTag, SourceDocument, SourceType};

use crate::{IngestError, Result};

/// One registry row as written in the CSV
#[derive(Debug, Deserialize)]
struct RegistryRow {
    source_id: String,
    source_url: String,
    source_type: SourceType,
    scheme_tag: SchemeTag,
    // The free-form `authority` column is ignored; weights come from the source type
    #[serde(default)]
    last_fetched_date: Option<String>,
}

/// Registry entries in file order
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<SourceDocument>,
    by_id: HashMap<String, usize>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<SourceDocument>) -> Self {
        let by_id = sources
            .iter()
            .enumerate()
            .map(|(i, s)| (s.source_id.clone(), i))
            .collect();
        Self { sources, by_id }
    }

    pub fn get(&self, source_id: &str) -> Option<&SourceDocument> {
        self.by_id.get(source_id).map(|&i| &self.sources[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceDocument> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Registered schemes, `ALL` excluded
    pub fn schemes(&self) -> Vec<SchemeTag> {
        let mut schemes: Vec<SchemeTag> = self
            .sources
            .iter()
            .map(|s| s.scheme_tag)
            .filter(|s| *s != SchemeTag::All)
            .collect();
        schemes.sort();
        schemes.dedup();
        schemes
    }
}

/// Load `sources.csv`. Unknown source types or scheme tags are integrity errors.
pub fn load_registry(path: &Path) -> Result<SourceRegistry> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        IngestError::Registry(format!("failed to open {}: {}", path.display(), e))
    })?;

    let mut sources = Vec::new();
    let mut seen = HashMap::new();
    for (row_no, record) in reader.deserialize::<RegistryRow>().enumerate() {
        let row = record.map_err(|e| {
            IngestError::DataIntegrity(format!("{} row {}: {}", path.display(), row_no + 1, e))
        })?;
        if seen.insert(row.source_id.clone(), row_no).is_some() {
            tracing::warn!(source_id = %row.source_id, "Duplicate source id, keeping the first row");
            continue;
        }
        let last_fetched = row.last_fetched_date.filter(|d| !d.trim().is_empty());
        sources.push(SourceDocument::new(
            row.source_id,
            row.source_url,
            row.source_type,
            row.scheme_tag,
            last_fetched,
        ));
    }

    tracing::info!(sources = sources.len(), path = %path.display(), "Loaded source registry");
    Ok(SourceRegistry::new(sources))
}

/// Read `{dir}/{source_id}.txt`; a missing file is `None`
pub fn read_source_text(dir: &Path, source_id: &str) -> Result<Option<String>> {
    let path = dir.join(format!("{}.txt", source_id));
    match fs::read_to_string(&path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::warn!(source_id, path = %path.display(), "Source text not found");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
