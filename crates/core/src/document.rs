//! Source documents and retrievable chunks

use serde::{Deserialize, Serialize};

use crate::{source_authority, Field, SchemeTag, SourceType};

/// Immutable registry entry for one fetched source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub source_id: String,
    pub source_url: String,
    pub source_type: SourceType,
    pub scheme_tag: SchemeTag,
    /// Derived from `source_type` (and id for regulatory sources)
    pub authority_weight: f32,
    pub last_fetched_date: Option<String>,
}

impl SourceDocument {
    pub fn new(
        source_id: impl Into<String>,
        source_url: impl Into<String>,
        source_type: SourceType,
        scheme_tag: SchemeTag,
        last_fetched_date: Option<String>,
    ) -> Self {
        let source_id = source_id.into();
        let authority_weight = source_authority(&source_id, source_type);
        Self {
            source_id,
            source_url: source_url.into(),
            source_type,
            scheme_tag,
            authority_weight,
            last_fetched_date,
        }
    }
}

/// A unit of retrievable text
///
/// `field` is set only for canonical fact chunks; free-text chunks leave it empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub source_id: String,
    pub text: String,
    pub scheme_tag: SchemeTag,
    #[serde(default)]
    pub field: Option<Field>,
    pub source_type: SourceType,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub last_fetched_date: Option<String>,
}

impl Chunk {
    pub fn authority(&self) -> f32 {
        source_authority(&self.source_id, self.source_type)
    }

    /// True when the chunk carries a usable fetch timestamp
    pub fn has_timestamp(&self) -> bool {
        self.last_fetched_date
            .as_deref()
            .map(|d| !d.trim().is_empty())
            .unwrap_or(false)
    }
}
