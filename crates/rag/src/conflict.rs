//! Cross-source conflict detection over the fact table
//!
//! Facts are grouped by (scheme, field). Within a group the most
//! authoritative parseable value is compared against every other one and a
//! [`ConflictRecord`] is emitted for each pair outside the field tolerance.
//! Detection only reports divergence; it never rewrites facts.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

use fundfacts_config::constants::tolerance;
use fundfacts_core::{
    source_authority, write_atomic, ConflictRecord, FactRecord, Field, FieldKind, SchemeTag,
};

use crate::store::{enforce_fact_invariants, load_fact_table};
use crate::RagError;

static PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+\.?\d*)\s*%").unwrap());
static GROUPING: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,\s]").unwrap());
static AMOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());
static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

const NULL_VALUES: [&str; 5] = ["nil", "na", "n/a", "not available", ""];

/// Comparable form of a fact value
#[derive(Debug, Clone, PartialEq)]
enum Comparable {
    Number(f64),
    Text(String),
}

fn is_null(value: &str) -> bool {
    NULL_VALUES.contains(&value.trim().to_lowercase().as_str())
}

fn comparable(field: Field, value: &str) -> Option<Comparable> {
    if is_null(value) {
        return None;
    }
    match field.kind() {
        FieldKind::Percentage => PERCENT
            .captures(value)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .map(Comparable::Number),
        FieldKind::Currency => {
            let cleaned = GROUPING.replace_all(value, "");
            AMOUNT
                .find(&cleaned)
                .and_then(|m| m.as_str().parse().ok())
                .map(Comparable::Number)
        }
        FieldKind::Duration => {
            let n: f64 = NUMBER.find(value)?.as_str().parse().ok()?;
            let years = if value.to_lowercase().contains("month") { n / 12.0 } else { n };
            Some(Comparable::Number(years))
        }
        FieldKind::Text => Some(Comparable::Text(
            WHITESPACE.replace_all(value.trim(), " ").to_lowercase(),
        )),
    }
}

fn differs(field: Field, a: &Comparable, b: &Comparable) -> bool {
    match (a, b) {
        (Comparable::Number(x), Comparable::Number(y)) => match field.kind() {
            FieldKind::Percentage => (x - y).abs() > tolerance::PERCENTAGE,
            FieldKind::Currency => (x - y).abs() > tolerance::CURRENCY,
            _ => x != y,
        },
        (Comparable::Text(x), Comparable::Text(y)) => x != y,
        _ => true,
    }
}

struct Observation<'a> {
    row: &'a FactRecord,
    value: &'a str,
    comparable: Comparable,
    authority: f32,
}

fn by_authority_desc(a: &Observation<'_>, b: &Observation<'_>) -> Ordering {
    b.authority.partial_cmp(&a.authority).unwrap_or(Ordering::Equal)
}

/// Read-only view over the fact table
pub struct ConflictDetector {
    facts: Vec<FactRecord>,
}

impl ConflictDetector {
    pub fn new(mut facts: Vec<FactRecord>) -> Self {
        facts.iter_mut().for_each(enforce_fact_invariants);
        Self { facts }
    }

    /// Load the fact table CSV
    pub fn load(path: &Path) -> Result<Self, RagError> {
        let facts = load_fact_table(path)?;
        tracing::debug!(path = %path.display(), rows = facts.len(), "Loaded fact table");
        Ok(Self::new(facts))
    }

    pub fn facts(&self) -> &[FactRecord] {
        &self.facts
    }

    /// Parseable observations grouped by (scheme, field), most authoritative first
    fn grouped(&self) -> BTreeMap<(SchemeTag, Field), Vec<Observation<'_>>> {
        let mut groups: BTreeMap<(SchemeTag, Field), Vec<Observation<'_>>> = BTreeMap::new();
        for row in &self.facts {
            let authority = source_authority(&row.source_id, row.source_type);
            for field in Field::ALL {
                let Some(value) = row.get(field) else { continue };
                let Some(comparable) = comparable(field, value) else { continue };
                groups.entry((row.scheme_tag, field)).or_default().push(Observation {
                    row,
                    value,
                    comparable,
                    authority,
                });
            }
        }
        for observations in groups.values_mut() {
            observations.sort_by(by_authority_desc);
        }
        groups
    }

    /// Conflicts stamped with the given detection time
    pub fn detect_conflicts_at(&self, detected_at: DateTime<Utc>) -> Vec<ConflictRecord> {
        let mut conflicts = Vec::new();
        for ((scheme_tag, field), observations) in self.grouped() {
            let Some((top, rest)) = observations.split_first() else { continue };
            for other in rest {
                if !differs(field, &top.comparable, &other.comparable) {
                    continue;
                }
                conflicts.push(ConflictRecord {
                    scheme_tag,
                    field,
                    authoritative_source: top.row.source_id.clone(),
                    authoritative_value: top.value.to_string(),
                    authoritative_priority: top.authority,
                    conflicting_source: other.row.source_id.clone(),
                    conflicting_value: other.value.to_string(),
                    conflicting_priority: other.authority,
                    detected_at,
                });
            }
        }

        if !conflicts.is_empty() {
            tracing::warn!(count = conflicts.len(), "Detected fact conflicts across sources");
        }
        conflicts
    }

    pub fn detect_conflicts(&self) -> Vec<ConflictRecord> {
        self.detect_conflicts_at(Utc::now())
    }

    /// Conflicts for one (scheme, field) pair
    pub fn conflicts_for(&self, scheme: SchemeTag, field: Field) -> Vec<ConflictRecord> {
        self.detect_conflicts()
            .into_iter()
            .filter(|c| c.scheme_tag == scheme && c.field == field)
            .collect()
    }

    /// Most authoritative non-null `(value, source_id)` for a scheme and field
    pub fn get_resolved_value(&self, scheme: SchemeTag, field: Field) -> Option<(String, String)> {
        let mut candidates: Vec<(&FactRecord, &str, f32)> = self
            .facts
            .iter()
            .filter(|row| row.scheme_tag == scheme)
            .filter_map(|row| {
                let value = row.get(field).filter(|v| !is_null(v))?;
                Some((row, value, source_authority(&row.source_id, row.source_type)))
            })
            .collect();
        candidates.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal));
        candidates
            .first()
            .map(|(row, value, _)| (value.to_string(), row.source_id.clone()))
    }

    /// Write conflicts as pretty JSON, replacing the file atomically
    pub fn log_conflicts(&self, path: &Path, conflicts: &[ConflictRecord]) -> Result<(), RagError> {
        write_atomic(path, |w| {
            serde_json::to_writer_pretty(&mut *w, conflicts)?;
            Ok(())
        })?;
        tracing::info!(path = %path.display(), count = conflicts.len(), "Logged conflicts");
        Ok(())
    }
}
