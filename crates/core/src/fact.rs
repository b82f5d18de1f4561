//! Fact table rows and derived conflict records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Field, SchemeTag, SourceType};

/// One row of the fact table: the seven canonical fields of a single source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRecord {
    pub source_id: String,
    pub scheme_tag: SchemeTag,
    pub source_type: SourceType,
    #[serde(alias = "minimum_sip")]
    pub min_sip: Option<String>,
    pub min_lumpsum: Option<String>,
    pub exit_load: Option<String>,
    pub lock_in: Option<String>,
    pub expense_ratio: Option<String>,
    pub benchmark: Option<String>,
    pub riskometer: Option<String>,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub last_fetched_date: Option<String>,
}

impl FactRecord {
    pub fn new(source_id: impl Into<String>, scheme_tag: SchemeTag, source_type: SourceType) -> Self {
        Self {
            source_id: source_id.into(),
            scheme_tag,
            source_type,
            min_sip: None,
            min_lumpsum: None,
            exit_load: None,
            lock_in: None,
            expense_ratio: None,
            benchmark: None,
            riskometer: None,
            source_url: String::new(),
            last_fetched_date: None,
        }
    }

    /// Value of a field, treating blank strings as absent
    pub fn get(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::MinSip => &self.min_sip,
            Field::MinLumpsum => &self.min_lumpsum,
            Field::ExitLoad => &self.exit_load,
            Field::LockIn => &self.lock_in,
            Field::ExpenseRatio => &self.expense_ratio,
            Field::Benchmark => &self.benchmark,
            Field::Riskometer => &self.riskometer,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }

    pub fn set(&mut self, field: Field, value: Option<String>) {
        let slot = match field {
            Field::MinSip => &mut self.min_sip,
            Field::MinLumpsum => &mut self.min_lumpsum,
            Field::ExitLoad => &mut self.exit_load,
            Field::LockIn => &mut self.lock_in,
            Field::ExpenseRatio => &mut self.expense_ratio,
            Field::Benchmark => &mut self.benchmark,
            Field::Riskometer => &mut self.riskometer,
        };
        *slot = value;
    }

    /// Builder-style setter
    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, Some(value.into()));
        self
    }

    /// Number of populated fields
    pub fn populated(&self) -> usize {
        Field::ALL.iter().filter(|f| self.get(**f).is_some()).count()
    }
}

/// Disagreement between the most authoritative source and another source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub scheme_tag: SchemeTag,
    pub field: Field,
    pub authoritative_source: String,
    pub authoritative_value: String,
    pub authoritative_priority: f32,
    pub conflicting_source: String,
    pub conflicting_value: String,
    pub conflicting_priority: f32,
    pub detected_at: DateTime<Utc>,
}
