//! Closed domain enums: schemes, source types and canonical fields

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Fund identifier a chunk or fact belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemeTag {
    LargeCap,
    FlexiCap,
    Elss,
    Hybrid,
    /// Applies across all funds
    All,
}

impl SchemeTag {
    /// The four concrete funds, excluding `All`
    pub const FUNDS: [SchemeTag; 4] = [
        SchemeTag::LargeCap,
        SchemeTag::FlexiCap,
        SchemeTag::Elss,
        SchemeTag::Hybrid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemeTag::LargeCap => "LARGE_CAP",
            SchemeTag::FlexiCap => "FLEXI_CAP",
            SchemeTag::Elss => "ELSS",
            SchemeTag::Hybrid => "HYBRID",
            SchemeTag::All => "ALL",
        }
    }

    /// Human readable fund name
    pub fn display_name(&self) -> &'static str {
        match self {
            SchemeTag::LargeCap => "HDFC Large Cap Fund",
            SchemeTag::FlexiCap => "HDFC Flexi Cap Fund",
            SchemeTag::Elss => "HDFC TaxSaver (ELSS)",
            SchemeTag::Hybrid => "HDFC Hybrid Equity Fund",
            SchemeTag::All => "All schemes",
        }
    }

    /// Slug used in AMC overview source ids (`amc_{slug}_overview`)
    pub fn overview_slug(&self) -> Option<&'static str> {
        match self {
            SchemeTag::LargeCap => Some("largecap"),
            SchemeTag::FlexiCap => Some("flexicap"),
            SchemeTag::Elss => Some("elss"),
            SchemeTag::Hybrid => Some("hybrid"),
            SchemeTag::All => None,
        }
    }
}

impl fmt::Display for SchemeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemeTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LARGE_CAP" => Ok(SchemeTag::LargeCap),
            "FLEXI_CAP" => Ok(SchemeTag::FlexiCap),
            "ELSS" => Ok(SchemeTag::Elss),
            "HYBRID" => Ok(SchemeTag::Hybrid),
            "ALL" => Ok(SchemeTag::All),
            other => Err(Error::DataIntegrity(format!("unknown scheme_tag '{}'", other))),
        }
    }
}

/// Type of the document a chunk was extracted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    SidPdf,
    KimPdf,
    FactsheetConsolidated,
    SchemeOverview,
    Regulatory,
    Other,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::SidPdf => "sid_pdf",
            SourceType::KimPdf => "kim_pdf",
            SourceType::FactsheetConsolidated => "factsheet_consolidated",
            SourceType::SchemeOverview => "scheme_overview",
            SourceType::Regulatory => "regulatory",
            SourceType::Other => "other",
        }
    }

    /// Static authority weight of the document type, if it has one
    fn weight(&self) -> Option<f32> {
        match self {
            SourceType::SidPdf => Some(1.0),
            SourceType::KimPdf => Some(0.9),
            SourceType::FactsheetConsolidated => Some(0.8),
            SourceType::SchemeOverview => Some(0.7),
            SourceType::Regulatory | SourceType::Other => None,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sid_pdf" => Ok(SourceType::SidPdf),
            "kim_pdf" => Ok(SourceType::KimPdf),
            "factsheet_consolidated" => Ok(SourceType::FactsheetConsolidated),
            "scheme_overview" => Ok(SourceType::SchemeOverview),
            "regulatory" => Ok(SourceType::Regulatory),
            "other" => Ok(SourceType::Other),
            other => Err(Error::DataIntegrity(format!("unknown source_type '{}'", other))),
        }
    }
}

/// Regulator and aggregator ids recognized inside `source_id`
const SOURCE_ID_AUTHORITY: [(&str, f32); 3] = [("sebi", 0.95), ("amfi", 0.9), ("groww", 0.6)];

/// Authority weight in `[0, 1]` for a source.
///
/// Document types carry a fixed weight. Regulatory and other sources are
/// recognized by their id; anything unknown gets 0.5.
pub fn source_authority(source_id: &str, source_type: SourceType) -> f32 {
    if let Some(weight) = source_type.weight() {
        return weight;
    }
    let id = source_id.to_lowercase();
    SOURCE_ID_AUTHORITY
        .iter()
        .find(|(needle, _)| id.contains(needle))
        .map(|(_, weight)| *weight)
        .unwrap_or(0.5)
}

/// Extraction priority: lower wins (sid_pdf=1 .. scheme_overview=4, other=5)
pub fn source_priority(source_type: SourceType) -> u8 {
    match source_type {
        SourceType::SidPdf => 1,
        SourceType::KimPdf => 2,
        SourceType::FactsheetConsolidated => 3,
        SourceType::SchemeOverview => 4,
        SourceType::Regulatory | SourceType::Other => 5,
    }
}

/// Unit family of a canonical field's value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Percentage,
    Currency,
    Duration,
    Text,
}

/// One of the seven canonical facts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    #[serde(alias = "minimum_sip")]
    MinSip,
    MinLumpsum,
    ExitLoad,
    LockIn,
    ExpenseRatio,
    Benchmark,
    Riskometer,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::MinSip,
        Field::MinLumpsum,
        Field::ExitLoad,
        Field::LockIn,
        Field::ExpenseRatio,
        Field::Benchmark,
        Field::Riskometer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::MinSip => "min_sip",
            Field::MinLumpsum => "min_lumpsum",
            Field::ExitLoad => "exit_load",
            Field::LockIn => "lock_in",
            Field::ExpenseRatio => "expense_ratio",
            Field::Benchmark => "benchmark",
            Field::Riskometer => "riskometer",
        }
    }

    /// Label used in canonical fact chunk text
    pub fn label(&self) -> &'static str {
        match self {
            Field::MinSip => "Minimum SIP",
            Field::MinLumpsum => "Minimum application amount",
            Field::ExitLoad => "Exit Load",
            Field::LockIn => "Lock-in period",
            Field::ExpenseRatio => "Total Expense Ratio (TER)",
            Field::Benchmark => "Benchmark",
            Field::Riskometer => "Riskometer",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Field::ExitLoad | Field::ExpenseRatio => FieldKind::Percentage,
            Field::MinSip | Field::MinLumpsum => FieldKind::Currency,
            Field::LockIn => FieldKind::Duration,
            Field::Benchmark | Field::Riskometer => FieldKind::Text,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "min_sip" | "minimum_sip" => Ok(Field::MinSip),
            "min_lumpsum" => Ok(Field::MinLumpsum),
            "exit_load" => Ok(Field::ExitLoad),
            "lock_in" => Ok(Field::LockIn),
            "expense_ratio" => Ok(Field::ExpenseRatio),
            "benchmark" => Ok(Field::Benchmark),
            "riskometer" => Ok(Field::Riskometer),
            other => Err(Error::DataIntegrity(format!("unknown field '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_tag_serde() {
        let json = serde_json::to_string(&SchemeTag::LargeCap).unwrap();
        assert_eq!(json, "\"LARGE_CAP\"");
        let tag: SchemeTag = serde_json::from_str("\"ELSS\"").unwrap();
        assert_eq!(tag, SchemeTag::Elss);
        assert!(serde_json::from_str::<SchemeTag>("\"MID_CAP\"").is_err());
    }

    #[test]
    fn test_scheme_tag_from_str_rejects_unknown() {
        assert_eq!("flexi_cap".parse::<SchemeTag>().unwrap(), SchemeTag::FlexiCap);
        let err = "SMALL_CAP".parse::<SchemeTag>().unwrap_err();
        assert!(matches!(err, Error::DataIntegrity(_)));
    }

    #[test]
    fn test_source_type_round_trip_names() {
        for st in [
            SourceType::SidPdf,
            SourceType::KimPdf,
            SourceType::FactsheetConsolidated,
            SourceType::SchemeOverview,
            SourceType::Regulatory,
            SourceType::Other,
        ] {
            assert_eq!(st.as_str().parse::<SourceType>().unwrap(), st);
        }
        assert!("blog".parse::<SourceType>().is_err());
    }

    #[test]
    fn test_source_authority_ordering() {
        let sid = source_authority("hdfc_elss_sid", SourceType::SidPdf);
        let kim = source_authority("hdfc_elss_kim", SourceType::KimPdf);
        let fs = source_authority("factsheet_oct", SourceType::FactsheetConsolidated);
        let ov = source_authority("amc_elss_overview", SourceType::SchemeOverview);
        assert!(sid > kim && kim > fs && fs > ov);

        assert_eq!(source_authority("sebi_circular_ter", SourceType::Regulatory), 0.95);
        assert_eq!(source_authority("amfi_sip_faq", SourceType::Regulatory), 0.9);
        assert_eq!(source_authority("groww_elss", SourceType::Other), 0.6);
        assert_eq!(source_authority("random_blog", SourceType::Other), 0.5);
    }

    #[test]
    fn test_source_priority() {
        assert_eq!(source_priority(SourceType::SidPdf), 1);
        assert_eq!(source_priority(SourceType::SchemeOverview), 4);
        assert_eq!(source_priority(SourceType::Regulatory), 5);
    }

    #[test]
    fn test_field_alias_and_kind() {
        let f: Field = serde_json::from_str("\"minimum_sip\"").unwrap();
        assert_eq!(f, Field::MinSip);
        assert_eq!(Field::ExitLoad.kind(), FieldKind::Percentage);
        assert_eq!(Field::MinLumpsum.kind(), FieldKind::Currency);
        assert_eq!(Field::LockIn.kind(), FieldKind::Duration);
        assert_eq!(Field::ExpenseRatio.label(), "Total Expense Ratio (TER)");
    }
}
