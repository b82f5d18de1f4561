//! Strict metric extraction
//!
//! Resolves a single authoritative value for a field without any generative
//! model. Resolution order:
//! 1. a canonical fact chunk for the field among the supplied chunks
//! 2. the fact chunk store, scheme row first, then the ALL row
//! 3. per-field patterns over raw chunk text, best source priority first
//!
//! A missing value is `Lookup::NotFound`, never an error.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use fundfacts_config::constants::bounds;
use fundfacts_core::{source_priority, Chunk, Field, FieldKind, Lookup, SchemeTag, SourceType};

use crate::classifier;
use crate::store::CorpusStore;

const NUM: &str = r"([0-9]{1,3}(?:\.[0-9]{1,2})?)";
const EXCERPT_RADIUS: usize = 40;
const REDUCTION_RADIUS: usize = 50;
const CANONICAL_EXCERPT_CHARS: usize = 150;

fn compile(patterns: &[String]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

static CANONICAL_VALUE: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?s):\s*(.*?)\.\s*Source\b".to_string(),
        r"(?s):\s*(.*?)\.?\s*$".to_string(),
    ])
});

static EXIT_LOAD: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        format!(r"(?is)exit\s*load[^.]*?{}\s?%", NUM),
        format!(r"(?is){}\s?%\s*exit\s*load", NUM),
        r"(?is)exit\s*load[^.]*?\bnil\b".to_string(),
    ])
});

static EXPENSE_RATIO: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        format!(
            r"(?is)(?:total\s*)?expense\s*ratio\s*(?:\(ter\))?[^.]*?(?:is|of|:)\s*{}\s?%",
            NUM
        ),
        format!(r"(?is)\bter\s*(?:is|of|:)\s*{}\s?%", NUM),
        format!(r"(?is){}\s?%\s*(?:total\s*)?expense\s*ratio", NUM),
        format!(r"(?is)(?:current\s*)?(?:total\s*)?expense\s*ratio[^.]*?{}\s?%", NUM),
    ])
});

static MIN_SIP: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?is)minimum\s*(?:sip|application)[^.]*?(?:₹|Rs\.?|INR)?\s?([0-9][0-9,]*)".to_string(),
        r"(?is)([0-9][0-9,]*)\s*(?:₹|Rs\.?|INR)?\s*minimum\s*(?:sip|application)".to_string(),
    ])
});

static MIN_LUMPSUM: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?is)minimum\s*(?:lumpsum|application|amount)[^.]*?(?:₹|Rs\.?|INR)?\s?([0-9][0-9,]*)"
            .to_string(),
        r"(?is)([0-9][0-9,]*)\s*(?:₹|Rs\.?|INR)?\s*minimum\s*(?:lumpsum|application|amount)"
            .to_string(),
    ])
});

static LOCK_IN: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?is)lock[^.]*?(\d+)\s*(?:years?|yrs?)\b".to_string(),
        r"(?is)(\d+)\s*(?:years?|yrs?)\b[^.]*?lock".to_string(),
    ])
});

static BENCHMARK: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?s)(?i:benchmark)[^.]*?([A-Z][A-Z0-9&\s]+(?:Total Returns Index|Index|TRI))".to_string(),
        r"(?s)(?i:benchmarked?\s*against)\s*([A-Z][A-Z0-9&\s]+(?:Total Returns Index|Index|TRI))"
            .to_string(),
        r"([A-Z][A-Z0-9&\s]+(?:Total Returns Index|Index|TRI))\s*(?:\(as per|as per|\(TRI\)|TRI)"
            .to_string(),
    ])
});

const RISK_LEVELS: &str =
    r"(very\s*high|moderately\s*high|low\s*to\s*moderate|moderate|high|low)\b";

static RISKOMETER: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        format!(r"(?is)riskometer[^.]*?\b{}", RISK_LEVELS),
        format!(r"(?is)risk[^.]*?level[^.]*?\b{}", RISK_LEVELS),
    ])
});

static PERCENT_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(&format!(r"{}\s?%", NUM)).unwrap());
static BARE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+(?:\.[0-9]+)?").unwrap());
static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").unwrap());
static YEARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\s*(?:years?|yrs?)\b").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static NIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*nil\b").unwrap());

fn patterns_for(field: Field) -> &'static [Regex] {
    match field {
        Field::ExitLoad => &EXIT_LOAD,
        Field::ExpenseRatio => &EXPENSE_RATIO,
        Field::MinSip => &MIN_SIP,
        Field::MinLumpsum => &MIN_LUMPSUM,
        Field::LockIn => &LOCK_IN,
        Field::Benchmark => &BENCHMARK,
        Field::Riskometer => &RISKOMETER,
    }
}

/// Confidence attached to an extracted value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// HIGH for SID/KIM, MEDIUM for factsheet/overview, LOW otherwise or without a match
    pub fn for_source(source_type: SourceType, matched: bool) -> Self {
        if !matched {
            return Confidence::Low;
        }
        match source_type {
            SourceType::SidPdf | SourceType::KimPdf => Confidence::High,
            SourceType::FactsheetConsolidated | SourceType::SchemeOverview => Confidence::Medium,
            SourceType::Regulatory | SourceType::Other => Confidence::Low,
        }
    }
}

/// Which resolution step produced a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    CanonicalChunk,
    FactStore,
    Pattern,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedMetric {
    pub field: Field,
    pub value: String,
    pub source_id: String,
    pub source_type: SourceType,
    pub source_url: String,
    pub excerpt: String,
    pub confidence: Confidence,
    pub last_updated: Option<String>,
    pub method: ExtractionMethod,
}

/// A pattern hit awaiting selection
struct PatternHit<'a> {
    chunk: &'a Chunk,
    raw: String,
    excerpt: String,
    near_reduction: bool,
}

pub struct MetricExtractor {
    store: Arc<CorpusStore>,
}

impl MetricExtractor {
    pub fn new(store: Arc<CorpusStore>) -> Self {
        Self { store }
    }

    /// Extract the field named by the query, if any
    pub fn extract_for_query<'a>(
        &self,
        query: &str,
        scheme: Option<SchemeTag>,
        chunks: impl IntoIterator<Item = &'a Chunk>,
    ) -> Lookup<ExtractedMetric> {
        match classifier::identify_field(query) {
            Some(field) => self.extract(field, scheme, chunks),
            None => Lookup::NotFound,
        }
    }

    pub fn extract<'a>(
        &self,
        field: Field,
        scheme: Option<SchemeTag>,
        chunks: impl IntoIterator<Item = &'a Chunk>,
    ) -> Lookup<ExtractedMetric> {
        let chunks: Vec<&Chunk> = chunks.into_iter().collect();
        let in_scope = |c: &Chunk| match scheme {
            Some(s) => c.scheme_tag == s || c.scheme_tag == SchemeTag::All,
            None => true,
        };

        let canonical = chunks
            .iter()
            .filter(|c| c.field == Some(field) && in_scope(**c))
            .find_map(|c| from_canonical(field, c, ExtractionMethod::CanonicalChunk));
        if let Some(metric) = canonical {
            return Lookup::Found(metric);
        }

        let stored = self
            .store
            .lookup_fact(field, scheme)
            .and_then(|c| from_canonical(field, c, ExtractionMethod::FactStore));
        if let Some(metric) = stored {
            return Lookup::Found(metric);
        }

        let scoped: Vec<&Chunk> = chunks.into_iter().filter(|c| in_scope(*c)).collect();
        Lookup::from(from_patterns(field, &scoped))
    }
}

/// Parse "Label: Value. Source: ..." from a canonical fact chunk
fn from_canonical(field: Field, chunk: &Chunk, method: ExtractionMethod) -> Option<ExtractedMetric> {
    let raw = CANONICAL_VALUE
        .iter()
        .find_map(|re| re.captures(&chunk.text))
        .and_then(|caps| caps.get(1))
        .map(|m| collapse_whitespace(m.as_str()))
        .filter(|v| !v.is_empty())?;

    Some(ExtractedMetric {
        field,
        value: normalize_value(field, &raw),
        source_id: chunk.source_id.clone(),
        source_type: chunk.source_type,
        source_url: chunk.source_url.clone(),
        excerpt: chunk.text.chars().take(CANONICAL_EXCERPT_CHARS).collect(),
        confidence: Confidence::for_source(chunk.source_type, value_matched(field, &raw)),
        last_updated: chunk.last_fetched_date.as_deref().map(normalize_date),
        method,
    })
}

/// Numeric fields need a number (or an explicit Nil); text fields match a vocabulary
fn value_matched(field: Field, raw: &str) -> bool {
    match field.kind() {
        FieldKind::Text => true,
        _ => DIGITS.is_match(raw) || NIL.is_match(raw),
    }
}

fn from_patterns(field: Field, chunks: &[&Chunk]) -> Option<ExtractedMetric> {
    let mut hits: Vec<PatternHit<'_>> = chunks
        .iter()
        .flat_map(|chunk| chunk_hits(field, chunk))
        .collect();

    if field == Field::ExpenseRatio && hits.iter().any(|h| !h.near_reduction) {
        hits.retain(|h| !h.near_reduction);
    }

    // Stable sort keeps encounter order among equal priorities
    hits.sort_by_key(|h| source_priority(h.chunk.source_type));
    let best = hits.into_iter().next()?;

    Some(ExtractedMetric {
        field,
        value: normalize_value(field, &best.raw),
        source_id: best.chunk.source_id.clone(),
        source_type: best.chunk.source_type,
        source_url: best.chunk.source_url.clone(),
        excerpt: best.excerpt,
        confidence: Confidence::for_source(best.chunk.source_type, value_matched(field, &best.raw)),
        last_updated: best.chunk.last_fetched_date.as_deref().map(normalize_date),
        method: ExtractionMethod::Pattern,
    })
}

/// Every acceptable match in a chunk, patterns in declared order
fn chunk_hits<'a>(field: Field, chunk: &'a Chunk) -> Vec<PatternHit<'a>> {
    let text = chunk.text.as_str();
    let mut hits = Vec::new();
    for pattern in patterns_for(field) {
        for caps in pattern.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            if field == Field::ExpenseRatio
                && text[whole.end()..].trim_start().to_lowercase().starts_with("reduction")
            {
                continue;
            }
            let raw = captured_value(field, &caps);
            if !within_bounds(field, &raw, &chunk.source_id) {
                continue;
            }

            let near_reduction = field == Field::ExpenseRatio
                && char_window(text, whole.start(), whole.end(), REDUCTION_RADIUS)
                    .to_lowercase()
                    .contains("reduction");
            hits.push(PatternHit {
                chunk,
                raw,
                excerpt: collapse_whitespace(char_window(text, whole.start(), whole.end(), EXCERPT_RADIUS)),
                near_reduction,
            });
        }
    }
    hits
}

fn captured_value(field: Field, caps: &Captures<'_>) -> String {
    match caps.get(1) {
        Some(m) => m.as_str().trim().to_string(),
        None if field == Field::ExitLoad => "Nil".to_string(),
        None => caps.get(0).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
    }
}

/// Discard out-of-range percentages; they are logged for offline review
fn within_bounds(field: Field, raw: &str, source_id: &str) -> bool {
    let (min, max) = match field {
        Field::ExpenseRatio => (bounds::EXPENSE_RATIO_MIN, bounds::EXPENSE_RATIO_MAX),
        Field::ExitLoad => (bounds::EXIT_LOAD_MIN, bounds::EXIT_LOAD_MAX),
        Field::MinSip | Field::MinLumpsum => return DIGITS.is_match(raw),
        _ => return true,
    };
    if raw.eq_ignore_ascii_case("nil") {
        return field == Field::ExitLoad;
    }
    match raw.parse::<f64>() {
        Ok(v) if (min..=max).contains(&v) => true,
        Ok(v) => {
            tracing::warn!(
                field = field.as_str(),
                source_id,
                value = v,
                min,
                max,
                "Discarding out-of-range extraction"
            );
            false
        }
        Err(_) => false,
    }
}

/// Canonical display form of a raw value for a field
pub fn normalize_value(field: Field, raw: &str) -> String {
    let value = collapse_whitespace(raw);
    match field.kind() {
        FieldKind::Percentage => {
            if NIL.is_match(&value) {
                return "Nil".to_string();
            }
            let number = PERCENT_VALUE
                .captures(&value)
                .and_then(|c| c.get(1))
                .or_else(|| BARE_NUMBER.find(&value))
                .and_then(|m| m.as_str().parse::<f64>().ok());
            match number {
                Some(n) => format!("{:.2}%", n),
                None => value,
            }
        }
        FieldKind::Currency => {
            let without_commas = value.replace(',', "");
            match DIGITS.find(&without_commas).and_then(|m| m.as_str().parse::<u64>().ok()) {
                Some(n) => format!("₹{}", group_thousands(n)),
                None => value,
            }
        }
        FieldKind::Duration => {
            let years = YEARS
                .captures(&value)
                .and_then(|c| c.get(1))
                .or_else(|| DIGITS.find(&value))
                .and_then(|m| m.as_str().parse::<u32>().ok());
            match years {
                Some(y) => format!("{} years ({} months)", y, y * 12),
                None => value,
            }
        }
        FieldKind::Text if field == Field::Riskometer => canonical_risk_level(&value).unwrap_or(value),
        FieldKind::Text => value,
    }
}

fn canonical_risk_level(value: &str) -> Option<String> {
    let level = match collapse_whitespace(value).to_lowercase().as_str() {
        "very high" | "veryhigh" => "Very High",
        "moderately high" | "moderatelyhigh" => "Moderately High",
        "low to moderate" => "Low to Moderate",
        "moderate" => "Moderate",
        "high" => "High",
        "low" => "Low",
        _ => return None,
    };
    Some(level.to_string())
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `MM/DD/YYYY` dates become ISO; anything else is kept
fn normalize_date(date: &str) -> String {
    NaiveDate::parse_from_str(date.trim(), "%m/%d/%Y")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| date.trim().to_string())
}

fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// Text around a byte range, widened by `radius` chars on each side
fn char_window(text: &str, start: usize, end: usize, radius: usize) -> &str {
    let from = text[..start]
        .char_indices()
        .rev()
        .nth(radius.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let to = text[end..]
        .char_indices()
        .nth(radius)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    &text[from..to]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, st: SourceType, scheme: SchemeTag, text: &str) -> Chunk {
        Chunk {
            id: format!("{}::fulltext::0", id),
            source_id: id.to_string(),
            text: text.to_string(),
            scheme_tag: scheme,
            field: None,
            source_type: st,
            source_url: format!("https://example.org/{}", id),
            last_fetched_date: Some("11/17/2025".to_string()),
        }
    }

    fn fact(id: &str, st: SourceType, scheme: SchemeTag, field: Field, value: &str) -> Chunk {
        Chunk {
            id: format!("{}__{}", id, field.as_str()),
            source_id: id.to_string(),
            text: format!("{}: {}. Source: {} ({}).", field.label(), value, id, st.as_str()),
            scheme_tag: scheme,
            field: Some(field),
            source_type: st,
            source_url: String::new(),
            last_fetched_date: None,
        }
    }

    fn extractor(store_chunks: Vec<Chunk>) -> MetricExtractor {
        MetricExtractor::new(Arc::new(CorpusStore::new(store_chunks)))
    }

    #[test]
    fn test_sid_wins_over_factsheet() {
        let chunks = vec![
            raw("hdfc_elss_factsheet", SourceType::FactsheetConsolidated, SchemeTag::Elss, "Exit load 1%"),
            raw(
                "hdfc_elss_sid",
                SourceType::SidPdf,
                SchemeTag::Elss,
                "Exit Load of 1.00% if within 1 year, Nil after",
            ),
        ];
        let result = extractor(Vec::new())
            .extract_for_query("What is the exit load for HDFC ELSS?", Some(SchemeTag::Elss), &chunks)
            .found()
            .unwrap();

        assert_eq!(result.value, "1.00%");
        assert_eq!(result.source_type, SourceType::SidPdf);
        assert_eq!(result.confidence, Confidence::High);
        assert_eq!(result.method, ExtractionMethod::Pattern);
        assert_eq!(result.last_updated.as_deref(), Some("2025-11-17"));
        assert!(result.excerpt.contains("1.00%"));
    }

    #[test]
    fn test_kim_used_when_sid_absent() {
        let chunks = vec![
            raw("fs", SourceType::FactsheetConsolidated, SchemeTag::Hybrid, "Minimum SIP ₹1,000 per month"),
            raw("kim", SourceType::KimPdf, SchemeTag::Hybrid, "Minimum SIP amount Rs. 500 and in multiples of 1"),
        ];
        let result = extractor(Vec::new())
            .extract(Field::MinSip, Some(SchemeTag::Hybrid), &chunks)
            .found()
            .unwrap();
        assert_eq!(result.value, "₹500");
        assert_eq!(result.source_id, "kim");
    }

    #[test]
    fn test_canonical_chunk_first() {
        let chunks = vec![
            raw("hdfc_elss_sid", SourceType::SidPdf, SchemeTag::Elss, "Exit load 2% within a year"),
            fact("hdfc_elss_kim", SourceType::KimPdf, SchemeTag::Elss, Field::ExitLoad, "1.00%"),
        ];
        let result = extractor(Vec::new())
            .extract(Field::ExitLoad, Some(SchemeTag::Elss), &chunks)
            .found()
            .unwrap();
        assert_eq!(result.value, "1.00%");
        assert_eq!(result.method, ExtractionMethod::CanonicalChunk);
        assert_eq!(result.confidence, Confidence::High);
    }

    #[test]
    fn test_canonical_value_without_number_is_low_confidence() {
        let chunks = vec![fact("hdfc_elss_kim", SourceType::KimPdf, SchemeTag::Elss, Field::ExitLoad, "as per SID")];
        let result = extractor(Vec::new())
            .extract(Field::ExitLoad, Some(SchemeTag::Elss), &chunks)
            .found()
            .unwrap();
        assert_eq!(result.value, "as per SID");
        assert_eq!(result.confidence, Confidence::Low);
    }

    #[test]
    fn test_canonical_chunk_of_other_scheme_ignored() {
        let chunks = vec![fact("hy_kim", SourceType::KimPdf, SchemeTag::Hybrid, Field::ExitLoad, "1.00%")];
        let result = extractor(Vec::new()).extract(Field::ExitLoad, Some(SchemeTag::Elss), &chunks);
        assert_eq!(result, Lookup::NotFound);
    }

    #[test]
    fn test_store_lookup_falls_back_to_all_row() {
        let store = vec![fact(
            "amfi_riskometer",
            SourceType::Regulatory,
            SchemeTag::All,
            Field::Riskometer,
            "Very High",
        )];
        let result = extractor(store)
            .extract(Field::Riskometer, Some(SchemeTag::LargeCap), std::iter::empty())
            .found()
            .unwrap();
        assert_eq!(result.value, "Very High");
        assert_eq!(result.method, ExtractionMethod::FactStore);
        assert_eq!(result.confidence, Confidence::Low);
    }

    #[test]
    fn test_decimal_values_survive_canonical_parse() {
        let chunks = vec![fact(
            "factsheet_oct",
            SourceType::FactsheetConsolidated,
            SchemeTag::FlexiCap,
            Field::ExpenseRatio,
            "0.97%",
        )];
        let result = extractor(Vec::new())
            .extract(Field::ExpenseRatio, Some(SchemeTag::FlexiCap), &chunks)
            .found()
            .unwrap();
        assert_eq!(result.value, "0.97%");
        assert_eq!(result.confidence, Confidence::Medium);
    }

    #[test]
    fn test_expense_ratio_reduction_discarded_when_alternative_exists() {
        let chunks = vec![
            raw(
                "sid",
                SourceType::SidPdf,
                SchemeTag::Elss,
                "SEBI mandated a TER of 0.50% reduction for direct plans",
            ),
            raw(
                "fs",
                SourceType::FactsheetConsolidated,
                SchemeTag::Elss,
                "The total expense ratio is 1.08% as of October",
            ),
        ];
        let result = extractor(Vec::new())
            .extract(Field::ExpenseRatio, Some(SchemeTag::Elss), &chunks)
            .found()
            .unwrap();
        assert_eq!(result.value, "1.08%");
        assert_eq!(result.source_id, "fs");
    }

    #[test]
    fn test_reduction_discarded_within_one_chunk() {
        let chunks = vec![raw(
            "hdfc_elss_factsheet",
            SourceType::FactsheetConsolidated,
            SchemeTag::Elss,
            "Expense ratio reduction: 0.35% as mandated by the regulator for all open ended schemes \
             from April this year. Expense ratio is 1.08% for the regular plan",
        )];
        let result = extractor(Vec::new())
            .extract(Field::ExpenseRatio, Some(SchemeTag::Elss), &chunks)
            .found()
            .unwrap();
        assert_eq!(result.value, "1.08%");
        assert!(result.excerpt.contains("1.08%"));
    }

    #[test]
    fn test_reduction_kept_when_only_option() {
        let chunks = vec![raw(
            "sid",
            SourceType::SidPdf,
            SchemeTag::Elss,
            "Following the reduction, the expense ratio is 1.20% for regular plans",
        )];
        let result = extractor(Vec::new())
            .extract(Field::ExpenseRatio, Some(SchemeTag::Elss), &chunks)
            .found()
            .unwrap();
        assert_eq!(result.value, "1.20%");
    }

    #[test]
    fn test_out_of_range_expense_ratio_is_not_found() {
        let chunks = vec![raw("fs", SourceType::FactsheetConsolidated, SchemeTag::Elss, "Expense ratio: 12%")];
        let result = extractor(Vec::new()).extract(Field::ExpenseRatio, Some(SchemeTag::Elss), &chunks);
        assert_eq!(result, Lookup::NotFound);
    }

    #[test]
    fn test_lock_in_and_riskometer_patterns() {
        let chunks = vec![
            raw("sid", SourceType::SidPdf, SchemeTag::Elss, "Units are subject to a lock-in of 3 years from allotment"),
            raw("ov", SourceType::SchemeOverview, SchemeTag::Elss, "Riskometer: Moderately High risk"),
        ];
        let ex = extractor(Vec::new());
        let lock = ex.extract(Field::LockIn, Some(SchemeTag::Elss), &chunks).found().unwrap();
        assert_eq!(lock.value, "3 years (36 months)");

        let risk = ex.extract(Field::Riskometer, Some(SchemeTag::Elss), &chunks).found().unwrap();
        assert_eq!(risk.value, "Moderately High");
        assert_eq!(risk.confidence, Confidence::Medium);
    }

    #[test]
    fn test_benchmark_pattern() {
        let chunks = vec![raw(
            "ov",
            SourceType::SchemeOverview,
            SchemeTag::LargeCap,
            "The scheme benchmark is NIFTY 100 TRI and the fund invests in large caps",
        )];
        let result = extractor(Vec::new())
            .extract(Field::Benchmark, Some(SchemeTag::LargeCap), &chunks)
            .found()
            .unwrap();
        assert_eq!(result.value, "NIFTY 100 TRI");
    }

    #[test]
    fn test_nil_exit_load() {
        let chunks = vec![raw("kim", SourceType::KimPdf, SchemeTag::Hybrid, "Exit load: Nil")];
        let result = extractor(Vec::new())
            .extract(Field::ExitLoad, Some(SchemeTag::Hybrid), &chunks)
            .found()
            .unwrap();
        assert_eq!(result.value, "Nil");
    }

    #[test]
    fn test_no_match_is_not_found() {
        let chunks = vec![raw("sid", SourceType::SidPdf, SchemeTag::Elss, "Nothing relevant here")];
        let ex = extractor(Vec::new());
        assert_eq!(ex.extract(Field::ExitLoad, Some(SchemeTag::Elss), &chunks), Lookup::NotFound);
        assert_eq!(ex.extract_for_query("hello there", None, &chunks), Lookup::NotFound);
    }

    #[test]
    fn test_normalize_value() {
        assert_eq!(normalize_value(Field::ExitLoad, "1%"), "1.00%");
        assert_eq!(normalize_value(Field::ExitLoad, "1.00%"), "1.00%");
        assert_eq!(normalize_value(Field::ExitLoad, "nil"), "Nil");
        assert_eq!(normalize_value(Field::ExpenseRatio, "0.9"), "0.90%");
        assert_eq!(normalize_value(Field::MinLumpsum, "100000"), "₹100,000");
        assert_eq!(normalize_value(Field::MinSip, "Rs. 1,500"), "₹1,500");
        assert_eq!(normalize_value(Field::LockIn, "3 years"), "3 years (36 months)");
        assert_eq!(normalize_value(Field::LockIn, "3"), "3 years (36 months)");
        assert_eq!(normalize_value(Field::Riskometer, "low  to moderate"), "Low to Moderate");
        assert_eq!(normalize_value(Field::Benchmark, " NIFTY  500 TRI "), "NIFTY 500 TRI");
    }

    #[test]
    fn test_confidence_monotonic_in_authority() {
        let order = [
            SourceType::SidPdf,
            SourceType::KimPdf,
            SourceType::FactsheetConsolidated,
            SourceType::SchemeOverview,
        ];
        for pair in order.windows(2) {
            assert!(Confidence::for_source(pair[0], true) >= Confidence::for_source(pair[1], true));
        }
        assert_eq!(Confidence::for_source(SourceType::SidPdf, false), Confidence::Low);
    }

    #[test]
    fn test_char_window_is_char_safe() {
        let text = "₹₹₹ minimum ₹₹₹";
        let start = text.find("minimum").unwrap();
        let end = start + "minimum".len();
        assert_eq!(char_window(text, start, end, 2), "₹ minimum ₹");
    }
}
