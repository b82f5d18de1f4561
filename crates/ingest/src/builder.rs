//! Fact table and chunk corpus builder
//!
//! For every registered source: read its text, clean it, extract the fields
//! its source type is allowed to supply, and emit one canonical chunk per
//! extracted field. Fact chunks are then deduplicated per (scheme, field) by
//! source priority, quality checks run, and full-text windows are appended.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;

use fundfacts_config::{constants, DataConfig, IngestConfig};
use fundfacts_core::{
    source_priority, write_atomic, Chunk, FactRecord, Field, SchemeTag, SourceDocument, SourceType,
};
use fundfacts_rag::{write_chunks_jsonl, write_fact_table};

use crate::chunker::FullTextChunker;
use crate::cleaning::{clean_text, needs_ocr, CleanReport};
use crate::extractors::{extract_field, extract_lock_in};
use crate::sources::{load_registry, read_source_text, SourceRegistry};
use crate::Result;

static SIP_FORMAT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^₹[0-9]+$").unwrap());

/// Source types allowed to supply a field, best first
pub fn field_sources(field: Field) -> &'static [SourceType] {
    use SourceType::*;

    match field {
        Field::MinSip | Field::MinLumpsum => &[KimPdf, SidPdf, SchemeOverview],
        Field::ExitLoad => &[SidPdf, KimPdf, FactsheetConsolidated, SchemeOverview],
        Field::ExpenseRatio => &[FactsheetConsolidated, Regulatory],
        Field::Benchmark | Field::Riskometer => &[SchemeOverview, FactsheetConsolidated],
        // Statutory; set for every ELSS source regardless of type
        Field::LockIn => &[],
    }
}

fn allowed(field: Field, source_type: SourceType) -> bool {
    field_sources(field).contains(&source_type)
}

/// Dedup rank of a source type for a field; lower wins
fn field_rank(field: Field, source_type: SourceType) -> usize {
    if field == Field::LockIn {
        return source_priority(source_type) as usize;
    }
    field_sources(field)
        .iter()
        .position(|t| *t == source_type)
        .unwrap_or(usize::MAX)
}

/// Canonical chunk text, capped at `max_chars`
pub fn fact_chunk_text(
    field: Field,
    value: &str,
    source_id: &str,
    source_type: SourceType,
    max_chars: usize,
) -> String {
    let text = format!(
        "{}: {}. Source: {} ({}).",
        field.label(),
        value,
        source_id,
        source_type
    );
    if text.chars().count() <= max_chars {
        return text;
    }
    let mut capped: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    capped.push_str("...");
    capped
}

/// Everything derived from one usable source
#[derive(Debug, Clone)]
pub struct SourceFacts {
    pub source: SourceDocument,
    pub record: FactRecord,
    pub fact_chunks: Vec<Chunk>,
    pub fulltext_chunks: Vec<Chunk>,
    pub cleaning: CleanReport,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub sources_total: usize,
    pub sources_processed: usize,
    pub sources_missing_text: Vec<String>,
    pub ocr_required: Vec<String>,
    /// Processed sources that yielded at least one fact chunk
    pub sources_with_facts: usize,
    pub fact_chunks: usize,
    pub fulltext_chunks: usize,
    pub field_counts: BTreeMap<Field, usize>,
    pub pii_redactions: usize,
    pub ocr_fixes: usize,
    pub quality_issues: Vec<String>,
}

impl BuildReport {
    /// At least half the sources produced a fact chunk
    pub fn is_healthy(&self) -> bool {
        self.sources_with_facts * 2 >= self.sources_total
    }
}

/// Artifacts produced by one build
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    pub facts: Vec<FactRecord>,
    pub chunks: Vec<Chunk>,
    pub report: BuildReport,
}

pub struct FactBuilder {
    config: IngestConfig,
    chunker: FullTextChunker,
}

impl FactBuilder {
    pub fn new(config: IngestConfig) -> Self {
        let chunker = FullTextChunker::from(&config);
        Self { config, chunker }
    }

    /// Clean and extract one source. `None` means the text needs OCR.
    pub fn process_source(&self, source: &SourceDocument, raw: &str) -> Option<SourceFacts> {
        let source_id = source.source_id.as_str();
        if needs_ocr(raw, self.config.min_source_chars) {
            tracing::warn!(source_id, "Source text too short, may require OCR");
            return None;
        }

        let (cleaned, cleaning) = clean_text(raw, source_id);
        if needs_ocr(&cleaned, self.config.min_source_chars) {
            tracing::warn!(source_id, "Cleaned text too short, flagging for OCR");
            return None;
        }

        let mut record = FactRecord::new(source_id, source.scheme_tag, source.source_type);
        record.source_url = source.source_url.clone();
        record.last_fetched_date = source.last_fetched_date.clone();

        let mut attempted = Vec::new();
        for field in Field::ALL {
            if field == Field::LockIn || !allowed(field, source.source_type) {
                continue;
            }
            attempted.push(field);
            record.set(field, extract_field(field, &cleaned, source));
        }

        if source.scheme_tag == SchemeTag::Elss {
            let statutory = constants::statutory::ELSS_LOCK_IN;
            if let Some(stated) = extract_lock_in(&cleaned, source.scheme_tag) {
                if stated != statutory {
                    tracing::warn!(
                        source_id,
                        stated = %stated,
                        "ELSS lock-in stated differently, using the statutory value"
                    );
                }
            }
            record.set(Field::LockIn, Some(statutory.to_string()));
        }

        let fact_chunks: Vec<Chunk> = Field::ALL
            .iter()
            .filter_map(|&field| {
                let value = record.get(field)?;
                Some(Chunk {
                    id: format!("{}__{}", source_id, field),
                    source_id: source_id.to_string(),
                    text: fact_chunk_text(
                        field,
                        value,
                        source_id,
                        source.source_type,
                        self.config.max_fact_chunk_chars,
                    ),
                    scheme_tag: source.scheme_tag,
                    field: Some(field),
                    source_type: source.source_type,
                    source_url: source.source_url.clone(),
                    last_fetched_date: source.last_fetched_date.clone(),
                })
            })
            .collect();

        let fulltext_chunks = if self.config.include_full_text {
            self.chunker.chunk(source, &cleaned)
        } else {
            Vec::new()
        };

        tracing::info!(
            source_id,
            attempted = attempted.len(),
            found = record.populated(),
            chunks = fact_chunks.len(),
            "Extracted source facts"
        );

        Some(SourceFacts {
            source: source.clone(),
            record,
            fact_chunks,
            fulltext_chunks,
            cleaning,
        })
    }

    /// Build from already-loaded texts, keyed by source id
    pub fn build(&self, registry: &SourceRegistry, texts: &HashMap<String, String>) -> BuildOutput {
        let mut report = BuildReport {
            sources_total: registry.len(),
            ..Default::default()
        };
        let mut processed = Vec::new();

        for source in registry.iter() {
            let Some(raw) = texts.get(&source.source_id) else {
                report.sources_missing_text.push(source.source_id.clone());
                continue;
            };
            match self.process_source(source, raw) {
                Some(facts) => {
                    report.pii_redactions += facts.cleaning.pii_count();
                    report.ocr_fixes += facts.cleaning.ocr_fix_count();
                    processed.push(facts);
                }
                None => report.ocr_required.push(source.source_id.clone()),
            }
        }
        report.sources_processed = processed.len();
        report.sources_with_facts = processed.iter().filter(|p| !p.fact_chunks.is_empty()).count();

        let candidates: Vec<Chunk> = processed
            .iter()
            .flat_map(|p| p.fact_chunks.iter().cloned())
            .collect();
        let mut fact_chunks = dedup_fact_chunks(candidates);
        let mut facts: Vec<FactRecord> = processed.iter().map(|p| p.record.clone()).collect();

        report.quality_issues = quality_checks(registry, &mut facts, &mut fact_chunks);
        for record in &facts {
            for field in Field::ALL {
                if record.get(field).is_some() {
                    *report.field_counts.entry(field).or_default() += 1;
                }
            }
        }

        let fulltext: Vec<Chunk> = processed
            .into_iter()
            .flat_map(|p| p.fulltext_chunks)
            .collect();
        report.fact_chunks = fact_chunks.len();
        report.fulltext_chunks = fulltext.len();

        let mut chunks = fact_chunks;
        chunks.extend(fulltext);

        tracing::info!(
            sources = report.sources_total,
            processed = report.sources_processed,
            fact_chunks = report.fact_chunks,
            fulltext_chunks = report.fulltext_chunks,
            ocr_required = report.ocr_required.len(),
            issues = report.quality_issues.len(),
            "Built fact corpus"
        );

        BuildOutput {
            facts,
            chunks,
            report,
        }
    }

    /// Load the registry and texts named in `data`, build, and write the chunk
    /// corpus, fact table and OCR list
    pub fn run(&self, data: &DataConfig) -> Result<BuildReport> {
        let registry = load_registry(&data.sources_csv)?;

        let mut texts = HashMap::new();
        for source in registry.iter() {
            if let Some(text) = read_source_text(&data.raw_text_dir, &source.source_id)? {
                texts.insert(source.source_id.clone(), text);
            }
        }

        let output = self.build(&registry, &texts);
        write_chunks_jsonl(&data.chunks_path, &output.chunks)?;
        write_fact_table(&data.facts_path, &output.facts)?;
        write_atomic(&data.ocr_required_path, |w| {
            for source_id in &output.report.ocr_required {
                writeln!(w, "{}", source_id)?;
            }
            Ok(())
        })?;

        tracing::info!(
            chunks = %data.chunks_path.display(),
            facts = %data.facts_path.display(),
            "Wrote build outputs"
        );
        Ok(output.report)
    }
}

/// Keep the best-ranked chunk per (scheme, field); ties keep the earliest
pub fn dedup_fact_chunks(chunks: Vec<Chunk>) -> Vec<Chunk> {
    let mut best: BTreeMap<(SchemeTag, Field), Chunk> = BTreeMap::new();
    for chunk in chunks {
        let Some(field) = chunk.field else {
            continue;
        };
        let key = (chunk.scheme_tag, field);
        let replace = best
            .get(&key)
            .map(|kept| field_rank(field, chunk.source_type) < field_rank(field, kept.source_type))
            .unwrap_or(true);
        if replace {
            best.insert(key, chunk);
        }
    }
    best.into_values().collect()
}

/// Check the built facts, repairing what can be repaired; returns the issues
pub fn quality_checks(
    registry: &SourceRegistry,
    facts: &mut [FactRecord],
    chunks: &mut Vec<Chunk>,
) -> Vec<String> {
    let mut issues = Vec::new();
    let statutory = constants::statutory::ELSS_LOCK_IN;

    for record in facts.iter().filter(|r| r.scheme_tag == SchemeTag::Elss) {
        if record.get(Field::LockIn) != Some(statutory) {
            issues.push(format!("{}: ELSS missing lock_in={}", record.source_id, statutory));
        }
    }

    for record in facts.iter_mut() {
        if let Some(sip) = record.get(Field::MinSip) {
            if !SIP_FORMAT.is_match(sip) {
                issues.push(format!("{}: invalid min_sip format: {}", record.source_id, sip));
                let source_id = record.source_id.clone();
                record.set(Field::MinSip, None);
                chunks.retain(|c| !(c.source_id == source_id && c.field == Some(Field::MinSip)));
            }
        }
    }

    let before = chunks.len();
    chunks.retain(|c| {
        let bad = c.field == Some(Field::ExpenseRatio) && !allowed(Field::ExpenseRatio, c.source_type);
        if bad {
            issues.push(format!(
                "{}: expense_ratio from disallowed source type {}",
                c.source_id, c.source_type
            ));
        }
        !bad
    });
    if chunks.len() != before {
        for record in facts.iter_mut() {
            if !allowed(Field::ExpenseRatio, record.source_type) {
                record.set(Field::ExpenseRatio, None);
            }
        }
    }

    let mut per_scheme: BTreeMap<SchemeTag, usize> = BTreeMap::new();
    for scheme in registry.schemes() {
        per_scheme.insert(scheme, 0);
    }
    for record in facts.iter() {
        let best = per_scheme.entry(record.scheme_tag).or_default();
        *best = (*best).max(record.populated());
    }
    for (scheme, count) in per_scheme {
        if scheme != SchemeTag::All && count < constants::ingest::MIN_FIELDS_PER_SCHEME {
            issues.push(format!("{}: only {} fields extracted", scheme, count));
        }
    }

    for issue in &issues {
        tracing::warn!(issue = %issue, "Quality check failed");
    }
    issues
}
