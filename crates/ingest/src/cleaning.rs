//! Text cleaning applied before fact extraction
//!
//! Steps run in a fixed order:
//! 1. Whitespace normalization (line breaks joined, runs collapsed)
//! 2. Deterministic OCR split-word fixes and hyphenation joins
//! 3. Currency and percent normalization (`Rs. 1,000` -> `₹1000`, `1 %` -> `1%`)
//! 4. Removal of repeated all-caps header/footer tokens
//! 5. PII redaction
//!
//! Every step reports what it changed so the builder can log per source.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Replacement marker for redacted personal data
pub const REDACTED: &str = "<REDACTED_PII>";

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Known split words: (pattern, replacement, label)
static OCR_FIXES: Lazy<Vec<(Regex, &'static str, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)\bMi\s?nimum\b", "Minimum", "Mi nimum"),
        (r"(?i)\bSe\s?gregated\b", "Segregated", "Se gregated"),
        (r"(?i)\bSto\s?ck\b", "Stock", "Sto ck"),
    ]
    .into_iter()
    .map(|(p, r, l)| (Regex::new(p).unwrap(), r, l))
    .collect()
});

static HYPHENATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+)-\s+(\w+)").unwrap());

static CURRENCY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:₹|\bRs\.?|\bINR)\s?([0-9,]+(?:\.[0-9]+)?)").unwrap());
static RUPEE_COMMAS: Lazy<Regex> = Lazy::new(|| Regex::new(r"₹([0-9,]+)").unwrap());
static PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]+(?:\.[0-9]+)?)\s?%").unwrap());

/// Tokens never treated as headers, however often they repeat
const PROTECTED_TOKENS: [&str; 22] = [
    "AMC", "AMFI", "AUM", "BSE", "ELSS", "HDFC", "IDCW", "INR", "KIM", "NAV", "NFO", "NIFTY",
    "NIL", "NSE", "SEBI", "SID", "SIP", "STP", "SWP", "TER", "TRI", "XIRR",
];
const HEADER_WORDS: [&str; 4] = ["Page", "Page:", "©", "Copyright"];
/// A token must appear more often than this to count as a header
const HEADER_MIN_REPEATS: usize = 3;
const HEADER_MAX_CHARS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiKind {
    Pan,
    Aadhaar,
    Email,
    Phone,
}

impl PiiKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PiiKind::Pan => "pan",
            PiiKind::Aadhaar => "aadhaar",
            PiiKind::Email => "email",
            PiiKind::Phone => "phone",
        }
    }
}

/// Applied in this order
static PII_PATTERNS: Lazy<Vec<(PiiKind, Regex)>> = Lazy::new(|| {
    [
        (PiiKind::Pan, r"\b[A-Z]{5}[0-9]{4}[A-Z]\b"),
        (PiiKind::Aadhaar, r"\b[0-9]{4}\s[0-9]{4}\s[0-9]{4}\b"),
        (PiiKind::Email, r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"),
        (PiiKind::Phone, r"\b[6-9][0-9]{9}\b"),
    ]
    .into_iter()
    .map(|(kind, p)| (kind, Regex::new(p).unwrap()))
    .collect()
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OcrFix {
    pub label: &'static str,
    pub replacement: &'static str,
    pub count: usize,
}

/// What cleaning changed in one source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub original_chars: usize,
    pub cleaned_chars: usize,
    pub ocr_fixes: Vec<OcrFix>,
    pub hyphen_joins: usize,
    pub headers_removed: usize,
    pub pii: BTreeMap<PiiKind, usize>,
}

impl CleanReport {
    pub fn ocr_fix_count(&self) -> usize {
        self.ocr_fixes.iter().map(|f| f.count).sum()
    }

    pub fn pii_count(&self) -> usize {
        self.pii.values().sum()
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

fn fix_ocr_artifacts(text: String, report: &mut CleanReport) -> String {
    let mut text = text;
    for (pattern, replacement, label) in OCR_FIXES.iter() {
        let count = pattern.find_iter(&text).count();
        if count > 0 {
            text = pattern.replace_all(&text, *replacement).into_owned();
            report.ocr_fixes.push(OcrFix {
                label,
                replacement,
                count,
            });
        }
    }

    report.hyphen_joins = HYPHENATION.find_iter(&text).count();
    if report.hyphen_joins > 0 {
        text = HYPHENATION.replace_all(&text, "${1}${2}").into_owned();
    }
    text
}

pub fn normalize_currency(text: &str) -> String {
    let text = CURRENCY.replace_all(text, "₹${1}");
    let text = RUPEE_COMMAS.replace_all(&text, |caps: &regex::Captures| {
        format!("₹{}", caps[1].replace(',', ""))
    });
    PERCENT.replace_all(&text, "${1}%").into_owned()
}

fn is_all_caps(token: &str) -> bool {
    token.chars().any(char::is_alphabetic)
        && token
            .chars()
            .filter(|c| c.is_alphabetic())
            .all(char::is_uppercase)
}

fn is_protected(token: &str) -> bool {
    let core = token.trim_matches(|c: char| !c.is_alphanumeric());
    PROTECTED_TOKENS.contains(&core)
}

/// Drop tokens that repeat more than three times and look like page furniture
fn remove_repeated_headers(text: &str, report: &mut CleanReport) -> String {
    let tokens: Vec<&str> = text.split(' ').collect();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in &tokens {
        *counts.entry(token).or_default() += 1;
    }

    let is_header = |token: &str| {
        counts.get(token).copied().unwrap_or(0) > HEADER_MIN_REPEATS
            && ((token.chars().count() < HEADER_MAX_CHARS && is_all_caps(token))
                || HEADER_WORDS.contains(&token))
            && !is_protected(token)
    };

    let kept: Vec<&str> = tokens.iter().copied().filter(|t| !is_header(t)).collect();
    report.headers_removed = tokens.len() - kept.len();
    kept.join(" ")
}

fn redact_pii(text: String, report: &mut CleanReport) -> String {
    let mut text = text;
    for (kind, pattern) in PII_PATTERNS.iter() {
        let count = pattern.find_iter(&text).count();
        if count > 0 {
            text = pattern.replace_all(&text, REDACTED).into_owned();
            report.pii.insert(*kind, count);
        }
    }
    text
}

/// Run every cleaning step in order
pub fn clean_text(text: &str, source_id: &str) -> (String, CleanReport) {
    let mut report = CleanReport {
        original_chars: text.chars().count(),
        ..Default::default()
    };

    let cleaned = normalize_whitespace(text);
    let cleaned = fix_ocr_artifacts(cleaned, &mut report);
    let cleaned = normalize_currency(&cleaned);
    let cleaned = remove_repeated_headers(&cleaned, &mut report);
    let cleaned = redact_pii(cleaned, &mut report);
    report.cleaned_chars = cleaned.chars().count();

    for fix in &report.ocr_fixes {
        tracing::debug!(source_id, label = fix.label, count = fix.count, "Fixed OCR artifact");
    }
    for (kind, count) in &report.pii {
        tracing::info!(source_id, kind = kind.as_str(), count, "Redacted PII");
    }
    tracing::debug!(
        source_id,
        original = report.original_chars,
        cleaned = report.cleaned_chars,
        headers_removed = report.headers_removed,
        "Cleaned source text"
    );

    (cleaned, report)
}

/// True when the text is too short to be a usable extraction
pub fn needs_ocr(text: &str, min_chars: usize) -> bool {
    text.trim().chars().count() < min_chars
}
