//! Per-field extractors run over cleaned source text
//!
//! Each extractor tries its labelled patterns first and falls back to
//! proximity searches around the field's keyword. Values come back in the
//! fact-table form (`₹500`, `1.00%`, `Nil`, `3 years`, level names).

use once_cell::sync::Lazy;
use regex::Regex;

use fundfacts_config::constants::{bounds, statutory};
use fundfacts_core::{Field, SchemeTag, SourceDocument, SourceType};

const RUPEE_PREFIX: &str = r"(?:₹|Rs\.?|INR)?\s?";
const AMOUNT: &str = r"([0-9][0-9,]*)";
const PERCENT: &str = r"([0-9]+(?:\.[0-9]+)?)\s?%";

fn labelled(labels: &[&str], value: &str) -> Vec<Regex> {
    labels
        .iter()
        .map(|label| Regex::new(&format!(r"(?i){}[:\s]+{}", label, value)).unwrap())
        .collect()
}

static MIN_SIP_LABELLED: Lazy<Vec<Regex>> = Lazy::new(|| {
    labelled(
        &[
            r"Minimum\s+SIP",
            r"Minimum\s+Subscription",
            r"Minimum\s+Installment",
            r"MinimumSIP",
            r"Minimum\s+Application",
        ],
        &format!("{}{}", RUPEE_PREFIX, AMOUNT),
    )
});

/// A bare hundred-rupee mention, accepted only near SIP vocabulary
static HUNDRED_RUPEES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)(?:Rs\.?|₹|INR)\s?100\b(?:\s?/-)?").unwrap(),
        Regex::new(r"(?i)\b100\s?(?:/-|rupees)").unwrap(),
    ]
});
const SIP_CONTEXT: [&str; 5] = ["sip", "subscription", "minimum", "application", "installment"];

static SIP_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bSIP\b").unwrap());
static FIRST_AMOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(AMOUNT).unwrap());

static MIN_LUMPSUM: Lazy<Vec<Regex>> = Lazy::new(|| {
    labelled(
        &[
            r"Minimum\s+Application(?:\s+Amount)?",
            r"Minimum\s+Amount",
            r"Minimum\s+Investment",
        ],
        &format!("{}{}", RUPEE_PREFIX, AMOUNT),
    )
});

/// "Exit Load of 1% if redeemed within 1 year ... No Exit Load after"
static EXIT_LOAD_STRUCTURED: Lazy<Vec<Regex>> = Lazy::new(|| {
    let tail = r"\s*.*?(?:within|from).*?(?:year|month).*?(?:No|Nil)\s*Exit\s*Load";
    [r"Exit\s*Load\s*of\s*", r"Exit\s*Load[:\s]+"]
        .iter()
        .map(|head| Regex::new(&format!(r"(?is){}{}{}", head, PERCENT, tail)).unwrap())
        .collect()
});
static EXIT_LOAD_LABELLED: Lazy<Vec<Regex>> =
    Lazy::new(|| labelled(&[r"Exit\s+Load", r"Redemption\s+Charge"], PERCENT));
static EXIT_LOAD_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Exit\s*Load|Redemption\s*Charge").unwrap());
static EXIT_LOAD_NIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Exit\s*Load[:\s]+(?:Nil|No\s+Exit\s+Load)").unwrap());
static FIRST_PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(PERCENT).unwrap());

static LOCK_IN: Lazy<Vec<Regex>> = Lazy::new(|| {
    labelled(
        &[r"Lock[-\s]?in", r"Lock[-\s]?in\s+period"],
        r"([0-9]+)\s*(?:years?|yrs?)\b",
    )
});

static EXPENSE_RATIO_LABELLED: Lazy<Vec<Regex>> = Lazy::new(|| {
    labelled(
        &[r"Total\s+Expense\s+Ratio", r"\bTER", r"expense\s+ratio"],
        PERCENT,
    )
});
static EXPENSE_RATIO_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Total\s+Expense\s+Ratio|\bTER\b|expense\s+ratio").unwrap());
static TWO_PLACE_DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]+\.[0-9]{1,2})").unwrap());

/// Index names keep a trailing all-caps qualifier (`NIFTY 100 TRI`)
static BENCHMARK: Lazy<Vec<Regex>> = Lazy::new(|| {
    let nifty = r"((?i:NIFTY)\s+[0-9]+(?:\s+[A-Z]{2,})?)";
    [
        format!(r"(?i:Benchmark)[:\s]+{}", nifty),
        r"(?i:Benchmark)[:\s]+((?i:S&P\s+BSE)\s+[0-9]+)".to_string(),
        r"(?i:Benchmark)[:\s]+((?i:BSE)\s+[0-9]+)".to_string(),
        format!(r"(?i:Benchmark\s+Index)[:\s]+{}", nifty),
        format!(r"{}\s+(?i:Index)", nifty),
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});
static BENCHMARK_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:website|subjectto|fields)\b").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static RISKOMETER: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)Risk[-\s]?o[-\s]?meter[:\s]+([^.\n]+)").unwrap(),
        Regex::new(r"(?i)Risk\s+Level[:\s]+([^.\n]+)").unwrap(),
    ]
});

/// Canonical riskometer levels, longest first so substrings do not shadow them
pub const RISK_LEVELS: [&str; 6] = [
    "Very High",
    "Moderately High",
    "Low to Moderate",
    "Moderate",
    "High",
    "Low",
];

fn floor_boundary(text: &str, idx: usize) -> usize {
    let mut idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_boundary(text: &str, idx: usize) -> usize {
    let mut idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

/// Byte window around a match, widened to char boundaries
fn span(text: &str, start: usize, end: usize) -> &str {
    &text[floor_boundary(text, start)..ceil_boundary(text, end)]
}

fn parse_amount(raw: &str) -> Option<u64> {
    raw.replace(',', "").parse().ok()
}

fn parse_percent(raw: &str) -> Option<f64> {
    raw.parse().ok()
}

fn in_range(value: f64, min: f64, max: f64) -> bool {
    (min..=max).contains(&value)
}

pub fn extract_min_sip(text: &str) -> Option<String> {
    // The first labelled amount decides, even when it is implausibly small
    for pattern in MIN_SIP_LABELLED.iter() {
        if let Some(amount) = pattern.captures(text).and_then(|c| parse_amount(&c[1])) {
            return (amount >= bounds::MIN_SIP_RUPEES).then(|| format!("₹{}", amount));
        }
    }

    for pattern in HUNDRED_RUPEES.iter() {
        for m in pattern.find_iter(text) {
            let context = span(text, m.start().saturating_sub(100), m.end() + 100).to_lowercase();
            if SIP_CONTEXT.iter().any(|k| context.contains(k)) {
                return Some("₹100".to_string());
            }
        }
    }

    SIP_WORD.find_iter(text).find_map(|m| {
        let before = span(text, m.start().saturating_sub(50), m.start()).to_lowercase();
        if !before.contains("minimum") {
            return None;
        }
        let after = span(text, m.end(), m.end() + 100);
        let amount = FIRST_AMOUNT.captures(after).and_then(|c| parse_amount(&c[1]))?;
        (amount >= bounds::MIN_SIP_RUPEES).then(|| format!("₹{}", amount))
    })
}

pub fn extract_min_lumpsum(text: &str) -> Option<String> {
    MIN_LUMPSUM.iter().find_map(|pattern| {
        pattern
            .captures(text)
            .and_then(|c| parse_amount(&c[1]))
            .map(|amount| format!("₹{}", amount))
    })
}

fn plausible_exit_load(raw: &str) -> Option<String> {
    let value = parse_percent(raw)?;
    in_range(value, bounds::EXIT_LOAD_MIN, bounds::EXIT_LOAD_MAX).then(|| format!("{}%", raw))
}

pub fn extract_exit_load(text: &str) -> Option<String> {
    let labelled = EXIT_LOAD_STRUCTURED
        .iter()
        .chain(EXIT_LOAD_LABELLED.iter())
        .find_map(|pattern| pattern.captures(text).and_then(|c| plausible_exit_load(&c[1])));
    if labelled.is_some() {
        return labelled;
    }

    for keyword in EXIT_LOAD_KEYWORD.find_iter(text) {
        let window = span(text, keyword.end(), keyword.end() + 200);
        let Some(caps) = FIRST_PERCENT.captures(window) else {
            continue;
        };
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let before = window[..whole.start()].to_lowercase();
        if before.contains("nil") || (before.contains("no") && before.contains("exit")) {
            continue;
        }
        if let Some(value) = plausible_exit_load(&caps[1]) {
            return Some(value);
        }
    }

    EXIT_LOAD_NIL.is_match(text).then(|| "Nil".to_string())
}

/// Lock-in stated by an ELSS source; other schemes have none
pub fn extract_lock_in(text: &str, scheme: SchemeTag) -> Option<String> {
    if scheme != SchemeTag::Elss {
        return None;
    }

    let stated = LOCK_IN
        .iter()
        .find_map(|pattern| pattern.captures(text).and_then(|c| parse_amount(&c[1])));
    if let Some(years) = stated {
        return Some(format!("{} years", years));
    }

    (text.to_uppercase().contains("ELSS") || text.contains("Equity Linked Saving"))
        .then(|| statutory::ELSS_LOCK_IN.to_string())
}

fn plausible_expense_ratio(raw: &str) -> Option<String> {
    let value = parse_percent(raw)?;
    in_range(value, bounds::EXPENSE_RATIO_MIN, bounds::EXPENSE_RATIO_MAX)
        .then(|| format!("{}%", raw))
}

/// Only factsheets and regulatory disclosures carry a usable TER
pub fn extract_expense_ratio(text: &str, source_type: SourceType) -> Option<String> {
    if !matches!(
        source_type,
        SourceType::FactsheetConsolidated | SourceType::Regulatory
    ) {
        return None;
    }

    let labelled = EXPENSE_RATIO_LABELLED
        .iter()
        .find_map(|pattern| pattern.captures(text).and_then(|c| plausible_expense_ratio(&c[1])));
    if labelled.is_some() {
        return labelled;
    }

    EXPENSE_RATIO_KEYWORD.find_iter(text).find_map(|keyword| {
        let window = span(text, keyword.end(), keyword.end() + 100);
        TWO_PLACE_DECIMAL
            .captures(window)
            .and_then(|c| plausible_expense_ratio(&c[1]))
    })
}

pub fn extract_benchmark(text: &str) -> Option<String> {
    BENCHMARK.iter().find_map(|pattern| {
        let raw = pattern.captures(text)?.get(1)?.as_str();
        let cleaned = BENCHMARK_NOISE.replace_all(raw, "");
        let cleaned = WHITESPACE.replace_all(cleaned.trim(), " ").into_owned();
        (cleaned.chars().count() > 3).then_some(cleaned)
    })
}

pub fn extract_riskometer(text: &str) -> Option<String> {
    RISKOMETER.iter().find_map(|pattern| {
        let level_text = pattern.captures(text)?.get(1)?.as_str().to_lowercase();
        RISK_LEVELS
            .iter()
            .find(|level| level_text.contains(&level.to_lowercase()))
            .map(|level| level.to_string())
    })
}

/// Run the extractor for `field` over one source's cleaned text
pub fn extract_field(field: Field, text: &str, source: &SourceDocument) -> Option<String> {
    match field {
        Field::MinSip => extract_min_sip(text),
        Field::MinLumpsum => extract_min_lumpsum(text),
        Field::ExitLoad => extract_exit_load(text),
        Field::LockIn => extract_lock_in(text, source.scheme_tag),
        Field::ExpenseRatio => extract_expense_ratio(text, source.source_type),
        Field::Benchmark => extract_benchmark(text),
        Field::Riskometer => extract_riskometer(text),
    }
}
