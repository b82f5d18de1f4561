//! Query classification and synonym expansion
//!
//! Every decision here is an ordered table of `(tag, patterns)` pairs
//! evaluated in declared order; the first tag with any matching pattern wins.
//! Overlapping patterns exist ("fund manager" and "exit load" in one query),
//! so order is part of the contract.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

use fundfacts_core::{Field, QueryType, SchemeTag};

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

/// Query type patterns, matched against the lowercased query
static QUERY_PATTERNS: Lazy<Vec<(QueryType, Vec<Regex>)>> = Lazy::new(|| {
    vec![
        (
            QueryType::Entity,
            compile(&[
                r"\bwho\b",
                r"\bmanager\b",
                r"\bmanages\b",
                r"\bfund manager\b",
                r"\binvestment manager\b",
                r"\bportfolio manager\b",
                r"\bmanaged by\b",
            ]),
        ),
        (
            QueryType::Metric,
            compile(&[
                r"\bexpense ratio\b",
                r"\bter\b",
                r"\btotal expense ratio\b",
                r"\bexit load\b",
                r"\bredemption charge\b",
                r"\bexit charge\b",
                r"\bminimum sip\b",
                r"\bmin sip\b",
                r"\bminimum investment\b",
                r"\bminimum amount\b",
                r"\bminimum lumpsum\b",
                r"\bmin lumpsum\b",
                r"\bminimum application\b",
                r"\bmin application\b",
                r"\block-in\b",
                r"\block in\b",
                r"\blockin\b",
                r"\briskometer\b",
                r"\brisk-o-meter\b",
                r"\brisk meter\b",
                r"\bbenchmark\b",
            ]),
        ),
        (
            QueryType::List,
            compile(&[
                r"\btop\s+\d+\b",
                r"\btop holdings\b",
                r"\bportfolio composition\b",
                r"\bholdings\b",
                r"\blist of\b",
                r"\bwhat are the\b.*\bholdings\b",
                r"\basset allocation\b",
                r"\bsector allocation\b",
            ]),
        ),
        (
            QueryType::HowTo,
            compile(&[
                r"\bhow to\b",
                r"\bhow do i\b",
                r"\bhow can i\b",
                r"\bhow do you\b",
                r"\bdownload\b",
                r"\bredeem\b",
                r"\binvest\b",
                r"\bapply\b",
                r"\bwithdraw\b",
                r"\bswitch\b",
                r"\bget\b.*\bstatement\b",
                r"\bget\b.*\breport\b",
            ]),
        ),
        (
            QueryType::Comparison,
            compile(&[
                r"\bcompare\b",
                r"\bdifference\b",
                r"\bversus\b",
                r"\bvs\b",
                r"\bwhich is better\b",
                r"\bwhich one\b.*\bbetter\b",
            ]),
        ),
    ]
});

/// Synonym groups. Mentioning any member of a group pulls in the whole group,
/// so "TER" and "expense ratio" expand to each other.
const SYNONYM_GROUPS: &[&[&str]] = &[
    &["expense ratio", "ter", "total expense ratio", "expense", "ter%", "total expense"],
    &[
        "fund manager",
        "manager",
        "investment manager",
        "portfolio manager",
        "manages",
        "managed by",
        "fund manager name",
    ],
    &[
        "top holdings",
        "holdings",
        "portfolio",
        "portfolio composition",
        "asset allocation",
        "top 10",
        "top 5",
        "investments",
    ],
    &["exit load", "redemption charge", "exit charge", "redemption fee", "exit fee"],
    &[
        "minimum sip",
        "minimum investment",
        "minimum amount",
        "min sip",
        "sip minimum",
        "minimum subscription",
    ],
    &[
        "minimum lumpsum",
        "min lumpsum",
        "lumpsum",
        "minimum application",
        "minimum application amount",
        "one-time investment",
    ],
    &["lock-in", "lock in", "lockin", "lock-in period", "lock period", "elss lock-in"],
    &["benchmark", "benchmark index", "index", "benchmarking"],
    &["riskometer", "risk-o-meter", "risk o meter", "risk meter", "risk level"],
];

/// Fund names kept as scoring keywords when present in the query
const FUND_TERMS: &[&str] = &["large cap", "flexi cap", "flexicap", "elss", "hybrid", "equity"];

/// One regex per synonym group, bounded by non-word characters so "ter%" works
static SYNONYM_MATCHERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    SYNONYM_GROUPS
        .iter()
        .map(|group| {
            let mut terms: Vec<&str> = group.to_vec();
            terms.sort_by_key(|t| std::cmp::Reverse(t.len()));
            let alternation = terms
                .iter()
                .map(|t| regex::escape(t))
                .collect::<Vec<_>>()
                .join("|");
            Regex::new(&format!(r"(?:^|\W)(?:{})(?:\W|$)", alternation)).unwrap()
        })
        .collect()
});

/// Scheme detection, substring match on the lowercased query
const SCHEME_TERMS: &[(SchemeTag, &[&str])] = &[
    (SchemeTag::LargeCap, &["large cap", "largecap", "large-cap"]),
    (SchemeTag::FlexiCap, &["flexi cap", "flexicap", "flexi-cap"]),
    (
        SchemeTag::Elss,
        &["elss", "tax saver", "tax-saver", "equity linked saving", "taxsaver"],
    ),
    (SchemeTag::Hybrid, &["hybrid", "hybrid equity"]),
];

/// Field detection, first field with a matching pattern wins
static FIELD_PATTERNS: Lazy<Vec<(Field, Vec<Regex>)>> = Lazy::new(|| {
    vec![
        (
            Field::ExitLoad,
            compile(&[r"exit load", r"redemption charge", r"exit charge"]),
        ),
        (
            Field::ExpenseRatio,
            compile(&[r"expense ratio", r"\bter\b", r"total expense ratio"]),
        ),
        (
            Field::MinSip,
            compile(&[r"minimum sip", r"min sip", r"minimum investment"]),
        ),
        (
            Field::MinLumpsum,
            compile(&[
                r"minimum lumpsum",
                r"min lumpsum",
                r"minimum application",
                r"min application",
            ]),
        ),
        (Field::LockIn, compile(&[r"lock-in", r"lock in", r"lockin"])),
        (Field::Benchmark, compile(&[r"benchmark", r"benchmark index"])),
        (
            Field::Riskometer,
            compile(&[r"riskometer", r"risk-o-meter", r"risk meter"]),
        ),
    ]
});

/// Classify a query; `General` when no pattern group matches
pub fn classify(query: &str) -> QueryType {
    let query = query.to_lowercase();
    QUERY_PATTERNS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| p.is_match(&query)))
        .map(|(query_type, _)| *query_type)
        .unwrap_or(QueryType::General)
}

/// Boost keywords for a query type
pub fn keywords_for_type(query_type: QueryType) -> &'static [&'static str] {
    match query_type {
        QueryType::Entity => &[
            "fund manager",
            "manager",
            "investment manager",
            "portfolio manager",
            "equity analyst",
            "name",
            "tenure",
            "manages",
            "managed by",
            "who manages",
            "fund manager name",
        ],
        QueryType::Metric => &[
            "expense ratio",
            "ter",
            "exit load",
            "minimum",
            "sip",
            "lock-in",
            "benchmark",
            "riskometer",
        ],
        QueryType::List => &["holdings", "portfolio", "top", "composition", "allocation", "sector"],
        QueryType::HowTo => &["how", "download", "redeem", "invest", "apply", "steps", "process"],
        QueryType::Comparison => &["compare", "difference", "versus", "vs", "better"],
        QueryType::General => &[],
    }
}

fn matched_synonyms(query_lower: &str) -> impl Iterator<Item = &'static str> + '_ {
    SYNONYM_GROUPS
        .iter()
        .zip(SYNONYM_MATCHERS.iter())
        .filter(move |(_, matcher)| matcher.is_match(query_lower))
        .flat_map(|(group, _)| group.iter().copied())
}

/// The query plus every synonym of each recognized domain term.
///
/// Used only for scoring; the literal query is what gets embedded.
pub fn expand_query(query: &str) -> BTreeSet<String> {
    let query_lower = query.to_lowercase();
    let mut expanded = BTreeSet::new();
    expanded.insert(query.trim().to_string());
    expanded.extend(matched_synonyms(&query_lower).map(str::to_string));
    expanded.extend(
        FUND_TERMS
            .iter()
            .filter(|fund| query_lower.contains(*fund))
            .map(|fund| fund.to_string()),
    );
    expanded
}

/// Scoring keywords: synonyms of recognized terms plus the type's boost keywords
pub fn expanded_keywords(query: &str, query_type: QueryType) -> BTreeSet<String> {
    let query_lower = query.to_lowercase();
    let mut keywords: BTreeSet<String> = matched_synonyms(&query_lower).map(str::to_string).collect();
    keywords.extend(keywords_for_type(query_type).iter().map(|k| k.to_string()));
    keywords
}

/// Fund named in the query, if any
pub fn identify_scheme(query: &str) -> Option<SchemeTag> {
    let query = query.to_lowercase();
    SCHEME_TERMS
        .iter()
        .find(|(_, terms)| terms.iter().any(|t| query.contains(t)))
        .map(|(scheme, _)| *scheme)
}

/// Canonical field named in the query, if any
pub fn identify_field(query: &str) -> Option<Field> {
    let query = query.to_lowercase();
    FIELD_PATTERNS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| p.is_match(&query)))
        .map(|(field, _)| *field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_each_type() {
        assert_eq!(classify("Who manages HDFC Flexi Cap Fund?"), QueryType::Entity);
        assert_eq!(classify("What is the exit load for HDFC ELSS?"), QueryType::Metric);
        assert_eq!(classify("What is the TER of the hybrid fund"), QueryType::Metric);
        assert_eq!(classify("Show the top 10 holdings"), QueryType::List);
        assert_eq!(classify("How do I download my statement?"), QueryType::HowTo);
        assert_eq!(classify("Large cap vs flexi cap"), QueryType::Comparison);
        assert_eq!(classify("Tell me about HDFC mutual funds"), QueryType::General);
    }

    #[test]
    fn test_every_field_term_is_a_metric_query() {
        for query in [
            "minimum lumpsum for ELSS",
            "min sip of hybrid fund",
            "min application amount for flexi cap",
            "risk meter of large cap",
            "lockin for tax saver",
            "exit charge on early redemption",
        ] {
            assert_eq!(classify(query), QueryType::Metric, "{}", query);
            assert!(identify_field(query).is_some(), "{}", query);
        }
    }

    #[test]
    fn test_classify_priority_order_not_position() {
        // Metric term appears first, but entity is declared first
        assert_eq!(classify("exit load and fund manager of ELSS"), QueryType::Entity);
        // Metric beats list even though "holdings" is present
        assert_eq!(classify("benchmark and holdings"), QueryType::Metric);
        // "invest" is a how_to word but minimum investment is a metric
        assert_eq!(classify("minimum investment for large cap"), QueryType::Metric);
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        assert_eq!(classify("EXPENSE RATIO of ELSS"), QueryType::Metric);
        assert_eq!(classify("WHO is the manager"), QueryType::Entity);
    }

    #[test]
    fn test_ter_not_matched_inside_words() {
        assert_eq!(classify("tell me about the latest interest"), QueryType::General);
        assert_eq!(identify_field("what is the latest interest"), None);
    }

    #[test]
    fn test_expand_query_is_bidirectional() {
        let from_ter = expand_query("TER of ELSS");
        assert!(from_ter.contains("expense ratio"));
        assert!(from_ter.contains("total expense ratio"));
        assert!(from_ter.contains("elss"));
        assert!(from_ter.contains("TER of ELSS"));

        let from_ratio = expand_query("expense ratio of ELSS");
        assert!(from_ratio.contains("ter"));
    }

    #[test]
    fn test_expand_query_without_domain_terms() {
        let expanded = expand_query("hello there");
        assert_eq!(expanded.len(), 1);
        assert!(expanded.contains("hello there"));
    }

    #[test]
    fn test_synonym_groups_cover_every_field() {
        let probes = [
            ("minimum sip", Field::MinSip),
            ("minimum lumpsum", Field::MinLumpsum),
            ("exit load", Field::ExitLoad),
            ("lock-in", Field::LockIn),
            ("expense ratio", Field::ExpenseRatio),
            ("benchmark", Field::Benchmark),
            ("riskometer", Field::Riskometer),
        ];
        for (probe, field) in probes {
            assert!(expand_query(probe).len() > 1, "no synonyms for {}", probe);
            assert_eq!(identify_field(probe), Some(field));
        }
    }

    #[test]
    fn test_keywords_for_type() {
        assert!(keywords_for_type(QueryType::Entity).contains(&"tenure"));
        assert!(keywords_for_type(QueryType::Metric).contains(&"ter"));
        assert!(keywords_for_type(QueryType::General).is_empty());
    }

    #[test]
    fn test_expanded_keywords_combines_synonyms_and_type_keywords() {
        let keywords = expanded_keywords("exit load for elss", QueryType::Metric);
        assert!(keywords.contains("redemption charge"));
        assert!(keywords.contains("riskometer"));
        assert!(!keywords.contains("exit load for elss"));
    }

    #[test]
    fn test_identify_scheme() {
        assert_eq!(identify_scheme("HDFC Large Cap Fund"), Some(SchemeTag::LargeCap));
        assert_eq!(identify_scheme("flexicap TER"), Some(SchemeTag::FlexiCap));
        assert_eq!(identify_scheme("HDFC TaxSaver lock-in"), Some(SchemeTag::Elss));
        assert_eq!(identify_scheme("hybrid equity fund"), Some(SchemeTag::Hybrid));
        assert_eq!(identify_scheme("what is a riskometer"), None);
    }

    #[test]
    fn test_identify_field_order() {
        assert_eq!(identify_field("exit load and expense ratio"), Some(Field::ExitLoad));
        assert_eq!(identify_field("what is the TER"), Some(Field::ExpenseRatio));
        assert_eq!(identify_field("minimum investment amount"), Some(Field::MinSip));
        assert_eq!(identify_field("min application"), Some(Field::MinLumpsum));
        assert_eq!(identify_field("risk meter level"), Some(Field::Riskometer));
        assert_eq!(identify_field("who manages it"), None);
    }
}
