//! Fund manager lookup over overview text

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use fundfacts_core::Chunk;

const TITLE: &str = r"(?:Ms\.|Mr\.|Mrs\.|Dr\.)";
const NAME: &str = r"([A-Z][a-z]+\s+[A-Z][a-z]+)";

/// Tried in order; the first listed manager is usually the senior one
static MANAGER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        format!(r"(?i:fund\s+managers?)[:\s]+{}?\s*{}", TITLE, NAME),
        format!(r"{}\s*{}\s*\n\s*(?i:senior\s+fund\s+manager)", TITLE, NAME),
        format!(r"(?s){}?\s*{}[^.]*?(?i:(?:senior\s+)?fund\s+manager)", TITLE, NAME),
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static TENURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:since|from|tenure)[:\s]+(\d{4})").unwrap());

/// Words that match the name shape but are role titles
const ROLE_WORDS: [&str; 6] = ["Senior", "Fund", "Manager", "Managers", "Equity", "Analyst"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundManager {
    pub name: String,
    pub source_id: String,
    /// Year the manager took over, when stated
    pub since: Option<String>,
}

fn plausible_name(name: &str) -> bool {
    let words: Vec<&str> = name.split_whitespace().collect();
    words.len() == 2
        && words
            .iter()
            .all(|w| w.chars().count() > 2 && !ROLE_WORDS.contains(w))
}

fn manager_in(text: &str) -> Option<String> {
    MANAGER_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
            .find(|name| plausible_name(name))
    })
}

/// First manager named in the given chunks, in chunk order
pub fn find_fund_manager<'a>(chunks: impl IntoIterator<Item = &'a Chunk>) -> Option<FundManager> {
    chunks.into_iter().find_map(|chunk| {
        let name = manager_in(&chunk.text)?;
        let since = TENURE
            .captures(&chunk.text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        tracing::debug!(source_id = %chunk.source_id, %name, "Found fund manager");
        Some(FundManager {
            name,
            source_id: chunk.source_id.clone(),
            since,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fundfacts_core::{SchemeTag, SourceType};

    fn overview(text: &str) -> Chunk {
        Chunk {
            id: "amc_flexicap_overview::fulltext::0".to_string(),
            source_id: "amc_flexicap_overview".to_string(),
            text: text.to_string(),
            scheme_tag: SchemeTag::FlexiCap,
            field: None,
            source_type: SourceType::SchemeOverview,
            source_url: String::new(),
            last_fetched_date: None,
        }
    }

    #[test]
    fn test_fund_managers_heading() {
        let chunks = vec![overview("Fund Managers\nMs. Roshi Jain\nSenior Fund Manager since 2022")];
        let found = find_fund_manager(&chunks).unwrap();
        assert_eq!(found.name, "Roshi Jain");
        assert_eq!(found.source_id, "amc_flexicap_overview");
        assert_eq!(found.since.as_deref(), Some("2022"));
    }

    #[test]
    fn test_name_before_title() {
        let chunks = vec![overview("Managed by Mr. Rahul Baijal, Senior Fund Manager at the AMC")];
        assert_eq!(find_fund_manager(&chunks).unwrap().name, "Rahul Baijal");
    }

    #[test]
    fn test_rejects_role_words_and_short_names() {
        let chunks = vec![overview("Senior Fund Manager details are on the website")];
        assert_eq!(find_fund_manager(&chunks), None);
        assert!(!plausible_name("Al Smith"));
        assert!(plausible_name("Roshi Jain"));
    }

    #[test]
    fn test_first_chunk_with_manager_wins() {
        let chunks = vec![
            overview("Exit load 1% within a year"),
            overview("Fund Manager: Dhruv Muchhal"),
            overview("Fund Manager: Roshi Jain"),
        ];
        assert_eq!(find_fund_manager(&chunks).unwrap().name, "Dhruv Muchhal");
    }
}
