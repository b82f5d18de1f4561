//! Hierarchical hybrid retriever
//!
//! Narrows the corpus by scheme, then by (scheme, field) for metric queries,
//! searches the full vector index, filters the hits to the narrowed set and
//! ranks them with a hybrid score:
//!
//! ```text
//! relevance = 0.5 * vector + 0.15 * min(keyword, 2) + 0.15 * authority + 0.2 * type_boost
//! ```
//!
//! The index, store and embedder are shared read-only; a retrieval never
//! mutates them.

use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use fundfacts_config::RetrievalConfig;
use fundfacts_core::{EmbeddingProvider, Field, QueryType, RetrievedChunk, SchemeTag};

use crate::classifier;
use crate::index::FlatIndex;
use crate::reranker::Reranker;
use crate::store::CorpusStore;
use crate::RagError;

static ENTITY_ROLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(fund manager|manager|investment manager|name|tenure)\b").unwrap()
});
static PERSON_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-z]+\s+[A-Z][a-z]+\b").unwrap());
static METRIC_WITH_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(expense|ter|exit load|sip|minimum|lock-in)\b.*\d+|\d+.*\b(expense|ter|exit load|sip|minimum|lock-in)\b",
    )
    .unwrap()
});
static LIST_SIGNAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\d+%|\d+\.\d+%|top\s+\d+").unwrap());
static DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.\d+").unwrap());

/// Metric terms that trigger overview injection, paired with the text an
/// overview chunk must contain to be injected for that term
static OVERVIEW_METRICS: Lazy<Vec<(Regex, Regex)>> = Lazy::new(|| {
    [
        (r"\b(expense ratio|ter)\b", r"(?i)\b(total expense ratio|expense ratio|expense|ter)\b"),
        (r"\bexit load\b", r"(?i)\bexit\s+load\b"),
        (r"\bsip\b", r"(?i)\bsip\b"),
        (r"\block-in\b", r"(?i)\block[-\s]?in\b"),
    ]
    .iter()
    .map(|(query, chunk)| (Regex::new(query).unwrap(), Regex::new(chunk).unwrap()))
    .collect()
});

/// Retriever configuration
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    pub default_top_k: usize,
    /// Minimum (scheme, field) bucket size before narrowing to it
    pub field_filter_threshold: usize,
    pub hierarchical: bool,
    pub reranking_enabled: bool,
    pub include_overview: bool,
    /// Characters of text used as the dedup fingerprint
    pub dedup_prefix_chars: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        use fundfacts_config::constants::retrieval;

        Self {
            default_top_k: retrieval::DEFAULT_TOP_K,
            field_filter_threshold: retrieval::FIELD_FILTER_THRESHOLD,
            hierarchical: true,
            reranking_enabled: true,
            include_overview: true,
            dedup_prefix_chars: retrieval::DEDUP_PREFIX_CHARS,
        }
    }
}

impl From<&RetrievalConfig> for RetrieverConfig {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            default_top_k: config.default_top_k,
            field_filter_threshold: config.field_filter_threshold,
            hierarchical: config.hierarchical,
            reranking_enabled: config.reranking_enabled,
            include_overview: config.include_overview,
            dedup_prefix_chars: config.dedup_prefix_chars,
        }
    }
}

/// Per-call switches
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalOptions {
    pub top_k: usize,
    pub hierarchical: bool,
    pub rerank: bool,
    pub include_overview: bool,
    /// Scheme carried over from the conversation, used when the query names none
    pub scheme_hint: Option<SchemeTag>,
}

impl RetrievalOptions {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_scheme_hint(mut self, scheme: Option<SchemeTag>) -> Self {
        self.scheme_hint = scheme;
        self
    }

    pub fn without_rerank(mut self) -> Self {
        self.rerank = false;
        self
    }

    pub fn flat(mut self) -> Self {
        self.hierarchical = false;
        self
    }
}

impl From<&RetrieverConfig> for RetrievalOptions {
    fn from(config: &RetrieverConfig) -> Self {
        Self {
            top_k: config.default_top_k,
            hierarchical: config.hierarchical,
            rerank: config.reranking_enabled,
            include_overview: config.include_overview,
            scheme_hint: None,
        }
    }
}

/// How a query narrows the corpus before vector search
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalPlan {
    pub query_type: QueryType,
    pub scheme: Option<SchemeTag>,
    pub field: Option<Field>,
    /// Allowed chunk indices; `None` when hierarchical filtering is off
    pub candidates: Option<HashSet<usize>>,
    pub search_k: usize,
}

/// Score breakdown of one search hit
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalCandidate {
    pub index: usize,
    pub vector_similarity: f32,
    pub keyword_score: f32,
    pub source_authority: f32,
    pub type_boost: f32,
    pub relevance_score: f32,
}

/// Saturating keyword score: `count / (1 + 0.5 * count)` summed per keyword
pub fn keyword_score(text: &str, keywords: &BTreeSet<String>) -> f32 {
    let text = text.to_lowercase();
    keywords
        .iter()
        .map(|kw| {
            let count = text.matches(kw.to_lowercase().as_str()).count() as f32;
            if count > 0.0 {
                count / (1.0 + 0.5 * count)
            } else {
                0.0
            }
        })
        .sum()
}

/// Query-type specific textual signals
pub fn type_boost(query_type: QueryType, text: &str, source_id: &str) -> f32 {
    let mut boost = 0.0;
    match query_type {
        QueryType::Entity => {
            if ENTITY_ROLE.is_match(text) {
                boost += 0.2;
            }
            if PERSON_NAME.is_match(text) {
                boost += 0.15;
            }
        }
        QueryType::Metric => {
            if METRIC_WITH_NUMBER.is_match(text) {
                boost += 0.2;
            }
            if source_id.contains("overview") {
                boost += 0.1;
            }
        }
        QueryType::List => {
            if LIST_SIGNAL.is_match(text) {
                boost += 0.15;
            }
            let lower = text.to_lowercase();
            if lower.contains("portfolio") || lower.contains("holdings") {
                boost += 0.1;
            }
        }
        QueryType::HowTo | QueryType::Comparison | QueryType::General => {}
    }
    boost
}

fn hybrid_relevance(vector: f32, keyword: f32, authority: f32, boost: f32) -> f32 {
    use fundfacts_config::constants::retrieval;

    vector * retrieval::VECTOR_WEIGHT
        + keyword.min(retrieval::KEYWORD_SCORE_CAP) * retrieval::KEYWORD_WEIGHT
        + authority * retrieval::AUTHORITY_WEIGHT
        + boost * retrieval::TYPE_BOOST_WEIGHT
}

/// Nearest-neighbour breadth per query type
fn base_search_k(query_type: QueryType, k: usize) -> usize {
    match query_type {
        QueryType::Entity => (k * 5).min(40),
        QueryType::List => (k * 4).min(35),
        QueryType::Metric => (k * 3).min(30),
        _ => (k * 3).min(25),
    }
}

fn prefix_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

pub struct HierarchicalRetriever {
    index: Arc<FlatIndex>,
    store: Arc<CorpusStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    reranker: Arc<Reranker>,
    config: RetrieverConfig,
}

impl HierarchicalRetriever {
    /// Create a retriever over an aligned index and store
    pub fn new(
        index: Arc<FlatIndex>,
        store: Arc<CorpusStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        reranker: Arc<Reranker>,
        config: RetrieverConfig,
    ) -> Result<Self, RagError> {
        if index.len() != store.len() {
            return Err(RagError::DataIntegrity(format!(
                "vector index has {} entries but metadata has {}",
                index.len(),
                store.len()
            )));
        }
        if !index.is_empty() && index.dim() != embedder.dimension() {
            return Err(RagError::DataIntegrity(format!(
                "index dimension {} does not match embedder '{}' dimension {}",
                index.dim(),
                embedder.model_name(),
                embedder.dimension()
            )));
        }

        Ok(Self {
            index,
            store,
            embedder,
            reranker,
            config,
        })
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<CorpusStore> {
        &self.store
    }

    /// Options built from the configured defaults
    pub fn default_options(&self) -> RetrievalOptions {
        RetrievalOptions::from(&self.config)
    }

    /// Classify the query and compute the candidate set and search breadth
    pub fn plan(&self, query: &str, options: &RetrievalOptions) -> RetrievalPlan {
        let query_type = classifier::classify(query);
        let corpus_len = self.store.len();
        let k = options.top_k;

        if !options.hierarchical {
            return RetrievalPlan {
                query_type,
                scheme: None,
                field: None,
                candidates: None,
                search_k: base_search_k(query_type, k),
            };
        }

        let scheme = classifier::identify_scheme(query).or(options.scheme_hint);

        let mut candidates: HashSet<usize> = match scheme {
            Some(s) if !self.store.by_scheme(s).is_empty() => {
                self.store.by_scheme(s).iter().copied().collect()
            }
            _ => (0..corpus_len).collect(),
        };

        let mut field = None;
        if let (QueryType::Metric, Some(s)) = (query_type, scheme) {
            field = classifier::identify_field(query);
            if let Some(f) = field {
                let bucket = self.store.by_scheme_field(s, f);
                if !bucket.is_empty() {
                    if bucket.len() >= self.config.field_filter_threshold {
                        let bucket: HashSet<usize> = bucket.iter().copied().collect();
                        candidates.retain(|idx| bucket.contains(idx));
                    }
                } else {
                    candidates.extend(self.store.by_scheme_field(SchemeTag::All, f).iter().copied());
                }
            }
        }

        let mut search_k = base_search_k(query_type, k);
        if !candidates.is_empty() {
            search_k = (search_k * 2).min(corpus_len);
        }

        RetrievalPlan {
            query_type,
            scheme,
            field,
            candidates: Some(candidates),
            search_k,
        }
    }

    /// Retrieve up to `options.top_k` chunks for a query
    ///
    /// Embedding runs on the blocking pool. An embedding failure is returned
    /// as an error; callers treat it as "no chunks found".
    pub async fn retrieve(
        &self,
        query: &str,
        options: &RetrievalOptions,
    ) -> Result<Vec<RetrievedChunk>, RagError> {
        let embedder = Arc::clone(&self.embedder);
        let q = query.to_string();
        let vector = tokio::task::spawn_blocking(move || embedder.encode_one(&q))
            .await
            .map_err(|e| RagError::Embedding(format!("Embedding task failed: {}", e)))?
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        self.retrieve_with_vector(query, &vector, options)
    }

    /// Retrieval with a precomputed query vector
    pub fn retrieve_with_vector(
        &self,
        query: &str,
        query_vector: &[f32],
        options: &RetrievalOptions,
    ) -> Result<Vec<RetrievedChunk>, RagError> {
        let k = options.top_k;
        if k == 0 {
            return Ok(Vec::new());
        }

        let plan = self.plan(query, options);
        let hits = self.index.search(query_vector, plan.search_k)?;
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let hits = match &plan.candidates {
            Some(candidates) if !candidates.is_empty() && candidates.len() < self.store.len() => {
                let filtered: Vec<(f32, usize)> = hits
                    .iter()
                    .filter(|(_, idx)| candidates.contains(idx))
                    .copied()
                    .collect();
                if filtered.is_empty() {
                    tracing::debug!(
                        query_type = %plan.query_type,
                        hits = hits.len(),
                        "Hierarchical filter removed every hit, using unfiltered results"
                    );
                    hits
                } else {
                    filtered
                }
            }
            _ => hits,
        };

        let keywords = classifier::expanded_keywords(query, plan.query_type);
        let mut seen_prefixes: HashSet<&str> = HashSet::new();
        let mut scored: Vec<RetrievalCandidate> = Vec::with_capacity(hits.len());

        for (similarity, idx) in hits {
            let chunk = match self.store.get(idx) {
                Some(chunk) => chunk,
                None => continue,
            };
            if !seen_prefixes.insert(prefix_chars(&chunk.text, self.config.dedup_prefix_chars)) {
                continue;
            }

            let kw = keyword_score(&chunk.text, &keywords);
            let authority = chunk.authority();
            let boost = type_boost(plan.query_type, &chunk.text, &chunk.source_id);
            scored.push(RetrievalCandidate {
                index: idx,
                vector_similarity: similarity,
                keyword_score: kw,
                source_authority: authority,
                type_boost: boost,
                relevance_score: hybrid_relevance(similarity, kw, authority, boost),
            });
        }

        scored.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(Ordering::Equal)
        });

        let use_rerank = options.rerank && self.reranker.is_available();
        let candidate_count = if use_rerank { k * 2 } else { k };

        let mut results: Vec<RetrievedChunk> = scored
            .iter()
            .take(candidate_count)
            .filter_map(|c| {
                self.store
                    .get(c.index)
                    .map(|chunk| RetrievedChunk::new(chunk.clone(), c.vector_similarity, c.relevance_score))
            })
            .collect();

        if options.include_overview && plan.query_type == QueryType::Metric {
            if let Some(extra) = self.overview_fallback(query, plan.scheme, &results, &keywords) {
                results.push(extra);
            }
        }

        tracing::debug!(
            query_type = %plan.query_type,
            scheme = ?plan.scheme,
            field = ?plan.field,
            candidates = plan.candidates.as_ref().map(|c| c.len()),
            search_k = plan.search_k,
            results = results.len(),
            "Hybrid retrieval complete"
        );

        if use_rerank && results.len() > k {
            results.truncate(k * 2);
            return Ok(self.reranker.rerank_with_metadata(query, results, k));
        }

        results.truncate(k);
        Ok(results)
    }

    /// One overview chunk with the requested metric and a decimal value, if
    /// the results contain nothing from the fund's overview yet
    fn overview_fallback(
        &self,
        query: &str,
        scheme: Option<SchemeTag>,
        results: &[RetrievedChunk],
        keywords: &BTreeSet<String>,
    ) -> Option<RetrievedChunk> {
        use fundfacts_config::constants::retrieval;

        let scheme = scheme?;
        let query_lower = query.to_lowercase();
        let (_, chunk_pattern) = OVERVIEW_METRICS
            .iter()
            .find(|(query_pattern, _)| query_pattern.is_match(&query_lower))?;

        let overview: Vec<(usize, &fundfacts_core::Chunk)> =
            self.store.overview_chunks(scheme).collect();
        let already_present = results
            .iter()
            .any(|r| overview.iter().any(|(_, c)| c.id == r.chunk.id));
        if already_present {
            return None;
        }

        let (_, chunk) = overview.into_iter().find(|(_, c)| {
            chunk_pattern.is_match(&c.text)
                && DECIMAL.is_match(prefix_chars(&c.text, retrieval::OVERVIEW_DECIMAL_WINDOW))
        })?;

        let similarity = retrieval::OVERVIEW_INJECTION_SIMILARITY;
        let mut relevance = hybrid_relevance(
            similarity,
            keyword_score(&chunk.text, keywords),
            chunk.authority(),
            type_boost(QueryType::Metric, &chunk.text, &chunk.source_id),
        );
        if let Some(tail) = results.last() {
            relevance = relevance.min(tail.relevance_score);
        }

        tracing::debug!(source_id = %chunk.source_id, "Injected overview chunk");
        Some(RetrievedChunk::new(chunk.clone(), similarity, relevance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashEmbedder;
    use fundfacts_config::constants::retrieval;
    use fundfacts_core::{Chunk, SourceType};

    fn chunk(id: &str, scheme: SchemeTag, field: Option<Field>, st: SourceType, text: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            source_id: id.split("::").next().unwrap_or(id).to_string(),
            text: text.to_string(),
            scheme_tag: scheme,
            field,
            source_type: st,
            source_url: String::new(),
            last_fetched_date: None,
        }
    }

    fn retriever(chunks: Vec<Chunk>) -> HierarchicalRetriever {
        let embedder = Arc::new(HashEmbedder::default());
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = embedder.encode(&texts).unwrap();
        let index = FlatIndex::from_vectors(embedder.dimension(), &vectors).unwrap();
        HierarchicalRetriever::new(
            Arc::new(index),
            Arc::new(CorpusStore::new(chunks)),
            embedder,
            Arc::new(Reranker::passthrough()),
            RetrieverConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_keyword_score_saturates() {
        let keywords: BTreeSet<String> = ["exit load".to_string()].into_iter().collect();
        let once = keyword_score("Exit load is 1%", &keywords);
        let thrice = keyword_score("exit load exit load exit load", &keywords);
        assert!((once - 1.0 / 1.5).abs() < 1e-6);
        assert!((thrice - 3.0 / 2.5).abs() < 1e-6);
        assert!(thrice < 2.0);
    }

    #[test]
    fn test_type_boosts() {
        assert!((type_boost(QueryType::Entity, "Fund Manager Roshi Jain", "x") - 0.35).abs() < 1e-6);
        assert!((type_boost(QueryType::Metric, "Exit load 1%", "amc_elss_overview") - 0.3).abs() < 1e-6);
        assert!((type_boost(QueryType::List, "Top 10 holdings 8.5%", "x") - 0.25).abs() < 1e-6);
        assert_eq!(type_boost(QueryType::General, "anything 10%", "x"), 0.0);
    }

    #[test]
    fn test_prefix_chars_is_char_safe() {
        assert_eq!(prefix_chars("₹500 minimum", 4), "₹500");
        assert_eq!(prefix_chars("abc", 10), "abc");
    }

    #[test]
    fn test_search_k_by_type() {
        assert_eq!(base_search_k(QueryType::Entity, 5), 25);
        assert_eq!(base_search_k(QueryType::Entity, 10), 40);
        assert_eq!(base_search_k(QueryType::List, 10), 35);
        assert_eq!(base_search_k(QueryType::Metric, 5), 15);
        assert_eq!(base_search_k(QueryType::General, 10), 25);
    }

    #[test]
    fn test_plan_narrows_to_scheme() {
        let r = retriever(vec![
            chunk("a", SchemeTag::Elss, None, SourceType::SidPdf, "elss text"),
            chunk("b", SchemeTag::Hybrid, None, SourceType::SidPdf, "hybrid text"),
        ]);
        let plan = r.plan("Who manages HDFC ELSS?", &r.default_options());
        assert_eq!(plan.query_type, QueryType::Entity);
        assert_eq!(plan.scheme, Some(SchemeTag::Elss));
        assert_eq!(plan.candidates, Some([0].into_iter().collect()));
        assert_eq!(plan.search_k, 2);
    }

    #[test]
    fn test_plan_skips_sparse_field_bucket() {
        let r = retriever(vec![
            chunk("a", SchemeTag::Elss, Some(Field::ExitLoad), SourceType::SidPdf, "Exit Load: 1%."),
            chunk("b", SchemeTag::Elss, None, SourceType::SidPdf, "elss prose"),
        ]);
        let plan = r.plan("exit load of elss", &r.default_options());
        assert_eq!(plan.field, Some(Field::ExitLoad));
        assert_eq!(plan.candidates.unwrap().len(), 2);
    }

    #[test]
    fn test_plan_intersects_dense_field_bucket() {
        let mut chunks: Vec<Chunk> = (0..3)
            .map(|i| {
                chunk(
                    &format!("el{}", i),
                    SchemeTag::Elss,
                    Some(Field::ExitLoad),
                    SourceType::SidPdf,
                    &format!("Exit Load: {}%.", i + 1),
                )
            })
            .collect();
        chunks.push(chunk("prose", SchemeTag::Elss, None, SourceType::SidPdf, "elss prose"));
        let r = retriever(chunks);

        let plan = r.plan("exit load of elss", &r.default_options());
        assert_eq!(plan.candidates, Some([0, 1, 2].into_iter().collect()));
    }

    #[test]
    fn test_plan_unions_all_scheme_bucket() {
        let r = retriever(vec![
            chunk("lc", SchemeTag::LargeCap, None, SourceType::SidPdf, "large cap prose"),
            chunk("all", SchemeTag::All, Some(Field::Riskometer), SourceType::Regulatory, "Riskometer: Very High."),
            chunk("hy", SchemeTag::Hybrid, None, SourceType::SidPdf, "hybrid prose"),
        ]);
        let plan = r.plan("riskometer of HDFC Large Cap Fund", &r.default_options());
        assert_eq!(plan.candidates, Some([0, 1].into_iter().collect()));
    }

    #[test]
    fn test_plan_uses_scheme_hint() {
        let r = retriever(vec![
            chunk("a", SchemeTag::Elss, None, SourceType::SidPdf, "elss text"),
            chunk("b", SchemeTag::Hybrid, None, SourceType::SidPdf, "hybrid text"),
        ]);
        let options = r.default_options().with_scheme_hint(Some(SchemeTag::Hybrid));
        let plan = r.plan("and the exit load?", &options);
        assert_eq!(plan.scheme, Some(SchemeTag::Hybrid));

        let named = r.plan("exit load of elss", &options);
        assert_eq!(named.scheme, Some(SchemeTag::Elss));
    }

    #[test]
    fn test_flat_plan_has_no_candidates() {
        let r = retriever(vec![chunk("a", SchemeTag::Elss, None, SourceType::SidPdf, "elss")]);
        let plan = r.plan("exit load of elss", &r.default_options().flat());
        assert!(plan.candidates.is_none());
    }

    #[test]
    fn test_empty_corpus_returns_nothing() {
        let r = retriever(Vec::new());
        let v = vec![0.0; 384];
        assert!(r.retrieve_with_vector("exit load", &v, &r.default_options()).unwrap().is_empty());
    }

    fn query_vector(query: &str) -> Vec<f32> {
        HashEmbedder::default().encode_one(query).unwrap()
    }

    fn exit_load_facts(n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|i| {
                chunk(
                    &format!("hdfc_elss_sid{}", i),
                    SchemeTag::Elss,
                    Some(Field::ExitLoad),
                    SourceType::SidPdf,
                    &format!("Exit Load: {}.00%. Source: hdfc_elss_sid{} (sid_pdf).", i + 1, i),
                )
            })
            .collect()
    }

    #[test]
    fn test_overview_chunk_injected_for_metric_query() {
        let mut chunks = exit_load_facts(3);
        chunks.push(chunk(
            "amc_elss_overview",
            SchemeTag::Elss,
            None,
            SourceType::SchemeOverview,
            "HDFC ELSS Tax Saver overview. Exit load 1.00% if redeemed within a year.",
        ));
        let r = retriever(chunks);
        let query = "exit load of elss";

        let results = r
            .retrieve_with_vector(query, &query_vector(query), &r.default_options())
            .unwrap();
        assert_eq!(results.len(), 4);

        let injected = results.last().unwrap();
        assert_eq!(injected.chunk.id, "amc_elss_overview");
        assert_eq!(injected.similarity, retrieval::OVERVIEW_INJECTION_SIMILARITY);
        assert!(results[..3]
            .iter()
            .all(|real| injected.relevance_score <= real.relevance_score));
    }

    #[test]
    fn test_overview_not_injected_when_present() {
        let mut chunks = exit_load_facts(1);
        chunks.push(chunk(
            "amc_elss_overview",
            SchemeTag::Elss,
            None,
            SourceType::SchemeOverview,
            "HDFC ELSS Tax Saver overview. Exit load 1.00% if redeemed within a year.",
        ));
        let r = retriever(chunks);
        let query = "exit load of elss";

        let results = r
            .retrieve_with_vector(query, &query_vector(query), &r.default_options())
            .unwrap();
        assert_eq!(results.len(), 2);
        let overview_hits = results.iter().filter(|c| c.chunk.id == "amc_elss_overview").count();
        assert_eq!(overview_hits, 1);
    }

    #[test]
    fn test_overview_needs_decimal_value() {
        let mut chunks = exit_load_facts(3);
        chunks.push(chunk(
            "amc_elss_overview",
            SchemeTag::Elss,
            None,
            SourceType::SchemeOverview,
            "HDFC ELSS Tax Saver overview. Exit load applies on early redemption.",
        ));
        let r = retriever(chunks);
        let query = "exit load of elss";

        let results = r
            .retrieve_with_vector(query, &query_vector(query), &r.default_options())
            .unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|c| c.chunk.id != "amc_elss_overview"));
    }

    #[test]
    fn test_overview_injection_can_be_disabled() {
        let mut chunks = exit_load_facts(3);
        chunks.push(chunk(
            "amc_elss_overview",
            SchemeTag::Elss,
            None,
            SourceType::SchemeOverview,
            "HDFC ELSS Tax Saver overview. Exit load 1.00% if redeemed within a year.",
        ));
        let r = retriever(chunks);
        let query = "exit load of elss";
        let options = RetrievalOptions {
            include_overview: false,
            ..r.default_options()
        };

        let results = r.retrieve_with_vector(query, &query_vector(query), &options).unwrap();
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_misaligned_inputs_rejected() {
        let embedder = Arc::new(HashEmbedder::default());
        let index = FlatIndex::from_vectors(384, &[vec![0.0; 384]]).unwrap();
        let result = HierarchicalRetriever::new(
            Arc::new(index),
            Arc::new(CorpusStore::new(Vec::new())),
            embedder,
            Arc::new(Reranker::passthrough()),
            RetrieverConfig::default(),
        );
        assert!(matches!(result, Err(RagError::DataIntegrity(_))));
    }
}
