//! Query engine
//!
//! Ties classification, hierarchical retrieval, strict extraction, conflict
//! metadata and the response cache together. Each call takes an immutable
//! [`ConversationContext`] and returns the next one alongside the outcome.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use fundfacts_config::Settings;
use fundfacts_core::{
    ConflictRecord, ConversationContext, Field, Lookup, QueryType, RetrievedChunk, SchemeTag,
};

use crate::cache::ResponseCache;
use crate::classifier;
use crate::conflict::ConflictDetector;
use crate::embeddings::build_embedder;
use crate::extractor::{ExtractedMetric, MetricExtractor};
use crate::manager::{find_fund_manager, FundManager};
use crate::reranker::build_reranker;
use crate::retriever::{HierarchicalRetriever, RetrieverConfig};
use crate::store::{load_corpus, CorpusStore};
use crate::RagError;

/// Extracted metric plus the fact-table view of the same (scheme, field)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAnswer {
    pub field: Field,
    pub metric: Lookup<ExtractedMetric>,
    /// Most authoritative `(value, source_id)` in the fact table
    pub resolved: Option<(String, String)>,
    /// Divergent values across sources; informational only
    pub conflicts: Vec<ConflictRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub query: String,
    pub query_type: QueryType,
    pub scheme: Option<SchemeTag>,
    /// Empty retrieval is `NotFound`; an embedding failure is `Error`
    pub retrieval: Lookup<Vec<RetrievedChunk>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<MetricAnswer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<Lookup<FundManager>>,
}

impl QueryOutcome {
    pub fn chunks(&self) -> &[RetrievedChunk] {
        match &self.retrieval {
            Lookup::Found(chunks) => chunks,
            _ => &[],
        }
    }
}

pub struct FactsheetEngine {
    retriever: Arc<HierarchicalRetriever>,
    extractor: MetricExtractor,
    conflicts: Option<ConflictDetector>,
    cache: Option<Arc<ResponseCache<QueryOutcome>>>,
}

impl FactsheetEngine {
    pub fn new(
        retriever: Arc<HierarchicalRetriever>,
        conflicts: Option<ConflictDetector>,
        cache: Option<Arc<ResponseCache<QueryOutcome>>>,
    ) -> Self {
        let extractor = MetricExtractor::new(Arc::clone(retriever.store()));
        Self {
            retriever,
            extractor,
            conflicts,
            cache,
        }
    }

    /// Load models, index and fact table.
    ///
    /// Embedding or index failures are fatal. A missing cross-encoder or fact
    /// table only disables re-ranking or conflict metadata.
    pub fn from_settings(settings: &Settings) -> Result<Self, RagError> {
        let embedder = build_embedder(&settings.embedding)?;
        let (index, store) = load_corpus(&settings.data.index_path, &settings.data.metadata_path)?;
        let reranker = build_reranker(&settings.reranker);

        let retriever = HierarchicalRetriever::new(
            Arc::new(index),
            Arc::new(store),
            embedder,
            Arc::new(reranker),
            RetrieverConfig::from(&settings.retrieval),
        )?;

        let conflicts = match ConflictDetector::load(&settings.data.facts_path) {
            Ok(detector) => Some(detector),
            Err(e) => {
                tracing::warn!(
                    path = %settings.data.facts_path.display(),
                    error = %e,
                    "Fact table unavailable, conflict metadata disabled"
                );
                None
            }
        };

        let cache = settings
            .cache
            .enabled
            .then(|| Arc::new(ResponseCache::from_config(&settings.cache)));

        tracing::info!(
            chunks = retriever.store().len(),
            reranking = settings.retrieval.reranking_enabled,
            cache = settings.cache.enabled,
            "Engine ready"
        );
        Ok(Self::new(Arc::new(retriever), conflicts, cache))
    }

    pub fn retriever(&self) -> &HierarchicalRetriever {
        &self.retriever
    }

    pub fn conflicts(&self) -> Option<&ConflictDetector> {
        self.conflicts.as_ref()
    }

    pub fn cache(&self) -> Option<&ResponseCache<QueryOutcome>> {
        self.cache.as_deref()
    }

    /// Answer with the configured result count
    pub async fn answer(
        &self,
        query: &str,
        ctx: &ConversationContext,
    ) -> (QueryOutcome, ConversationContext) {
        let top_k = self.retriever.config().default_top_k;
        self.answer_with_top_k(query, ctx, top_k).await
    }

    pub async fn answer_with_top_k(
        &self,
        query: &str,
        ctx: &ConversationContext,
        top_k: usize,
    ) -> (QueryOutcome, ConversationContext) {
        let scheme = ctx.resolve_scheme(classifier::identify_scheme(query));
        let next_ctx = ctx.advance(scheme);

        let cache_key = format!(
            "{}|{}|{}",
            ResponseCache::<QueryOutcome>::key(query),
            scheme.map(|s| s.as_str()).unwrap_or("-"),
            top_k
        );
        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(&cache_key)) {
            tracing::debug!(query, "Cache hit");
            return (cached, next_ctx);
        }

        let query_type = classifier::classify(query);
        let options = self
            .retriever
            .default_options()
            .with_top_k(top_k)
            .with_scheme_hint(scheme);

        let retrieval = match self.retriever.retrieve(query, &options).await {
            Ok(chunks) if chunks.is_empty() => Lookup::NotFound,
            Ok(chunks) => Lookup::Found(chunks),
            Err(e) => {
                tracing::warn!(query, error = %e, "Retrieval failed, continuing without chunks");
                Lookup::Error(fundfacts_core::Error::from(e).kind())
            }
        };

        let mut outcome = QueryOutcome {
            query: query.to_string(),
            query_type,
            scheme,
            retrieval,
            metric: None,
            manager: None,
        };

        if let Some(field) = classifier::identify_field(query) {
            outcome.metric = Some(self.metric_answer(field, scheme, outcome.chunks()));
        }
        if query_type == QueryType::Entity {
            outcome.manager = Some(self.manager_answer(scheme, outcome.chunks()));
        }

        // Failed retrievals are retried on the next call
        if let Some(cache) = self.cache.as_ref().filter(|_| !outcome.retrieval.is_error()) {
            cache.set(cache_key, outcome.clone());
        }
        (outcome, next_ctx)
    }

    /// Strict extraction for an explicit field, using the fact store only
    pub fn extract(&self, field: Field, scheme: Option<SchemeTag>) -> MetricAnswer {
        self.metric_answer(field, scheme, &[])
    }

    fn metric_answer(
        &self,
        field: Field,
        scheme: Option<SchemeTag>,
        chunks: &[RetrievedChunk],
    ) -> MetricAnswer {
        let metric = self
            .extractor
            .extract(field, scheme, chunks.iter().map(|r| &r.chunk));

        let (resolved, conflicts) = match (&self.conflicts, scheme) {
            (Some(detector), Some(s)) => (
                detector.get_resolved_value(s, field),
                detector.conflicts_for(s, field),
            ),
            _ => (None, Vec::new()),
        };

        MetricAnswer {
            field,
            metric,
            resolved,
            conflicts,
        }
    }

    /// Manager from the fund's overview first, then from retrieved text
    fn manager_answer(&self, scheme: Option<SchemeTag>, chunks: &[RetrievedChunk]) -> Lookup<FundManager> {
        let store: &CorpusStore = self.retriever.store();
        let overview = scheme
            .into_iter()
            .flat_map(move |s| store.overview_chunks(s).map(|(_, c)| c));
        let retrieved = chunks.iter().map(|r| &r.chunk);
        Lookup::from(find_fund_manager(overview.chain(retrieved)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashEmbedder;
    use crate::index::FlatIndex;
    use crate::reranker::Reranker;
    use fundfacts_core::{Chunk, EmbeddingProvider, FactRecord, SourceType};
    use std::time::Duration;

    fn chunk(id: &str, source: &str, scheme: SchemeTag, field: Option<Field>, st: SourceType, text: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            source_id: source.to_string(),
            text: text.to_string(),
            scheme_tag: scheme,
            field,
            source_type: st,
            source_url: String::new(),
            last_fetched_date: None,
        }
    }

    fn engine(with_cache: bool) -> FactsheetEngine {
        let chunks = vec![
            chunk(
                "hdfc_elss_kim__exit_load",
                "hdfc_elss_kim",
                SchemeTag::Elss,
                Some(Field::ExitLoad),
                SourceType::KimPdf,
                "Exit Load: 1.00%. Source: hdfc_elss_kim (kim_pdf).",
            ),
            chunk(
                "amc_flexicap_overview::fulltext::0",
                "amc_flexicap_overview",
                SchemeTag::FlexiCap,
                None,
                SourceType::SchemeOverview,
                "Fund Managers Ms. Roshi Jain Senior Fund Manager",
            ),
            chunk(
                "hdfc_hybrid_sid::fulltext::0",
                "hdfc_hybrid_sid",
                SchemeTag::Hybrid,
                None,
                SourceType::SidPdf,
                "Exit load of 1% if redeemed within 12 months from allotment",
            ),
        ];
        let embedder = Arc::new(HashEmbedder::default());
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let index = FlatIndex::from_vectors(embedder.dimension(), &embedder.encode(&texts).unwrap()).unwrap();
        let retriever = HierarchicalRetriever::new(
            Arc::new(index),
            Arc::new(CorpusStore::new(chunks)),
            embedder,
            Arc::new(Reranker::passthrough()),
            RetrieverConfig::default(),
        )
        .unwrap();

        let facts = ConflictDetector::new(vec![
            FactRecord::new("hdfc_elss_kim", SchemeTag::Elss, SourceType::KimPdf).with(Field::ExitLoad, "1.00%"),
            FactRecord::new("amc_elss_overview", SchemeTag::Elss, SourceType::SchemeOverview)
                .with(Field::ExitLoad, "2.00%"),
        ]);
        let cache = with_cache.then(|| Arc::new(ResponseCache::new(8, Duration::from_secs(60))));
        FactsheetEngine::new(Arc::new(retriever), Some(facts), cache)
    }

    #[tokio::test]
    async fn test_metric_answer_with_conflicts() {
        let engine = engine(false);
        let (outcome, ctx) = engine
            .answer("What is the exit load for HDFC ELSS?", &ConversationContext::new())
            .await;

        assert_eq!(outcome.scheme, Some(SchemeTag::Elss));
        assert_eq!(ctx.last_scheme, Some(SchemeTag::Elss));
        let metric = outcome.metric.unwrap();
        let found = metric.metric.found().unwrap();
        assert_eq!(found.value, "1.00%");
        assert_eq!(found.source_id, "hdfc_elss_kim");
        assert_eq!(metric.resolved, Some(("1.00%".to_string(), "hdfc_elss_kim".to_string())));
        assert_eq!(metric.conflicts.len(), 1);
    }

    #[tokio::test]
    async fn test_follow_up_uses_context_scheme() {
        let engine = engine(false);
        let ctx = ConversationContext::new().advance(Some(SchemeTag::Hybrid));
        let (outcome, next) = engine.answer("and the exit load?", &ctx).await;

        assert_eq!(outcome.scheme, Some(SchemeTag::Hybrid));
        assert_eq!(next.turns, 2);
        let found = outcome.metric.unwrap().metric.found().unwrap();
        assert_eq!(found.value, "1.00%");
        assert_eq!(found.source_id, "hdfc_hybrid_sid");
    }

    #[tokio::test]
    async fn test_manager_from_overview() {
        let engine = engine(false);
        let (outcome, _) = engine
            .answer("Who manages HDFC Flexi Cap Fund?", &ConversationContext::new())
            .await;
        assert_eq!(outcome.query_type, QueryType::Entity);
        let manager = outcome.manager.unwrap().found().unwrap();
        assert_eq!(manager.name, "Roshi Jain");
    }

    #[tokio::test]
    async fn test_cache_serves_repeat_queries() {
        let engine = engine(true);
        let ctx = ConversationContext::new();
        let (first, _) = engine.answer("Exit load for HDFC ELSS", &ctx).await;
        let (second, _) = engine.answer("exit  load for hdfc elss", &ctx).await;

        assert_eq!(first.metric, second.metric);
        let stats = engine.cache().unwrap().stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_explicit_extract_uses_store() {
        let engine = engine(false);
        let answer = engine.extract(Field::ExitLoad, Some(SchemeTag::Elss));
        assert_eq!(answer.metric.found().unwrap().value, "1.00%");
    }
}
