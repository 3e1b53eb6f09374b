//! Retrieval engine driving the full pipeline.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use ulid::Ulid;

use recall_core::{
    Archive, FusedResult, LexicalSearch, Modality, QueryVariant, RankedHit, RecallConfig,
    RecallError, Result, RetrievalStats, RetrievedRecord, VariantGenerator, VectorSearch,
};

use crate::expand::QueryExpander;
use crate::fusion::fuse;
use crate::hybrid::HybridSearcher;
use crate::select::select;

/// Multi-query hybrid retrieval engine.
///
/// Pipeline: expand the query into variants, fan the variants out over both
/// search backends concurrently, fuse all ranked lists with RRF, select the
/// top results, and report stats. Individual sub-search failures degrade
/// the result set; only a retrieval in which every list came back empty
/// returns an error.
pub struct RetrievalEngine<G, V, L, A> {
    /// Query expansion stage.
    expander: QueryExpander<G>,

    /// Per-variant hybrid search stage.
    searcher: Arc<HybridSearcher<V, L>>,

    /// Archive lookup for stats and hydration.
    archive: Arc<A>,

    /// Immutable per-engine configuration.
    config: RecallConfig,
}

impl<G, V, L, A> RetrievalEngine<G, V, L, A>
where
    G: VariantGenerator,
    V: VectorSearch + 'static,
    L: LexicalSearch + 'static,
    A: Archive,
{
    /// Create a new engine over the four collaborators.
    pub fn new(
        generator: Arc<G>,
        vector: Arc<V>,
        lexical: Arc<L>,
        archive: Arc<A>,
        config: RecallConfig,
    ) -> Self {
        let expander = QueryExpander::new(generator, config.expansion.prompt_template.clone());
        Self {
            expander,
            searcher: Arc::new(HybridSearcher::new(vector, lexical)),
            archive,
            config,
        }
    }

    /// Retrieve the top records for a query.
    pub async fn retrieve(&self, query: &str) -> Result<(Vec<FusedResult>, RetrievalStats)> {
        self.retrieve_filtered(query, None).await
    }

    /// Retrieve, excluding record ids the caller has already seen.
    pub async fn retrieve_filtered(
        &self,
        query: &str,
        exclude: Option<&HashSet<Ulid>>,
    ) -> Result<(Vec<FusedResult>, RetrievalStats)> {
        if query.trim().is_empty() {
            return Err(RecallError::invalid_argument("query must not be empty"));
        }

        let start = Instant::now();
        info!("Retrieving for query: {:?}", query);

        let variants = self
            .expander
            .expand(query, self.config.expansion.max_variants)
            .await;
        let variant_count = variants.len();

        let (lists, failed_searches) = self.fan_out(variants).await;

        let raw_hits: usize = lists.iter().map(Vec::len).sum();
        if lists.iter().all(Vec::is_empty) {
            return Err(RecallError::TotalFailure {
                searches: variant_count * 2,
                failed: failed_searches,
            });
        }

        let fused = fuse(&lists, self.config.search.rrf_k);
        let unique_records = fused.len();
        debug!(
            "Fused {} raw hits into {} unique records",
            raw_hits, unique_records
        );

        let results = select(fused, self.config.search.final_limit, exclude);
        let modality_counts = self.modality_breakdown(&results).await;

        let latency_ms = start.elapsed().as_millis() as u64;
        info!(
            "Retrieval completed in {}ms: {} results from {} variants ({} sub-searches failed)",
            latency_ms,
            results.len(),
            variant_count,
            failed_searches
        );

        let stats = RetrievalStats {
            variant_count,
            raw_hits,
            unique_records,
            failed_searches,
            modality_counts,
            latency_ms,
        };

        Ok((results, stats))
    }

    /// Retrieve and hydrate the selection into full records for the
    /// synthesis layer. Ids the archive no longer knows are skipped.
    pub async fn retrieve_records(
        &self,
        query: &str,
    ) -> Result<(Vec<RetrievedRecord>, RetrievalStats)> {
        let (results, stats) = self.retrieve(query).await?;

        let mut hydrated = Vec::with_capacity(results.len());
        for result in &results {
            match self.archive.get_record(result.record_id).await? {
                Some(record) => hydrated.push(RetrievedRecord {
                    rank: hydrated.len() as u32 + 1,
                    score: result.score,
                    record,
                }),
                None => {
                    debug!("Record {} vanished from archive, skipping", result.record_id)
                }
            }
        }

        Ok((hydrated, stats))
    }

    /// Run the hybrid searcher over all variants with bounded concurrency
    /// and an overall deadline.
    ///
    /// The deadline is enforced per sub-search inside the hybrid searcher,
    /// so a list that completed before expiry is fused even when its
    /// sibling or other variants are still hung; every timed-out side
    /// counts as one failed sub-search. Fusion is commutative, so
    /// completion order does not affect the final ranking.
    async fn fan_out(&self, variants: Vec<QueryVariant>) -> (Vec<Vec<RankedHit>>, usize) {
        let semaphore = Arc::new(Semaphore::new(self.config.search.max_concurrency.max(1)));
        let per_method_k = self.config.search.per_method_k;
        let deadline =
            tokio::time::Instant::now() + Duration::from_millis(self.config.search.timeout_ms);

        let mut tasks = JoinSet::new();
        for variant in variants {
            let searcher = Arc::clone(&self.searcher);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                // Never errors: the semaphore lives as long as the tasks.
                let _permit = semaphore.acquire_owned().await.ok();
                searcher.search(&variant, per_method_k, deadline).await
            });
        }

        let mut lists: Vec<Vec<RankedHit>> = Vec::new();
        let mut failed_searches = 0usize;

        // Every task resolves at the deadline at the latest, so a plain
        // join suffices here.
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(variant_lists) => {
                    failed_searches += variant_lists.failures as usize;
                    lists.push(variant_lists.semantic);
                    lists.push(variant_lists.lexical);
                }
                Err(e) => {
                    warn!("Variant search task failed: {}", e);
                    failed_searches += 2;
                }
            }
        }

        (lists, failed_searches)
    }

    /// Modality breakdown of the final selection, via archive lookup.
    ///
    /// Lookup failures are logged and skipped: the breakdown is reporting
    /// only and must not fail a retrieval that produced results.
    async fn modality_breakdown(
        &self,
        results: &[FusedResult],
    ) -> HashMap<Modality, usize> {
        let mut counts = HashMap::new();
        for result in results {
            match self.archive.get_modality(result.record_id).await {
                Ok(Some(modality)) => *counts.entry(modality).or_insert(0) += 1,
                Ok(None) => debug!("No modality for record {}", result.record_id),
                Err(e) => warn!(
                    "Modality lookup failed for record {}: {}",
                    result.record_id, e
                ),
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use recall_core::Record;

    fn uid(n: u128) -> Ulid {
        Ulid::from(n)
    }

    struct FixedGenerator(Vec<String>);

    #[async_trait]
    impl VariantGenerator for FixedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl VariantGenerator for FailingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<Vec<String>> {
            Err(RecallError::generation("model unavailable"))
        }
    }

    /// Returns the same id list for every query.
    struct FixedVector(Vec<Ulid>);

    #[async_trait]
    impl VectorSearch for FixedVector {
        async fn similarity_search(&self, _query: &str, _k: u32) -> Result<Vec<Ulid>> {
            Ok(self.0.clone())
        }
    }

    struct FixedLexical(Vec<Ulid>);

    #[async_trait]
    impl LexicalSearch for FixedLexical {
        async fn keyword_search(&self, _query: &str, _k: u32) -> Result<Vec<Ulid>> {
            Ok(self.0.clone())
        }
    }

    /// Vector backend that only answers the original query; variant
    /// reformulations hang past any reasonable deadline.
    struct SlowForVariants {
        original: String,
        ids: Vec<Ulid>,
    }

    #[async_trait]
    impl VectorSearch for SlowForVariants {
        async fn similarity_search(&self, query: &str, _k: u32) -> Result<Vec<Ulid>> {
            if query != self.original {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(self.ids.clone())
        }
    }

    struct MapArchive(HashMap<Ulid, Record>);

    impl MapArchive {
        fn with(entries: &[(u128, Modality)]) -> Self {
            let mut map = HashMap::new();
            for &(n, modality) in entries {
                let mut record = Record::new("general", "ana", modality, "body");
                record.id = uid(n);
                map.insert(record.id, record);
            }
            Self(map)
        }
    }

    #[async_trait]
    impl Archive for MapArchive {
        async fn get_modality(&self, id: Ulid) -> Result<Option<Modality>> {
            Ok(self.0.get(&id).map(|r| r.modality))
        }

        async fn get_record(&self, id: Ulid) -> Result<Option<Record>> {
            Ok(self.0.get(&id).cloned())
        }
    }

    fn test_config() -> RecallConfig {
        let mut config = RecallConfig::default();
        config.search.timeout_ms = 1_000;
        config
    }

    #[tokio::test]
    async fn test_scenario_three_variants_shared_hits() {
        // 3 variants, each producing semantic [1,2,3] and lexical [3,1,4].
        // Across the 6 lists: R1 at ranks {1,1,1,2,2,2}, R3 at {1,1,1,3,3,3},
        // so R1 > R3 > R2 > R4 under k=60, deterministically.
        let generator = FixedGenerator(vec![
            "paraphrase: what photos from the offsite".into(),
            "image: offsite pictured".into(),
        ]);
        let engine = RetrievalEngine::new(
            Arc::new(generator),
            Arc::new(FixedVector(vec![uid(1), uid(2), uid(3)])),
            Arc::new(FixedLexical(vec![uid(3), uid(1), uid(4)])),
            Arc::new(MapArchive::with(&[
                (1, Modality::Text),
                (2, Modality::Text),
                (3, Modality::Image),
                (4, Modality::Audio),
            ])),
            test_config(),
        );

        let (results, stats) = engine.retrieve("offsite photos").await.unwrap();

        let order: Vec<Ulid> = results.iter().map(|r| r.record_id).collect();
        assert_eq!(order, vec![uid(1), uid(3), uid(2), uid(4)]);

        // Accumulation order across lists may differ from the closed form
        // by float rounding, hence the tolerance.
        assert!((results[0].score - 3.0 * (1.0 / 61.0 + 1.0 / 62.0)).abs() < 1e-12);
        assert!((results[1].score - 3.0 * (1.0 / 61.0 + 1.0 / 63.0)).abs() < 1e-12);
        assert_eq!(results[0].contributing_lists, 6);
        assert_eq!(results[2].contributing_lists, 3);

        assert_eq!(stats.variant_count, 3);
        assert_eq!(stats.raw_hits, 18);
        assert_eq!(stats.unique_records, 4);
        assert_eq!(stats.failed_searches, 0);
        assert_eq!(stats.modality_counts[&Modality::Text], 2);
        assert_eq!(stats.modality_counts[&Modality::Image], 1);
        assert_eq!(stats.modality_counts[&Modality::Audio], 1);

        // Reproducible on a second run.
        let (again, _) = engine.retrieve("offsite photos").await.unwrap();
        assert_eq!(again, results);
    }

    #[tokio::test]
    async fn test_all_empty_is_total_failure() {
        let engine = RetrievalEngine::new(
            Arc::new(FixedGenerator(vec!["paraphrase: anything else".into()])),
            Arc::new(FixedVector(vec![])),
            Arc::new(FixedLexical(vec![])),
            Arc::new(MapArchive::with(&[])),
            test_config(),
        );

        let err = engine.retrieve("offsite photos").await.unwrap_err();
        assert!(matches!(
            err,
            RecallError::TotalFailure {
                searches: 4,
                failed: 0
            }
        ));
    }

    #[tokio::test]
    async fn test_degraded_expansion_still_retrieves() {
        let engine = RetrievalEngine::new(
            Arc::new(FailingGenerator),
            Arc::new(FixedVector(vec![uid(1), uid(2)])),
            Arc::new(FixedLexical(vec![uid(2), uid(3)])),
            Arc::new(MapArchive::with(&[
                (1, Modality::Text),
                (2, Modality::Video),
                (3, Modality::Text),
            ])),
            test_config(),
        );

        let (results, stats) = engine.retrieve("offsite photos").await.unwrap();

        assert!(!results.is_empty());
        assert_eq!(stats.variant_count, 1);
        // R2 appears in both lists and must lead.
        assert_eq!(results[0].record_id, uid(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_fuses_partial_results() {
        let engine = RetrievalEngine::new(
            Arc::new(FixedGenerator(vec!["paraphrase: anything else".into()])),
            Arc::new(SlowForVariants {
                original: "offsite photos".into(),
                ids: vec![uid(1)],
            }),
            Arc::new(FixedLexical(vec![uid(2)])),
            Arc::new(MapArchive::with(&[
                (1, Modality::Text),
                (2, Modality::Text),
            ])),
            test_config(),
        );

        let (results, stats) = engine.retrieve("offsite photos").await.unwrap();

        // The reformulation's semantic side hung past the deadline and was
        // abandoned; everything that completed is fused, including the
        // hung variant's own lexical list.
        assert_eq!(stats.variant_count, 2);
        assert_eq!(stats.failed_searches, 1);
        assert_eq!(stats.raw_hits, 3);
        // uid(2) leads: rank 1 in both lexical lists.
        assert_eq!(results[0].record_id, uid(2));
        assert_eq!(results[0].contributing_lists, 2);
        assert!(results.iter().any(|r| r.record_id == uid(1)));
    }

    #[tokio::test]
    async fn test_retrieve_filtered_excludes_seen() {
        let engine = RetrievalEngine::new(
            Arc::new(FailingGenerator),
            Arc::new(FixedVector(vec![uid(1), uid(2)])),
            Arc::new(FixedLexical(vec![uid(1), uid(3)])),
            Arc::new(MapArchive::with(&[])),
            test_config(),
        );

        let seen: HashSet<Ulid> = [uid(1)].into_iter().collect();
        let (results, _) = engine
            .retrieve_filtered("offsite photos", Some(&seen))
            .await
            .unwrap();

        assert!(results.iter().all(|r| r.record_id != uid(1)));
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_retrieve_records_hydrates_and_skips_vanished() {
        let engine = RetrievalEngine::new(
            Arc::new(FailingGenerator),
            Arc::new(FixedVector(vec![uid(1), uid(2)])),
            Arc::new(FixedLexical(vec![uid(2)])),
            // Record 1 is not in the archive.
            Arc::new(MapArchive::with(&[(2, Modality::Image)])),
            test_config(),
        );

        let (records, _) = engine.retrieve_records("offsite photos").await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].rank, 1);
        assert_eq!(records[0].record.id, uid(2));
        assert_eq!(records[0].record.modality, Modality::Image);
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let engine = RetrievalEngine::new(
            Arc::new(FailingGenerator),
            Arc::new(FixedVector(vec![])),
            Arc::new(FixedLexical(vec![])),
            Arc::new(MapArchive::with(&[])),
            test_config(),
        );

        let err = engine.retrieve("   ").await.unwrap_err();
        assert!(matches!(err, RecallError::InvalidArgument { .. }));
    }
}
