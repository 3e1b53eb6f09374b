//! Per-variant hybrid search over the semantic and lexical backends.

use std::sync::Arc;

use tokio::time::{timeout_at, Instant};
use tracing::warn;
use ulid::Ulid;

use recall_core::{LexicalSearch, QueryVariant, RankedHit, SearchMethod, VariantKind, VectorSearch};

/// The two independently ranked lists produced for one query variant.
///
/// The lists are never merged or score-blended here: semantic search favors
/// paraphrase matches against generated descriptions while lexical search
/// favors exact keywords in verbatim transcripts, and their raw scores live
/// on incompatible scales. Weighting happens at fusion time, over ranks.
#[derive(Debug, Default)]
pub struct VariantLists {
    /// Embedding-similarity results, rank 1 first.
    pub semantic: Vec<RankedHit>,

    /// Keyword results, rank 1 first.
    pub lexical: Vec<RankedHit>,

    /// Sub-searches that failed (0..=2). A failed sub-search contributes an
    /// empty list, never an error.
    pub failures: u32,
}

/// Runs both search backends for one query variant.
pub struct HybridSearcher<V, L> {
    /// Vector-similarity backend.
    vector: Arc<V>,

    /// Term-weighted lexical backend.
    lexical: Arc<L>,
}

impl<V, L> HybridSearcher<V, L>
where
    V: VectorSearch,
    L: LexicalSearch,
{
    /// Create a new hybrid searcher.
    pub fn new(vector: Arc<V>, lexical: Arc<L>) -> Self {
        Self { vector, lexical }
    }

    /// Search both backends concurrently, returning up to `k` hits each.
    ///
    /// Either backend failing must not abort the other: the failed side
    /// yields an empty list and a warning. The deadline is applied to each
    /// side separately, so a completed list is kept even when its sibling
    /// is still hung at expiry.
    pub async fn search(&self, variant: &QueryVariant, k: u32, deadline: Instant) -> VariantLists {
        let (semantic, lexical) = tokio::join!(
            timeout_at(deadline, self.vector.similarity_search(&variant.text, k)),
            timeout_at(deadline, self.lexical.keyword_search(&variant.text, k))
        );

        let mut lists = VariantLists::default();

        match semantic {
            Ok(Ok(ids)) => {
                lists.semantic = to_hits(ids, k, SearchMethod::Semantic, variant.kind);
            }
            Ok(Err(e)) => {
                warn!(
                    "Semantic search failed for {} variant {:?}: {}",
                    variant.kind, variant.text, e
                );
                lists.failures += 1;
            }
            Err(_) => {
                warn!(
                    "Semantic search timed out for {} variant {:?}",
                    variant.kind, variant.text
                );
                lists.failures += 1;
            }
        }

        match lexical {
            Ok(Ok(ids)) => {
                lists.lexical = to_hits(ids, k, SearchMethod::Lexical, variant.kind);
            }
            Ok(Err(e)) => {
                warn!(
                    "Lexical search failed for {} variant {:?}: {}",
                    variant.kind, variant.text, e
                );
                lists.failures += 1;
            }
            Err(_) => {
                warn!(
                    "Lexical search timed out for {} variant {:?}",
                    variant.kind, variant.text
                );
                lists.failures += 1;
            }
        }

        lists
    }
}

/// Assign gapless 1-based ranks to an ordered id list.
fn to_hits(ids: Vec<Ulid>, k: u32, method: SearchMethod, kind: VariantKind) -> Vec<RankedHit> {
    ids.into_iter()
        .take(k as usize)
        .enumerate()
        .map(|(i, record_id)| RankedHit {
            record_id,
            rank: i as u32 + 1,
            method,
            variant_kind: kind,
        })
        .collect()
}
