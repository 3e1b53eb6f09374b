//! Reciprocal Rank Fusion (RRF) for combining search result lists.

use std::collections::HashMap;

use recall_core::{FusedResult, RankedHit};
use ulid::Ulid;

/// Fuse any number of ranked lists into one deduplicated ranking.
///
/// Every hit at 1-based `rank` contributes `1 / (rank + rrf_k)` to a
/// running score keyed by record id, accumulated across all lists. Ranks
/// are fused instead of raw scores because cosine similarity and
/// term-frequency scores live on incompatible scales.
///
/// Ordering is total and deterministic: score descending, then
/// contributing-list count descending, then record id ascending. Fusion is
/// commutative over the input lists, so the result does not depend on the
/// order in which concurrent sub-searches completed.
///
/// Returns the full ranked universe of records seen; truncation is the
/// selector's job. Empty input yields an empty output.
pub fn fuse(lists: &[Vec<RankedHit>], rrf_k: u32) -> Vec<FusedResult> {
    let mut scores: HashMap<Ulid, (f64, u32)> = HashMap::new();

    for list in lists {
        for hit in list {
            let entry = scores.entry(hit.record_id).or_insert((0.0, 0));
            entry.0 += 1.0 / (f64::from(hit.rank) + f64::from(rrf_k));
            entry.1 += 1;
        }
    }

    let mut fused: Vec<FusedResult> = scores
        .into_iter()
        .map(|(record_id, (score, contributing_lists))| FusedResult {
            record_id,
            score,
            contributing_lists,
        })
        .collect();

    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.contributing_lists.cmp(&a.contributing_lists))
            .then_with(|| a.record_id.cmp(&b.record_id))
    });

    fused
}
