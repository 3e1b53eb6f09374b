//! Final selection over the fused ranking.

use std::collections::HashSet;

use recall_core::FusedResult;
use ulid::Ulid;

/// Truncate the fused ranking to `limit`, preserving order.
///
/// Fusion already guarantees unique record ids, so this stage is the
/// enforcement point for the output-size contract and the place for final
/// post-filters: ids in `exclude` (records the caller has already seen)
/// are dropped before truncation.
pub fn select(
    fused: Vec<FusedResult>,
    limit: usize,
    exclude: Option<&HashSet<Ulid>>,
) -> Vec<FusedResult> {
    let mut selected: Vec<FusedResult> = match exclude {
        Some(seen) => fused
            .into_iter()
            .filter(|r| !seen.contains(&r.record_id))
            .collect(),
        None => fused,
    };
    selected.truncate(limit);
    selected
}
