//! Reciprocal Rank Fusion

use std::collections::BTreeMap;

/// Fused score per id: `sum over lists of 1 / (k + rank)`, rank 1-based
///
/// Ids missing from a list contribute nothing for that list.
pub fn reciprocal_rank_fusion(lists: &[Vec<String>], k: f64) -> BTreeMap<String, f64> {
    let mut fused: BTreeMap<String, f64> = BTreeMap::new();
    for list in lists {
        for (idx, id) in list.iter().enumerate() {
            let rank = (idx + 1) as f64;
            *fused.entry(id.clone()).or_insert(0.0) += 1.0 / (k + rank);
        }
    }
    fused
}
