//! Reciprocal Rank Fusion, grounded on
//! `original_source/.../graph/search/hybrid_search.py`'s `_rrf_fusion`
//! (spec.md §4.5 step "RRF fusion"): `score = sum(weight / (k + rank))`
//! across every list a result appears in, first-seen metadata wins ties.

use crate::result::SearchResultItem;
use serde_json::Value;
use std::collections::HashMap;

/// Fuse `lists`, each paired with its weight, by reciprocal rank. Ranks
/// are 1-based within each list. A uuid appearing in more than one list
/// accumulates a score contribution from each.
pub fn rrf_fuse(lists: Vec<(Vec<SearchResultItem>, f64)>, k: u32) -> Vec<SearchResultItem> {
    let mut scores: HashMap<String, f64> = HashMap::new();
    let mut items_by_uuid: HashMap<String, SearchResultItem> = HashMap::new();

    for (list, weight) in lists {
        for (rank, item) in list.into_iter().enumerate() {
            let rank = rank as u32 + 1;
            let contribution = weight * (1.0 / (k as f64 + rank as f64));
            *scores.entry(item.uuid.clone()).or_insert(0.0) += contribution;
            items_by_uuid.entry(item.uuid.clone()).or_insert(item);
        }
    }

    let mut fused: Vec<SearchResultItem> = items_by_uuid
        .into_iter()
        .map(|(uuid, mut item)| {
            let score = scores.remove(&uuid).unwrap_or(0.0);
            item.score = score;
            item.metadata
                .insert("rrf_score".to_string(), Value::from(score));
            item
        })
        .collect();

    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ResultKind;

    fn item(uuid: &str) -> SearchResultItem {
        SearchResultItem {
            kind: ResultKind::Entity,
            uuid: uuid.to_string(),
            name: None,
            content: None,
            summary: None,
            score: 0.0,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn items_in_both_lists_score_higher_than_single_list_items() {
        let vector = vec![item("a"), item("b")];
        let keyword = vec![item("a"), item("c")];
        let fused = rrf_fuse(vec![(vector, 0.6), (keyword, 0.4)], 60);
        assert_eq!(fused[0].uuid, "a");
    }

    #[test]
    fn empty_lists_produce_empty_result() {
        let fused: Vec<SearchResultItem> = rrf_fuse(vec![(vec![], 0.6), (vec![], 0.4)], 60);
        assert!(fused.is_empty());
    }
}
