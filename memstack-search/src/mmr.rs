//! Maximal Marginal Relevance re-ranking: balance relevance against
//! diversity among the already-fused results, grounded on
//! `original_source/.../graph/search/hybrid_search.py`'s `mmr_rerank`
//! call (spec.md §4.5 step "MMR diversity re-ranking").
//!
//! No embedding model lives here (spec.md §1 Non-goals: no vector-math
//! library of its own) — similarity between two results is a token
//! Jaccard overlap over their comparison text, which is enough to tell
//! near-duplicate hits apart without calling back into an embedder.

use crate::result::SearchResultItem;
use std::collections::HashSet;

/// Re-rank `items` (already sorted by relevance) greedily: repeatedly
/// pick the item maximizing `lambda * relevance - (1 - lambda) *
/// max_similarity_to_already_picked`, stopping once every item has been
/// placed.
pub fn mmr_rerank(items: Vec<SearchResultItem>, lambda: f64) -> Vec<SearchResultItem> {
    if items.len() <= 1 {
        return items;
    }

    let max_score = items
        .iter()
        .map(|i| i.score)
        .fold(f64::MIN, f64::max)
        .max(1e-9);

    let token_sets: Vec<HashSet<String>> = items.iter().map(|i| tokenize(i.comparison_text())).collect();

    let mut remaining: Vec<usize> = (0..items.len()).collect();
    let mut picked_order: Vec<usize> = Vec::with_capacity(items.len());

    while !remaining.is_empty() {
        let mut best_idx = 0;
        let mut best_mmr = f64::MIN;
        for (pos, &candidate) in remaining.iter().enumerate() {
            let relevance = items[candidate].score / max_score;
            let max_similarity = picked_order
                .iter()
                .map(|&picked| jaccard(&token_sets[candidate], &token_sets[picked]))
                .fold(0.0_f64, f64::max);
            let mmr = lambda * relevance - (1.0 - lambda) * max_similarity;
            if mmr > best_mmr {
                best_mmr = mmr;
                best_idx = pos;
            }
        }
        picked_order.push(remaining.remove(best_idx));
    }

    let mut items: Vec<Option<SearchResultItem>> = items.into_iter().map(Some).collect();
    picked_order
        .into_iter()
        .map(|idx| items[idx].take().expect("each index visited exactly once"))
        .collect()
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn item(uuid: &str, text: &str, score: f64) -> SearchResultItem {
        SearchResultItem {
            kind: crate::result::ResultKind::Entity,
            uuid: uuid.to_string(),
            name: Some(text.to_string()),
            content: None,
            summary: Some(text.to_string()),
            score,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn single_item_passes_through_unchanged() {
        let items = vec![item("1", "Ada Lovelace", 1.0)];
        let reranked = mmr_rerank(items.clone(), 0.7);
        assert_eq!(reranked.len(), 1);
        assert_eq!(reranked[0].uuid, items[0].uuid);
    }

    #[test]
    fn demotes_near_duplicate_in_favor_of_diverse_result() {
        let items = vec![
            item("1", "the quick brown fox", 1.0),
            item("2", "the quick brown fox jumps", 0.95),
            item("3", "totally unrelated content here", 0.5),
        ];
        let reranked = mmr_rerank(items, 0.5);
        assert_eq!(reranked[0].uuid, "1");
        assert_eq!(reranked[1].uuid, "3");
    }
}
