//! Query expansion: drop stopwords before a query goes to fulltext
//! search, grounded on
//! `original_source/.../graph/search/hybrid_search.py`'s
//! `extract_keywords` call (spec.md §4.5 step "Query expansion").

use once_cell::sync::Lazy;
use std::collections::HashSet;

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is",
        "it", "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there",
        "these", "they", "this", "to", "was", "will", "with", "what", "which", "who", "whom",
        "how", "do", "does", "did", "can", "could", "should", "would",
    ]
    .into_iter()
    .collect()
});

/// Remove stopwords, returning the remaining keywords in order. An empty
/// result (e.g. the query was entirely stopwords) leaves the caller free
/// to fall back to the original query text.
pub fn extract_keywords(query: &str) -> Vec<&str> {
    query
        .split_whitespace()
        .filter(|word| !STOPWORDS.contains(&word.to_lowercase().as_str()))
        .collect()
}

/// Expand a query for fulltext search: stopword-filtered keywords joined
/// back with spaces, or the original query if nothing survived.
pub fn expand_query(query: &str) -> String {
    let keywords = extract_keywords(query);
    if keywords.is_empty() {
        query.to_string()
    } else {
        keywords.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_stopwords() {
        let expanded = expand_query("what is the best way to learn rust");
        assert_eq!(expanded, "best way learn rust");
    }

    #[test]
    fn falls_back_to_original_when_all_stopwords() {
        let expanded = expand_query("the of and");
        assert_eq!(expanded, "the of and");
    }
}
