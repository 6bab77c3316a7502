//! Lucene fulltext-query escaping, grounded on
//! `original_source/.../graph/search/hybrid_search.py`'s
//! `_escape_fulltext_query`.

const SPECIAL_CHARS: &[char] = &[
    '+', '-', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '/',
];

/// Escape backslashes first, then every Lucene special character, so a
/// raw user query can't break out of the fulltext query syntax.
pub fn escape_fulltext_query(query: &str) -> String {
    let mut escaped = query.replace('\\', "\\\\");
    escaped = escaped.replace("&&", "\\&&").replace("||", "\\||");
    for ch in SPECIAL_CHARS {
        escaped = escaped.replace(*ch, &format!("\\{ch}"));
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_parentheses_and_colons() {
        let escaped = escape_fulltext_query("foo(bar):baz");
        assert_eq!(escaped, "foo\\(bar\\)\\:baz");
    }

    #[test]
    fn escapes_backslash_before_other_characters() {
        let escaped = escape_fulltext_query("a\\b");
        assert_eq!(escaped, "a\\\\b");
    }

    #[test]
    fn leaves_plain_words_untouched() {
        assert_eq!(escape_fulltext_query("hello world"), "hello world");
    }
}
