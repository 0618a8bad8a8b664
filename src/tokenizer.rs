//! Word tokenizer shared by indexing, search, and boosting.

use regex::Regex;
use std::sync::LazyLock;

static WORD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+").expect("word pattern is valid"));

/// Lowercase `text` and extract its word tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    WORD_REGEX
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_splits_on_punctuation() {
        assert_eq!(
            tokenize("Object-Oriented Programming, in C++!"),
            vec!["object", "oriented", "programming", "in", "c"]
        );
    }

    #[test]
    fn test_tokenize_keeps_digits_and_underscores() {
        assert_eq!(tokenize("BM25 snake_case x2"), vec!["bm25", "snake_case", "x2"]);
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("  ...  ").is_empty());
    }
}
