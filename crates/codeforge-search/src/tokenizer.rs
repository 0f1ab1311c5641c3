//! Tokenization shared by the builder (token sets computed once, at
//! build time) and the query engine (query text, at query time).
//!
//! Lower-cased alphanumeric/underscore runs, no stemming, no stopword
//! removal, no minimum-length filter — symbol tokens as short as a
//! single letter still matter for exact-match scoring.

use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

/// Split `text` into lower-cased alphanumeric/underscore tokens.
///
/// Word-bound splitting goes through `unicode_segmentation` first (so
/// multi-byte scripts tokenize on their own word boundaries rather than
/// a naive ASCII-oriented split), then each word-bound segment is
/// further split wherever it contains a character that isn't
/// alphanumeric or `_`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words()
        .flat_map(|word| word.split(|c: char| !(c.is_alphanumeric() || c == '_')))
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

/// Tokenize into a deduplicated set, for inverted-index membership tests
/// where order doesn't matter.
pub fn tokenize_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_punctuation_and_lowercases() {
        assert_eq!(tokenize("Hello, World!"), vec!["hello", "world"]);
    }

    #[test]
    fn keeps_underscore_identifiers_whole() {
        assert_eq!(tokenize("fn parse_args()"), vec!["fn", "parse_args"]);
    }

    #[test]
    fn keeps_single_character_tokens() {
        assert_eq!(tokenize("let x = 1"), vec!["let", "x", "1"]);
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("!!!").is_empty());
    }
}
