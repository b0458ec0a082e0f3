//! Word frequency over a document body.

use manuscript_index::metadata::strip_front_matter;
use serde::Serialize;
use std::collections::HashMap;
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordCount {
    pub word: String,
    pub count: usize,
}

/// Count case-folded words of at least `min_length` characters, most
/// frequent first (ties alphabetical), keeping the first `top` when given.
///
/// Front matter is not counted. Tokens without a letter (numbers, stray
/// punctuation) are skipped.
pub fn word_frequency(text: &str, min_length: usize, top: Option<usize>) -> Vec<WordCount> {
    let body = strip_front_matter(text);
    let mut counts: HashMap<String, usize> = HashMap::new();
    for word in body.unicode_words() {
        if !word.chars().any(char::is_alphabetic) || word.chars().count() < min_length {
            continue;
        }
        *counts.entry(word.to_lowercase()).or_default() += 1;
    }

    let mut ranked: Vec<WordCount> = counts
        .into_iter()
        .map(|(word, count)| WordCount { word, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
    if let Some(top) = top {
        ranked.truncate(top);
    }
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(counts: &[WordCount]) -> Vec<(&str, usize)> {
        counts.iter().map(|c| (c.word.as_str(), c.count)).collect()
    }

    #[test]
    fn counts_case_folded() {
        let counts = word_frequency("The cat. the CAT sat", 1, None);
        assert_eq!(pairs(&counts), vec![("cat", 2), ("the", 2), ("sat", 1)]);
    }

    #[test]
    fn front_matter_excluded() {
        let text = "---\ntitle: Secret\nid: intro\n---\nOpening words\n";
        let counts = word_frequency(text, 1, None);
        assert_eq!(pairs(&counts), vec![("opening", 1), ("words", 1)]);
    }

    #[test]
    fn min_length_and_top() {
        let text = "a an and andes and an a a";
        let counts = word_frequency(text, 2, Some(2));
        assert_eq!(pairs(&counts), vec![("an", 2), ("and", 2)]);
    }

    #[test]
    fn numbers_skipped_apostrophes_kept() {
        let counts = word_frequency("In 1999 we didn't, 42 times", 1, None);
        let words: Vec<&str> = counts.iter().map(|c| c.word.as_str()).collect();
        assert!(words.contains(&"didn't"), "Got: {words:?}");
        assert!(!words.contains(&"1999"), "Got: {words:?}");
    }

    #[test]
    fn non_ascii_words() {
        let counts = word_frequency("Über über café", 1, None);
        assert_eq!(pairs(&counts), vec![("über", 2), ("café", 1)]);
    }
}
