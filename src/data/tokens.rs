use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value as JsonValue;

// ---------------------------------------------------------------------------
// Whitespace tokenization
// ---------------------------------------------------------------------------

pub fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

/// Every row's words, concatenated in row order.
pub fn flatten_tokens<'a>(texts: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    texts.into_iter().flat_map(str::split_whitespace).collect()
}

// ---------------------------------------------------------------------------
// Corpus statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenStats {
    pub documents: usize,
    pub total_tokens: usize,
    pub unique_tokens: usize,
    pub min_length: usize,
    pub max_length: usize,
    pub mean_length: f64,
    /// Most frequent words, highest count first.
    pub top_tokens: Vec<(String, usize)>,
}

impl TokenStats {
    pub fn from_texts<'a>(texts: impl IntoIterator<Item = &'a str>, top_n: usize) -> Self {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        let mut documents = 0usize;
        let mut total_tokens = 0usize;
        let mut min_length = usize::MAX;
        let mut max_length = 0usize;

        for text in texts {
            let words = tokenize(text);
            documents += 1;
            total_tokens += words.len();
            min_length = min_length.min(words.len());
            max_length = max_length.max(words.len());
            for w in words {
                *counts.entry(w).or_default() += 1;
            }
        }

        // BTreeMap iteration is alphabetical, and the sort is stable, so
        // equal counts stay alphabetical.
        let mut ranked: Vec<(&str, usize)> = counts.iter().map(|(w, c)| (*w, *c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        let top_tokens = ranked
            .into_iter()
            .take(top_n)
            .map(|(w, c)| (w.to_string(), c))
            .collect();

        TokenStats {
            documents,
            total_tokens,
            unique_tokens: counts.len(),
            min_length: if documents == 0 { 0 } else { min_length },
            max_length,
            mean_length: if documents == 0 {
                0.0
            } else {
                total_tokens as f64 / documents as f64
            },
            top_tokens,
        }
    }
}

// ---------------------------------------------------------------------------
// Saved word tokenizer
// ---------------------------------------------------------------------------

/// Word index of a tokenizer saved with Keras' `Tokenizer.to_json()`.
///
/// The file nests the index as `config.word_index`, which Keras stores as a
/// JSON-encoded string; a plain object is accepted too.
#[derive(Debug, Clone, PartialEq)]
pub struct WordTokenizer {
    pub word_index: BTreeMap<String, u64>,
}

impl WordTokenizer {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading tokenizer {}", path.display()))?;
        let root: JsonValue = serde_json::from_str(&text)
            .with_context(|| format!("parsing tokenizer {}", path.display()))?;

        let raw = root
            .get("config")
            .and_then(|c| c.get("word_index"))
            .or_else(|| root.get("word_index"))
            .with_context(|| format!("tokenizer {} has no word_index", path.display()))?;

        let word_index = match raw {
            JsonValue::String(encoded) => {
                serde_json::from_str(encoded).context("decoding nested word_index")?
            }
            other => serde_json::from_value(other.clone()).context("decoding word_index")?,
        };
        Ok(WordTokenizer { word_index })
    }

    /// Index size plus the padding id 0.
    pub fn vocabulary_size(&self) -> usize {
        self.word_index.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattened_length_is_sum_of_row_counts() {
        let rows = [
            "the heart size is normal",
            "  no   focal consolidation\n",
            "",
            "clear",
        ];
        let per_row: usize = rows.iter().map(|r| tokenize(r).len()).sum();
        let flat = flatten_tokens(rows.iter().copied());
        assert_eq!(flat.len(), per_row);
        assert_eq!(flat.len(), 9);
        assert_eq!(flat[5], "no");
    }

    #[test]
    fn stats_rank_by_count_then_alphabetically() {
        let stats = TokenStats::from_texts(["b a c", "a b", "a"], 2);
        assert_eq!(stats.documents, 3);
        assert_eq!(stats.total_tokens, 6);
        assert_eq!(stats.unique_tokens, 3);
        assert_eq!(stats.min_length, 1);
        assert_eq!(stats.max_length, 3);
        assert!((stats.mean_length - 2.0).abs() < 1e-12);
        assert_eq!(
            stats.top_tokens,
            vec![("a".to_string(), 3), ("b".to_string(), 2)]
        );
    }

    #[test]
    fn stats_of_nothing_are_zero() {
        let stats = TokenStats::from_texts(std::iter::empty(), 5);
        assert_eq!(stats.documents, 0);
        assert_eq!(stats.min_length, 0);
        assert_eq!(stats.mean_length, 0.0);
        assert!(stats.top_tokens.is_empty());
    }

    #[test]
    fn keras_tokenizer_with_encoded_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("word_tokenizer.json");
        std::fs::write(
            &path,
            r#"{"class_name": "Tokenizer", "config": {"num_words": null, "word_index": "{\"the\": 1, \"heart\": 2, \"is\": 3}"}}"#,
        )
        .unwrap();

        let tok = WordTokenizer::load(&path).unwrap();
        assert_eq!(tok.word_index["heart"], 2);
        assert_eq!(tok.vocabulary_size(), 4);
    }

    #[test]
    fn plain_object_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("word_tokenizer.json");
        std::fs::write(&path, r#"{"word_index": {"lungs": 1}}"#).unwrap();

        assert_eq!(WordTokenizer::load(&path).unwrap().vocabulary_size(), 2);
    }
}
