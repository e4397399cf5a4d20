//! Bag-of-stemmed-words vectorizer for lyrics.
//!
//! Lyrics are cleaned, split into words, filtered against a fixed English
//! stopword list, and reduced to Snowball English stems. The resulting term
//! matrix shares one vocabulary across the corpus.

use once_cell::sync::Lazy;
use rust_stemmers::{Algorithm, Stemmer};
use rustc_hash::{FxHashMap, FxHashSet};
use unicode_segmentation::UnicodeSegmentation;

use crate::models::Corpus;
use crate::normalize::clean_lyrics;

/// English stopwords, including the contracted forms found in lyrics.
pub static STOPWORDS: Lazy<FxHashSet<&'static str>> = Lazy::new(|| {
    [
        "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
        "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers", "herself",
        "it", "its", "itself", "they", "them", "their", "theirs", "themselves", "what", "which",
        "who", "whom", "this", "that", "these", "those", "am", "is", "are", "was", "were", "be",
        "been", "being", "have", "has", "had", "having", "do", "does", "did", "doing", "would",
        "should", "could", "ought", "i'm", "you're", "he's", "she's", "it's", "we're", "they're",
        "i've", "you've", "we've", "they've", "i'd", "you'd", "he'd", "she'd", "we'd", "they'd",
        "i'll", "you'll", "he'll", "she'll", "we'll", "they'll", "isn't", "aren't", "wasn't",
        "weren't", "hasn't", "haven't", "hadn't", "doesn't", "don't", "didn't", "won't",
        "wouldn't", "shan't", "shouldn't", "can't", "cannot", "couldn't", "mustn't", "let's",
        "that's", "who's", "what's", "here's", "there's", "when's", "where's", "why's", "how's",
        "a", "an", "the", "and", "but", "if", "or", "because", "as", "until", "while", "of", "at",
        "by", "for", "with", "about", "against", "between", "into", "through", "during",
        "before", "after", "above", "below", "to", "from", "up", "down", "in", "out", "on", "off",
        "over", "under", "again", "further", "then", "once", "here", "there", "when", "where",
        "why", "how", "all", "any", "both", "each", "few", "more", "most", "other", "some",
        "such", "no", "nor", "not", "only", "own", "same", "so", "than", "too", "very",
    ]
    .into_iter()
    .collect()
});

// ============================================================================
// Tokenization
// ============================================================================

/// Lowercased word tokens of raw lyric text. Punctuation-only segments are dropped.
pub fn word_tokens(lyrics: &str) -> Vec<String> {
    clean_lyrics(lyrics)
        .unicode_words()
        .map(|w| w.to_lowercase())
        .collect()
}

/// Reduces words to stems, dropping stopwords first.
pub struct StemTokenizer {
    stemmer: Stemmer,
}

impl StemTokenizer {
    pub fn new() -> Self {
        Self {
            stemmer: Stemmer::create(Algorithm::English),
        }
    }

    pub fn stems(&self, lyrics: &str) -> Vec<String> {
        word_tokens(lyrics)
            .into_iter()
            .filter(|w| !STOPWORDS.contains(w.as_str()))
            .filter_map(|w| {
                // "ain't" and "ain’t" collapse to "aint" before stemming
                let bare: String = w.chars().filter(|c| c.is_alphanumeric()).collect();
                if bare.is_empty() {
                    None
                } else {
                    Some(self.stemmer.stem(&bare).into_owned())
                }
            })
            .collect()
    }
}

impl Default for StemTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Term Matrix
// ============================================================================

/// Sparse row of (column, count), sorted by column.
pub type TermRow = Vec<(usize, u32)>;

/// Songs × vocabulary count matrix. Vocabulary columns are sorted by stem.
#[derive(Debug, Clone, Default)]
pub struct TermMatrix {
    vocabulary: Vec<String>,
    columns: FxHashMap<String, usize>,
    rows: Vec<TermRow>,
}

impl TermMatrix {
    pub fn build(corpus: &Corpus) -> Self {
        let docs: Vec<&str> = corpus.songs().iter().map(|s| s.lyrics.as_str()).collect();
        Self::from_documents(&docs)
    }

    pub fn from_documents(docs: &[&str]) -> Self {
        let tokenizer = StemTokenizer::new();
        let stemmed: Vec<Vec<String>> = docs.iter().map(|d| tokenizer.stems(d)).collect();

        let mut vocabulary: Vec<String> = stemmed
            .iter()
            .flatten()
            .cloned()
            .collect::<FxHashSet<String>>()
            .into_iter()
            .collect();
        vocabulary.sort();

        let columns: FxHashMap<String, usize> = vocabulary
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i))
            .collect();

        let rows = stemmed
            .iter()
            .map(|stems| {
                let mut counts: FxHashMap<usize, u32> = FxHashMap::default();
                for stem in stems {
                    *counts.entry(columns[stem]).or_insert(0) += 1;
                }
                let mut row: TermRow = counts.into_iter().collect();
                row.sort_unstable_by_key(|(col, _)| *col);
                row
            })
            .collect();

        Self {
            vocabulary,
            columns,
            rows,
        }
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn column(&self, term: &str) -> Option<usize> {
        self.columns.get(term).copied()
    }

    pub fn rows(&self) -> &[TermRow] {
        &self.rows
    }

    pub fn row(&self, idx: usize) -> &TermRow {
        &self.rows[idx]
    }

    pub fn count(&self, row: usize, term: &str) -> u32 {
        let Some(col) = self.column(term) else {
            return 0;
        };
        self.rows[row]
            .binary_search_by_key(&col, |(c, _)| *c)
            .map(|pos| self.rows[row][pos].1)
            .unwrap_or(0)
    }

    pub fn is_zero_row(&self, row: usize) -> bool {
        self.rows[row].is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
