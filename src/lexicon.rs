//! Word-level sentiment and emotion lexicons.
//!
//! Both lexicons are plain TSV: `word<TAB>weight` for sentiment and
//! `word<TAB>category` for emotions. Lines starting with `#` are comments.
//! A compact built-in copy of each is embedded from `data/`.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::fmt;
use std::path::Path;

use crate::error::{ClassifyError, Result};

static BUILTIN_SENTIMENT: &str = include_str!("../data/sentiment.tsv");
static BUILTIN_EMOTIONS: &str = include_str!("../data/emotions.tsv");

static DEFAULT_SENTIMENT: Lazy<SentimentLexicon> = Lazy::new(|| {
    SentimentLexicon::parse(BUILTIN_SENTIMENT, "builtin sentiment").expect("built-in sentiment lexicon is well-formed")
});

static DEFAULT_EMOTIONS: Lazy<EmotionLexicon> = Lazy::new(|| {
    EmotionLexicon::parse(BUILTIN_EMOTIONS, "builtin emotions").expect("built-in emotion lexicon is well-formed")
});

// ============================================================================
// Emotion Categories
// ============================================================================

/// The eight discrete emotion categories, in vector-column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Emotion {
    Anger,
    Anticipation,
    Disgust,
    Fear,
    Joy,
    Sadness,
    Surprise,
    Trust,
}

impl Emotion {
    pub const ALL: [Emotion; 8] = [
        Emotion::Anger,
        Emotion::Anticipation,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Joy,
        Emotion::Sadness,
        Emotion::Surprise,
        Emotion::Trust,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Emotion::Anger => "anger",
            Emotion::Anticipation => "anticipation",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Joy => "joy",
            Emotion::Sadness => "sadness",
            Emotion::Surprise => "surprise",
            Emotion::Trust => "trust",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const POSITIVE_BIT: u16 = 1 << 8;
const NEGATIVE_BIT: u16 = 1 << 9;

/// Bit set over the 8 emotions plus positive/negative valence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmotionTags(u16);

impl EmotionTags {
    pub fn has(self, emotion: Emotion) -> bool {
        self.0 & (1 << emotion as u16) != 0
    }

    pub fn is_positive(self) -> bool {
        self.0 & POSITIVE_BIT != 0
    }

    pub fn is_negative(self) -> bool {
        self.0 & NEGATIVE_BIT != 0
    }

    fn tag(&mut self, category: &str) -> bool {
        let bit = match category {
            "positive" => POSITIVE_BIT,
            "negative" => NEGATIVE_BIT,
            other => match Emotion::ALL.iter().find(|e| e.name() == other) {
                Some(e) => 1 << *e as u16,
                None => return false,
            },
        };
        self.0 |= bit;
        true
    }
}

// ============================================================================
// Lexicons
// ============================================================================

/// Word polarity lexicon. Positive weights mean positive sentiment.
#[derive(Debug, Clone, Default)]
pub struct SentimentLexicon {
    weights: FxHashMap<String, f64>,
}

impl SentimentLexicon {
    pub fn builtin() -> &'static SentimentLexicon {
        &DEFAULT_SENTIMENT
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = read_lexicon(path)?;
        Self::parse(&text, &path.display().to_string())
    }

    pub fn parse(text: &str, source_name: &str) -> Result<Self> {
        let mut weights = FxHashMap::default();
        for (line_no, word, value) in entries(text) {
            let weight: f64 = value.parse().map_err(|_| ClassifyError::Lexicon {
                source_name: source_name.to_string(),
                line: line_no,
                message: format!("weight '{}' is not a number", value),
            })?;
            weights.insert(word.to_lowercase(), weight);
        }
        Ok(Self { weights })
    }

    pub fn weight(&self, word: &str) -> Option<f64> {
        self.weights.get(word).copied()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Word to emotion-category lexicon.
#[derive(Debug, Clone, Default)]
pub struct EmotionLexicon {
    tags: FxHashMap<String, EmotionTags>,
}

impl EmotionLexicon {
    pub fn builtin() -> &'static EmotionLexicon {
        &DEFAULT_EMOTIONS
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = read_lexicon(path)?;
        Self::parse(&text, &path.display().to_string())
    }

    pub fn parse(text: &str, source_name: &str) -> Result<Self> {
        let mut tags: FxHashMap<String, EmotionTags> = FxHashMap::default();
        for (line_no, word, category) in entries(text) {
            let entry = tags.entry(word.to_lowercase()).or_default();
            if !entry.tag(&category.to_lowercase()) {
                return Err(ClassifyError::Lexicon {
                    source_name: source_name.to_string(),
                    line: line_no,
                    message: format!("unknown emotion category '{}'", category),
                });
            }
        }
        Ok(Self { tags })
    }

    pub fn tags(&self, word: &str) -> EmotionTags {
        self.tags.get(word).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Lexicons used by the annotator, borrowed for the length of a run.
#[derive(Debug, Clone, Copy)]
pub struct Lexicons<'a> {
    pub sentiment: &'a SentimentLexicon,
    pub emotions: &'a EmotionLexicon,
}

impl Default for Lexicons<'static> {
    fn default() -> Self {
        Self {
            sentiment: SentimentLexicon::builtin(),
            emotions: EmotionLexicon::builtin(),
        }
    }
}

fn read_lexicon(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| ClassifyError::Lexicon {
        source_name: path.display().to_string(),
        line: 0,
        message: e.to_string(),
    })
}

/// Yields (1-based line number, first column, second column) for data lines.
/// Lines without a second column are skipped.
fn entries(text: &str) -> impl Iterator<Item = (usize, &str, &str)> {
    text.lines().enumerate().filter_map(|(idx, line)| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let mut cols = line.split('\t');
        let word = cols.next()?.trim();
        let value = cols.next()?.trim();
        Some((idx + 1, word, value))
    })
}
