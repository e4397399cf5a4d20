//! Lexical diversity, sentiment, and emotion annotations per song.
//!
//! All annotations are pure functions of lyric text (and, for lexical
//! diversity, the song's term-matrix row).

use serde::Serialize;

use crate::lexicon::{Emotion, Lexicons};
use crate::vectorize::{word_tokens, TermRow};

pub const EMOTION_DIMS: usize = 8;

/// Per-emotion token counts, in `Emotion::ALL` order.
pub type EmotionVector = [u32; EMOTION_DIMS];

/// Derived lyric features for one song.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LyricAnnotation {
    pub lexical_diversity: f64,
    pub sentiment: f64,
    pub emotions: EmotionVector,
    pub positive: u32,
    pub negative: u32,
}

/// Type-token ratio over stems: distinct stems / total stem occurrences, 0 for an empty row.
pub fn lexical_diversity(row: &TermRow) -> f64 {
    let total: u32 = row.iter().map(|(_, count)| *count).sum();
    if total == 0 {
        return 0.0;
    }
    row.len() as f64 / total as f64
}

/// Sum of polarity weights over every unstemmed token, rounded to 2 decimals.
pub fn sentiment_score(tokens: &[String], lexicons: &Lexicons<'_>) -> f64 {
    let raw: f64 = tokens
        .iter()
        .filter_map(|t| lexicons.sentiment.weight(t))
        .sum();
    round2(raw)
}

fn round2(x: f64) -> f64 {
    let rounded = (x * 100.0).round() / 100.0;
    // Avoid reporting -0.0
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Emotion counts plus (positive, negative) valence counts.
pub fn emotion_counts(tokens: &[String], lexicons: &Lexicons<'_>) -> (EmotionVector, u32, u32) {
    let mut emotions = [0u32; EMOTION_DIMS];
    let mut positive = 0;
    let mut negative = 0;
    for token in tokens {
        let tags = lexicons.emotions.tags(token);
        for (slot, emotion) in emotions.iter_mut().zip(Emotion::ALL) {
            if tags.has(emotion) {
                *slot += 1;
            }
        }
        if tags.is_positive() {
            positive += 1;
        }
        if tags.is_negative() {
            negative += 1;
        }
    }
    (emotions, positive, negative)
}

pub fn annotate(lyrics: &str, row: &TermRow, lexicons: &Lexicons<'_>) -> LyricAnnotation {
    let tokens = word_tokens(lyrics);
    let (emotions, positive, negative) = emotion_counts(&tokens, lexicons);
    LyricAnnotation {
        lexical_diversity: lexical_diversity(row),
        sentiment: sentiment_score(&tokens, lexicons),
        emotions,
        positive,
        negative,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::{EmotionLexicon, SentimentLexicon};
    use crate::vectorize::TermMatrix;

    fn test_lexicons() -> (SentimentLexicon, EmotionLexicon) {
        let sentiment = SentimentLexicon::parse("love\t0.75\nhate\t-0.5\nsmile\t0.333\n", "test").unwrap();
        let emotions = EmotionLexicon::parse(
            "love\tjoy\nlove\tpositive\nhate\tanger\nhate\tdisgust\nhate\tnegative\n",
            "test",
        )
        .unwrap();
        (sentiment, emotions)
    }

    #[test]
    fn test_lexical_diversity() {
        let matrix = TermMatrix::from_documents(&["rain rain stars", ""]);
        assert!((lexical_diversity(matrix.row(0)) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(lexical_diversity(matrix.row(1)), 0.0);
    }

    #[test]
    fn test_sentiment_sums_and_rounds() {
        let (sentiment, emotions) = test_lexicons();
        let lex = Lexicons {
            sentiment: &sentiment,
            emotions: &emotions,
        };
        let tokens = word_tokens("Love, love, hate and a smile");
        // 0.75 + 0.75 - 0.5 + 0.333 = 1.333
        assert_eq!(sentiment_score(&tokens, &lex), 1.33);
    }

    #[test]
    fn test_emotion_counts() {
        let (sentiment, emotions) = test_lexicons();
        let lex = Lexicons {
            sentiment: &sentiment,
            emotions: &emotions,
        };
        let tokens = word_tokens("love hate hate");
        let (vector, positive, negative) = emotion_counts(&tokens, &lex);
        assert_eq!(vector, [2, 0, 2, 0, 1, 0, 0, 0]);
        assert_eq!(positive, 1);
        assert_eq!(negative, 2);
    }

    #[test]
    fn test_empty_lyrics_annotation() {
        let matrix = TermMatrix::from_documents(&[""]);
        let annotation = annotate("", matrix.row(0), &Lexicons::default());
        assert_eq!(annotation.lexical_diversity, 0.0);
        assert_eq!(annotation.sentiment, 0.0);
        assert_eq!(annotation.emotions, [0; EMOTION_DIMS]);
    }
}
