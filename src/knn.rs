//! Nearest-neighbor majority-vote classifier over a precomputed score matrix.
//!
//! Neighbors are the k highest-scoring other songs. Candidate scores are
//! always sorted descending, for similarity and distance matrices alike.

use serde::Serialize;

use crate::error::{ClassifyError, Result};
use crate::models::{PenType, PenTypeSet};
use crate::similarity::SimilarityMatrix;

pub const DEFAULT_K: usize = 2;

/// Prediction for one song.
#[derive(Debug, Clone, Serialize)]
pub struct NeighborPrediction {
    pub song: usize,
    /// Neighbor indices, best first.
    pub neighbors: Vec<usize>,
    pub scores: Vec<f64>,
    /// Every label tied for most votes among the neighbors.
    pub predicted: PenTypeSet,
    /// True label is a member of `predicted`.
    pub correct: bool,
}

/// Indices of the k best-scoring songs other than `song`.
/// Equal scores keep index order.
pub fn nearest_neighbors(matrix: &SimilarityMatrix, song: usize, k: usize) -> Vec<(usize, f64)> {
    let mut candidates: Vec<(usize, f64)> = matrix
        .row(song)
        .iter()
        .copied()
        .enumerate()
        .filter(|(j, _)| *j != song)
        .collect();
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
    candidates.truncate(k);
    candidates
}

/// Mode of the given labels; all tied labels are returned.
pub fn majority_vote(labels: impl IntoIterator<Item = PenType>) -> PenTypeSet {
    let mut counts = [0usize; PenType::COUNT];
    for label in labels {
        counts[label.index()] += 1;
    }
    let best = counts.iter().copied().max().unwrap_or(0);
    if best == 0 {
        return PenTypeSet::empty();
    }
    PenType::ALL
        .into_iter()
        .filter(|p| counts[p.index()] == best)
        .collect()
}

/// Classify every song by its k nearest peers.
pub fn classify(matrix: &SimilarityMatrix, labels: &[PenType], k: usize) -> Result<Vec<NeighborPrediction>> {
    let n = matrix.len();
    if n < k + 1 || k == 0 {
        return Err(ClassifyError::InsufficientData { corpus_size: n, k });
    }
    debug_assert_eq!(labels.len(), n);

    Ok((0..n)
        .map(|i| {
            let neighbors = nearest_neighbors(matrix, i, k);
            let predicted = majority_vote(neighbors.iter().map(|(j, _)| labels[*j]));
            NeighborPrediction {
                song: i,
                neighbors: neighbors.iter().map(|(j, _)| *j).collect(),
                scores: neighbors.iter().map(|(_, s)| *s).collect(),
                predicted,
                correct: predicted.contains(labels[i]),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::EmotionVector;
    use crate::vectorize::TermMatrix;

    use PenType::{FountainPen as B, GlitterGelPen as C, Quill as A};

    #[test]
    fn test_majority_vote_ties_return_all() {
        assert_eq!(majority_vote([A, A, B]), PenTypeSet::single(A));
        let tie = majority_vote([C, A]);
        assert!(tie.contains(A) && tie.contains(C) && !tie.contains(B));
        assert!(majority_vote(std::iter::empty()).is_empty());
    }

    #[test]
    fn test_never_selects_self() {
        // Identical lyrics everywhere: every score ties, including the diagonal
        let docs = ["stars"; 5];
        let matrix = SimilarityMatrix::cosine_terms(&TermMatrix::from_documents(&docs));
        for k in 1..5 {
            for i in 0..5 {
                let neighbors = nearest_neighbors(&matrix, i, k);
                assert_eq!(neighbors.len(), k);
                assert!(neighbors.iter().all(|(j, _)| *j != i));
            }
        }
    }

    #[test]
    fn test_distance_matrix_sorted_descending() {
        let vectors: Vec<EmotionVector> = vec![
            [1, 0, 0, 0, 0, 0, 0, 0],
            [1, 0, 0, 0, 0, 0, 0, 0],
            [0, 1, 0, 0, 0, 0, 0, 0],
            [1, 1, 0, 0, 0, 0, 0, 0],
        ];
        let matrix = SimilarityMatrix::angular_emotions(&vectors);
        let neighbors = nearest_neighbors(&matrix, 0, 2);
        // Largest angular values come first: song 2 (π/2), then song 3 (π/4)
        assert_eq!(neighbors[0].0, 2);
        assert_eq!(neighbors[1].0, 3);
    }

    #[test]
    fn test_insufficient_data() {
        let matrix = SimilarityMatrix::cosine_terms(&TermMatrix::from_documents(&["a", "b"]));
        let err = classify(&matrix, &[A, B], 2).unwrap_err();
        assert!(matches!(err, ClassifyError::InsufficientData { corpus_size: 2, k: 2 }));
    }

    #[test]
    fn test_six_songs_recover_labels() {
        let docs = [
            "quill parchment candle rain",
            "quill parchment candle window",
            "fountain letter window",
            "fountain letter rain",
            "glitter party rain",
            "glitter party candle",
        ];
        let labels = [A, A, B, B, C, C];
        let matrix = SimilarityMatrix::cosine_terms(&TermMatrix::from_documents(&docs));
        let predictions = classify(&matrix, &labels, 2).unwrap();
        assert_eq!(predictions.len(), 6);
        for p in &predictions {
            assert!(p.correct, "song {} predicted {} from {:?}", p.song, p.predicted, p.neighbors);
            assert_eq!(p.neighbors[0], p.song ^ 1);
        }
    }
}
