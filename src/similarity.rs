//! Pairwise similarity over lyric-term and emotion vector spaces.
//!
//! Both matrices are fully materialized N×N. Zero-vector comparisons never
//! produce NaN: cosine yields 0, angular distance yields 0.

use serde::Serialize;

use crate::annotate::EmotionVector;
use crate::vectorize::{TermMatrix, TermRow};

/// What the matrix entries mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScoreKind {
    /// Cosine similarity in [0, 1] for count vectors.
    Cosine,
    /// Arc-cosine of cosine similarity, in [0, π].
    Angular,
}

/// Dense row-major N×N score matrix, symmetric by construction.
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
    n: usize,
    kind: ScoreKind,
    values: Vec<f64>,
}

impl SimilarityMatrix {
    /// Compute every pair once and mirror it.
    fn from_pairs(n: usize, kind: ScoreKind, mut score: impl FnMut(usize, usize) -> f64) -> Self {
        let mut values = vec![0.0; n * n];
        for i in 0..n {
            for j in i..n {
                let s = score(i, j);
                values[i * n + j] = s;
                values[j * n + i] = s;
            }
        }
        Self { n, kind, values }
    }

    /// Cosine similarity between every pair of term-matrix rows.
    pub fn cosine_terms(terms: &TermMatrix) -> Self {
        let rows = terms.rows();
        let norms: Vec<f64> = rows.iter().map(|r| sparse_norm(r)).collect();
        Self::from_pairs(rows.len(), ScoreKind::Cosine, |i, j| {
            cosine_from_parts(sparse_dot(&rows[i], &rows[j]), norms[i], norms[j])
        })
    }

    /// Angular distance between every pair of emotion vectors.
    pub fn angular_emotions(vectors: &[EmotionVector]) -> Self {
        let dense: Vec<Vec<f64>> = vectors
            .iter()
            .map(|v| v.iter().map(|&c| c as f64).collect())
            .collect();
        Self::from_pairs(dense.len(), ScoreKind::Angular, |i, j| {
            angular_distance(&dense[i], &dense[j])
        })
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn kind(&self) -> ScoreKind {
        self.kind
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.n..(i + 1) * self.n]
    }
}

// ============================================================================
// Vector Metrics
// ============================================================================

fn sparse_norm(row: &TermRow) -> f64 {
    row.iter()
        .map(|(_, c)| (*c as f64) * (*c as f64))
        .sum::<f64>()
        .sqrt()
}

/// Dot product of two column-sorted sparse rows (merge join).
fn sparse_dot(a: &TermRow, b: &TermRow) -> f64 {
    let (mut i, mut j) = (0, 0);
    let mut dot = 0.0;
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dot += a[i].1 as f64 * b[j].1 as f64;
                i += 1;
                j += 1;
            }
        }
    }
    dot
}

/// Cosine from dot product and norms; 0 when either norm is 0.
fn cosine_from_parts(dot: f64, norm_a: f64, norm_b: f64) -> f64 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// The raw cosine ratio, NaN when either vector is all-zero.
fn cosine_ratio(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    dot / (norm_a * norm_b)
}

/// Cosine similarity of dense vectors; 0 when either vector is all-zero.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let ratio = cosine_ratio(a, b);
    if ratio.is_nan() {
        0.0
    } else {
        ratio.clamp(-1.0, 1.0)
    }
}

/// `arccos` of the cosine ratio. An undefined ratio maps to distance 0.
pub fn angular_distance(a: &[f64], b: &[f64]) -> f64 {
    let ratio = cosine_ratio(a, b);
    if ratio.is_nan() {
        return 0.0;
    }
    ratio.clamp(-1.0, 1.0).acos()
}
