//! Error rates, confusion matrices, and the majority-class baseline.

use serde::Serialize;
use std::fmt;

use crate::models::{PenType, PenTypeSet};

/// Category × category counts. Rows are predicted labels, columns are true labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ConfusionMatrix {
    pub cells: [[usize; PenType::COUNT]; PenType::COUNT],
}

impl ConfusionMatrix {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (PenType, PenType)>) -> Self {
        let mut matrix = Self::default();
        for (predicted, truth) in pairs {
            matrix.cells[predicted.index()][truth.index()] += 1;
        }
        matrix
    }

    pub fn get(&self, predicted: PenType, truth: PenType) -> usize {
        self.cells[predicted.index()][truth.index()]
    }

    pub fn row_total(&self, predicted: PenType) -> usize {
        self.cells[predicted.index()].iter().sum()
    }

    pub fn column_total(&self, truth: PenType) -> usize {
        self.cells.iter().map(|row| row[truth.index()]).sum()
    }

    pub fn total(&self) -> usize {
        self.cells.iter().flatten().sum()
    }

    pub fn diagonal(&self) -> usize {
        (0..PenType::COUNT).map(|i| self.cells[i][i]).sum()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>18}", "predicted \\ true")?;
        for truth in PenType::ALL {
            write!(f, "{:>17}", truth.name())?;
        }
        writeln!(f)?;
        for predicted in PenType::ALL {
            write!(f, "{:>18}", predicted.name())?;
            for truth in PenType::ALL {
                write!(f, "{:>17}", self.get(predicted, truth))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Scored classifier output.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub correct: usize,
    pub total: usize,
    pub error_rate: f64,
    pub confusion: ConfusionMatrix,
}

/// Error rate `(total - correct) / total`, 0 for an empty input.
pub fn error_rate(correct: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (total - correct) as f64 / total as f64
    }
}

/// Confusion-matrix row for a label set: the true label when it is a member,
/// otherwise the set's first label in category order.
pub fn resolve_label_set(predicted: PenTypeSet, truth: PenType) -> Option<PenType> {
    if predicted.contains(truth) {
        Some(truth)
    } else {
        predicted.first()
    }
}

/// Evaluate set-valued predictions; correct means the true label is a member.
pub fn evaluate_sets(predictions: &[PenTypeSet], truths: &[PenType]) -> Evaluation {
    let total = predictions.len().min(truths.len());
    let correct = predictions
        .iter()
        .zip(truths)
        .filter(|(p, t)| p.contains(**t))
        .count();
    let confusion = ConfusionMatrix::from_pairs(
        predictions
            .iter()
            .zip(truths)
            .filter_map(|(p, t)| resolve_label_set(*p, *t).map(|label| (label, *t))),
    );
    Evaluation {
        correct,
        total,
        error_rate: error_rate(correct, total),
        confusion,
    }
}

/// Evaluate hard predictions by exact equality.
pub fn evaluate_labels(predictions: &[PenType], truths: &[PenType]) -> Evaluation {
    let pairs: Vec<(PenType, PenType)> = predictions.iter().copied().zip(truths.iter().copied()).collect();
    let correct = pairs.iter().filter(|(p, t)| p == t).count();
    Evaluation {
        correct,
        total: pairs.len(),
        error_rate: error_rate(correct, pairs.len()),
        confusion: ConfusionMatrix::from_pairs(pairs),
    }
}

/// Most frequent label; the first category wins ties.
pub fn majority_label(truths: &[PenType]) -> Option<PenType> {
    let mut counts = [0usize; PenType::COUNT];
    for t in truths {
        counts[t.index()] += 1;
    }
    let best = *counts.iter().max()?;
    if best == 0 {
        return None;
    }
    PenType::ALL.into_iter().find(|p| counts[p.index()] == best)
}

/// Prior error: fraction of songs whose label is not the majority label.
pub fn baseline_error(truths: &[PenType]) -> f64 {
    match majority_label(truths) {
        None => 0.0,
        Some(majority) => {
            let correct = truths.iter().filter(|t| **t == majority).count();
            error_rate(correct, truths.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use PenType::{FountainPen as B, GlitterGelPen as C, Quill as A};

    #[test]
    fn test_confusion_totals_sum_to_n() {
        let predictions = [A, A, B, C, C, B, A];
        let truths = [A, B, B, C, A, B, C];
        let eval = evaluate_labels(&predictions, &truths);
        let m = eval.confusion;
        assert_eq!(m.total(), 7);
        let row_sum: usize = PenType::ALL.iter().map(|p| m.row_total(*p)).sum();
        let col_sum: usize = PenType::ALL.iter().map(|p| m.column_total(*p)).sum();
        assert_eq!(row_sum, 7);
        assert_eq!(col_sum, 7);
        assert_eq!(m.get(A, B), 1);
        assert_eq!(m.diagonal(), eval.correct);
        assert_eq!(eval.correct, 4);
        assert!((eval.error_rate - 3.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_set_predictions_use_membership() {
        let ab: PenTypeSet = [A, B].into_iter().collect();
        let predictions = [ab, ab, PenTypeSet::single(C)];
        let truths = [B, C, C];
        let eval = evaluate_sets(&predictions, &truths);
        assert_eq!(eval.correct, 2);
        assert_eq!(eval.confusion.total(), 3);
        assert_eq!(eval.confusion.get(B, B), 1);
        // Miss is recorded against the set's first label
        assert_eq!(eval.confusion.get(A, C), 1);
        assert!((0.0..=1.0).contains(&eval.error_rate));
    }

    #[test]
    fn test_baseline_error() {
        assert!((baseline_error(&[A, A, A, B, C]) - 0.4).abs() < 1e-12);
        assert_eq!(majority_label(&[C, B]), Some(B));
        assert_eq!(baseline_error(&[]), 0.0);
    }

    #[test]
    fn test_confusion_display_has_header() {
        let m = ConfusionMatrix::from_pairs([(A, A)]);
        let text = m.to_string();
        assert!(text.contains("Glitter Gel Pen"));
        assert_eq!(text.lines().count(), 4);
    }
}
