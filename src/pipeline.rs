//! End-to-end analysis over a frozen corpus.
//!
//! Each stage takes the previous stage's immutable output:
//! vectorize → annotate → similarity → nearest neighbors, and
//! annotate → tree → evaluation. Nothing here performs I/O.

use serde::Serialize;
use tracing::{info, warn};

use crate::annotate::{annotate, LyricAnnotation};
use crate::error::{ClassifyError, DataQualityNote, Result, VectorSpace};
use crate::evaluate::{baseline_error, evaluate_labels, evaluate_sets, Evaluation};
use crate::knn::{self, NeighborPrediction, DEFAULT_K};
use crate::lexicon::Lexicons;
use crate::models::{Corpus, PenType};
use crate::pca::{principal_components, PcaSummary};
use crate::similarity::SimilarityMatrix;
use crate::tree::{feature_row, non_finite_feature, DecisionTree, FeatureRow, LeafPrediction, TreeParams};
use crate::vectorize::TermMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PipelineConfig {
    /// Neighbors per vote.
    pub k: usize,
    pub tree: TreeParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            tree: TreeParams::default(),
        }
    }
}

/// Set-valued classifier output with its evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct NeighborReport {
    pub predictions: Vec<NeighborPrediction>,
    pub evaluation: Evaluation,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeReport {
    pub tree: DecisionTree,
    /// One entry per song, in corpus order.
    pub predictions: Vec<LeafPrediction>,
    /// Evaluated over every song, including ones that stopped above a leaf.
    pub evaluation: Evaluation,
}

impl TreeReport {
    pub fn correct(&self, song: usize, truth: PenType) -> bool {
        self.predictions[song].label == truth
    }
}

/// Everything the reporting side consumes.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub config: PipelineConfig,
    pub annotations: Vec<LyricAnnotation>,
    #[serde(skip)]
    pub terms: TermMatrix,
    #[serde(skip)]
    pub lyric_similarity: SimilarityMatrix,
    #[serde(skip)]
    pub emotion_distance: SimilarityMatrix,
    #[serde(skip)]
    pub feature_rows: Vec<FeatureRow>,
    pub vocabulary_size: usize,
    pub lyric_knn: NeighborReport,
    pub emotion_knn: NeighborReport,
    pub tree: TreeReport,
    pub baseline_error: f64,
    pub pca: PcaSummary,
    pub notes: Vec<DataQualityNote>,
}

/// Run every classifier over the corpus.
///
/// Fails fast with `InsufficientData` when the corpus cannot supply k neighbors.
/// Per-song problems become `DataQualityNote`s instead of errors.
pub fn analyze(corpus: &Corpus, config: &PipelineConfig, lexicons: &Lexicons<'_>) -> Result<Analysis> {
    let n = corpus.len();
    if config.k == 0 || n < config.k + 1 {
        return Err(ClassifyError::InsufficientData {
            corpus_size: n,
            k: config.k,
        });
    }

    let labels = corpus.labels();
    let mut notes = Vec::new();

    // Vectorize and annotate
    let terms = TermMatrix::build(corpus);
    let annotations: Vec<LyricAnnotation> = corpus
        .songs()
        .iter()
        .zip(terms.rows())
        .map(|(song, row)| annotate(&song.lyrics, row, lexicons))
        .collect();
    info!(songs = n, vocabulary = terms.vocabulary().len(), "vectorized lyrics");

    for (idx, song) in corpus.songs().iter().enumerate() {
        if terms.is_zero_row(idx) {
            warn!(track = %song.track_name, "all-zero lyric vector");
            notes.push(DataQualityNote::DegenerateVector {
                track_name: song.track_name.clone(),
                space: VectorSpace::LyricTerms,
            });
        }
        if annotations[idx].emotions.iter().all(|&c| c == 0) {
            warn!(track = %song.track_name, "all-zero emotion vector");
            notes.push(DataQualityNote::DegenerateVector {
                track_name: song.track_name.clone(),
                space: VectorSpace::Emotions,
            });
        }
    }

    // Similarity and nearest neighbors
    let lyric_similarity = SimilarityMatrix::cosine_terms(&terms);
    let emotion_vectors: Vec<_> = annotations.iter().map(|a| a.emotions).collect();
    let emotion_distance = SimilarityMatrix::angular_emotions(&emotion_vectors);

    let lyric_knn = neighbor_report(knn::classify(&lyric_similarity, &labels, config.k)?, &labels);
    let emotion_knn = neighbor_report(knn::classify(&emotion_distance, &labels, config.k)?, &labels);

    // Decision tree on finite rows only
    let feature_rows: Vec<FeatureRow> = corpus
        .songs()
        .iter()
        .zip(&annotations)
        .map(|(song, lyric)| feature_row(&song.audio, lyric))
        .collect();

    let mut train_rows = Vec::with_capacity(n);
    let mut train_labels = Vec::with_capacity(n);
    for (idx, row) in feature_rows.iter().enumerate() {
        match non_finite_feature(row) {
            Some(feature) => {
                let track_name = corpus.songs()[idx].track_name.clone();
                warn!(track = %track_name, feature = feature.name(), "non-finite feature, left out of tree");
                notes.push(DataQualityNote::NonFiniteFeature {
                    track_name,
                    feature: feature.name().to_string(),
                });
            }
            None => {
                train_rows.push(*row);
                train_labels.push(labels[idx]);
            }
        }
    }

    let tree = DecisionTree::fit(&train_rows, &train_labels, config.tree);
    info!(nodes = tree.nodes().len(), leaves = tree.leaf_count(), "tree grown");

    let predictions: Vec<LeafPrediction> = feature_rows.iter().map(|row| tree.predict(row)).collect();
    for (idx, prediction) in predictions.iter().enumerate() {
        if !prediction.reached_leaf {
            let track_name = corpus.songs()[idx].track_name.clone();
            warn!(track = %track_name, node = prediction.node, "tree prediction stopped above a leaf");
            notes.push(DataQualityNote::Unscoreable {
                track_name,
                reason: format!(
                    "split feature at node {} is not finite, using that node's distribution",
                    prediction.node
                ),
            });
        }
    }
    let predicted: Vec<PenType> = predictions.iter().map(|p| p.label).collect();
    let tree_report = TreeReport {
        evaluation: evaluate_labels(&predicted, &labels),
        tree,
        predictions,
    };

    let pca = principal_components(&train_rows);

    Ok(Analysis {
        config: *config,
        annotations,
        vocabulary_size: terms.vocabulary().len(),
        terms,
        lyric_similarity,
        emotion_distance,
        feature_rows,
        lyric_knn,
        emotion_knn,
        tree: tree_report,
        baseline_error: baseline_error(&labels),
        pca,
        notes,
    })
}

fn neighbor_report(predictions: Vec<NeighborPrediction>, labels: &[PenType]) -> NeighborReport {
    let sets: Vec<_> = predictions.iter().map(|p| p.predicted).collect();
    let evaluation = evaluate_sets(&sets, labels);
    NeighborReport {
        predictions,
        evaluation,
    }
}
