//! Unpruned classification tree over audio features and lyric scores.
//!
//! Induction is greedy recursive binary partitioning with a deviance or Gini
//! criterion. A song goes left when `feature < threshold`, right otherwise.
//! The tree is grown on the full corpus and never pruned, so its error is
//! in-sample only.

use serde::Serialize;
use std::fmt::Write as _;
use tracing::debug;

use crate::annotate::LyricAnnotation;
use crate::models::{AudioFeatures, PenType};

/// Reductions smaller than this are treated as no improvement.
const MIN_REDUCTION: f64 = 1e-9;

// ============================================================================
// Features
// ============================================================================

/// Numeric inputs to the tree, in column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TreeFeature {
    Danceability,
    Energy,
    Key,
    Loudness,
    Mode,
    Speechiness,
    Acousticness,
    Instrumentalness,
    Liveness,
    Valence,
    Tempo,
    TimeSignature,
    DurationMs,
    Explicit,
    LexicalDiversity,
    Sentiment,
}

pub const FEATURE_COUNT: usize = 16;

pub type FeatureRow = [f64; FEATURE_COUNT];

impl TreeFeature {
    pub const ALL: [TreeFeature; FEATURE_COUNT] = [
        TreeFeature::Danceability,
        TreeFeature::Energy,
        TreeFeature::Key,
        TreeFeature::Loudness,
        TreeFeature::Mode,
        TreeFeature::Speechiness,
        TreeFeature::Acousticness,
        TreeFeature::Instrumentalness,
        TreeFeature::Liveness,
        TreeFeature::Valence,
        TreeFeature::Tempo,
        TreeFeature::TimeSignature,
        TreeFeature::DurationMs,
        TreeFeature::Explicit,
        TreeFeature::LexicalDiversity,
        TreeFeature::Sentiment,
    ];

    pub fn column(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            TreeFeature::Danceability => "danceability",
            TreeFeature::Energy => "energy",
            TreeFeature::Key => "key",
            TreeFeature::Loudness => "loudness",
            TreeFeature::Mode => "mode",
            TreeFeature::Speechiness => "speechiness",
            TreeFeature::Acousticness => "acousticness",
            TreeFeature::Instrumentalness => "instrumentalness",
            TreeFeature::Liveness => "liveness",
            TreeFeature::Valence => "valence",
            TreeFeature::Tempo => "tempo",
            TreeFeature::TimeSignature => "time_signature",
            TreeFeature::DurationMs => "duration_ms",
            TreeFeature::Explicit => "explicit",
            TreeFeature::LexicalDiversity => "lexical_diversity",
            TreeFeature::Sentiment => "sentiment",
        }
    }

    pub fn value(self, audio: &AudioFeatures, lyric: &LyricAnnotation) -> f64 {
        match self {
            TreeFeature::Danceability => audio.danceability,
            TreeFeature::Energy => audio.energy,
            TreeFeature::Key => integer(audio.key.map(i64::from)),
            TreeFeature::Loudness => audio.loudness,
            TreeFeature::Mode => integer(audio.mode.map(i64::from)),
            TreeFeature::Speechiness => audio.speechiness,
            TreeFeature::Acousticness => audio.acousticness,
            TreeFeature::Instrumentalness => audio.instrumentalness,
            TreeFeature::Liveness => audio.liveness,
            TreeFeature::Valence => audio.valence,
            TreeFeature::Tempo => audio.tempo,
            TreeFeature::TimeSignature => integer(audio.time_signature.map(i64::from)),
            TreeFeature::DurationMs => integer(audio.duration_ms),
            TreeFeature::Explicit => integer(audio.explicit.map(i64::from)),
            TreeFeature::LexicalDiversity => lyric.lexical_diversity,
            TreeFeature::Sentiment => lyric.sentiment,
        }
    }
}

/// Missing integer columns become NaN so they are reported like missing reals.
fn integer(value: Option<i64>) -> f64 {
    value.map_or(f64::NAN, |v| v as f64)
}

/// Feature row for one song, by named field.
pub fn feature_row(audio: &AudioFeatures, lyric: &LyricAnnotation) -> FeatureRow {
    let mut row = [0.0; FEATURE_COUNT];
    for feature in TreeFeature::ALL {
        row[feature.column()] = feature.value(audio, lyric);
    }
    row
}

/// First non-finite feature in a row, if any.
pub fn non_finite_feature(row: &FeatureRow) -> Option<TreeFeature> {
    TreeFeature::ALL
        .into_iter()
        .find(|f| !row[f.column()].is_finite())
}

// ============================================================================
// Parameters
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
pub enum SplitCriterion {
    /// Multinomial deviance, -2 Σ n_k ln(n_k / n).
    Deviance,
    /// Gini impurity scaled by node size, n (1 - Σ p_k²).
    Gini,
}

impl SplitCriterion {
    /// Impurity of a node with the given label counts, additive across children.
    pub fn impurity(self, counts: &[usize; PenType::COUNT]) -> f64 {
        let n: usize = counts.iter().sum();
        if n == 0 {
            return 0.0;
        }
        let n = n as f64;
        match self {
            SplitCriterion::Deviance => counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let c = c as f64;
                    -2.0 * c * (c / n).ln()
                })
                .sum(),
            SplitCriterion::Gini => {
                let sum_sq: f64 = counts.iter().map(|&c| (c as f64 / n).powi(2)).sum();
                n * (1.0 - sum_sq)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TreeParams {
    pub criterion: SplitCriterion,
    /// Nodes smaller than this are not split.
    pub min_split: usize,
    /// Each child of a split needs at least this many songs.
    pub min_leaf: usize,
    /// Impurity floor: a node is split only if its own impurity is at least
    /// this fraction of the root's. It does not bound the split's reduction.
    pub min_dev: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            criterion: SplitCriterion::Deviance,
            min_split: 10,
            min_leaf: 5,
            min_dev: 0.01,
        }
    }
}

// ============================================================================
// Tree Structure
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Split {
    pub feature: TreeFeature,
    pub threshold: f64,
    pub left: usize,
    pub right: usize,
}

/// Arena node. Leaves have `split == None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    pub id: usize,
    pub depth: usize,
    pub counts: [usize; PenType::COUNT],
    pub impurity: f64,
    pub split: Option<Split>,
}

impl TreeNode {
    pub fn size(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn is_leaf(&self) -> bool {
        self.split.is_none()
    }

    /// Majority label; the first category wins ties.
    pub fn label(&self) -> PenType {
        argmax(&self.counts)
    }

    pub fn probabilities(&self) -> [f64; PenType::COUNT] {
        let n = self.size().max(1) as f64;
        self.counts.map(|c| c as f64 / n)
    }
}

fn argmax(counts: &[usize; PenType::COUNT]) -> PenType {
    let mut best = 0;
    for idx in 1..PenType::COUNT {
        if counts[idx] > counts[best] {
            best = idx;
        }
    }
    PenType::ALL[best]
}

/// Node a song ends at. Usually a leaf; an internal node when the song's
/// value for that node's split feature is not finite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeafPrediction {
    pub node: usize,
    pub probabilities: [f64; PenType::COUNT],
    pub label: PenType,
    pub reached_leaf: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
    params: TreeParams,
}

struct Candidate {
    feature: TreeFeature,
    threshold: f64,
    reduction: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

impl DecisionTree {
    /// Grow a tree on the given rows. `rows` and `labels` are parallel slices of finite rows.
    pub fn fit(rows: &[FeatureRow], labels: &[PenType], params: TreeParams) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            params,
        };
        let all: Vec<usize> = (0..rows.len()).collect();
        let root_impurity = params.criterion.impurity(&count_labels(labels, &all));
        tree.grow(rows, labels, all, 0, root_impurity);
        tree
    }

    fn grow(
        &mut self,
        rows: &[FeatureRow],
        labels: &[PenType],
        members: Vec<usize>,
        depth: usize,
        root_impurity: f64,
    ) -> usize {
        let counts = count_labels(labels, &members);
        let impurity = self.params.criterion.impurity(&counts);
        let id = self.nodes.len();
        self.nodes.push(TreeNode {
            id,
            depth,
            counts,
            impurity,
            split: None,
        });

        let splittable = members.len() >= self.params.min_split
            && impurity > 0.0
            && impurity >= self.params.min_dev * root_impurity;
        if !splittable {
            return id;
        }

        let Some(best) = self.best_split(rows, labels, &members, impurity) else {
            return id;
        };
        debug!(
            node = id,
            feature = best.feature.name(),
            threshold = best.threshold,
            reduction = best.reduction,
            "split"
        );

        let left = self.grow(rows, labels, best.left, depth + 1, root_impurity);
        let right = self.grow(rows, labels, best.right, depth + 1, root_impurity);
        self.nodes[id].split = Some(Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        });
        id
    }

    /// Best (feature, threshold) by impurity reduction. Earlier features and
    /// lower thresholds win ties.
    fn best_split(
        &self,
        rows: &[FeatureRow],
        labels: &[PenType],
        members: &[usize],
        parent_impurity: f64,
    ) -> Option<Candidate> {
        let criterion = self.params.criterion;
        let min_leaf = self.params.min_leaf.max(1);
        let total = count_labels(labels, members);
        let mut best: Option<(TreeFeature, f64, f64)> = None;

        for feature in TreeFeature::ALL {
            let col = feature.column();
            let mut order = members.to_vec();
            order.sort_by(|&a, &b| rows[a][col].total_cmp(&rows[b][col]));

            let mut left_counts = [0usize; PenType::COUNT];
            for pos in 0..order.len() - 1 {
                left_counts[labels[order[pos]].index()] += 1;
                let here = rows[order[pos]][col];
                let next = rows[order[pos + 1]][col];
                if here == next {
                    continue;
                }
                let n_left = pos + 1;
                if n_left < min_leaf || order.len() - n_left < min_leaf {
                    continue;
                }
                let mut right_counts = total;
                for k in 0..PenType::COUNT {
                    right_counts[k] -= left_counts[k];
                }
                let reduction = parent_impurity
                    - criterion.impurity(&left_counts)
                    - criterion.impurity(&right_counts);
                let better = match best {
                    None => reduction > MIN_REDUCTION,
                    Some((_, _, r)) => reduction > r + MIN_REDUCTION,
                };
                if better {
                    best = Some((feature, split_threshold(here, next), reduction));
                }
            }
        }

        let (feature, threshold, reduction) = best?;
        let col = feature.column();
        let (left, right): (Vec<usize>, Vec<usize>) =
            members.iter().copied().partition(|&i| rows[i][col] < threshold);
        if left.len() < min_leaf || right.len() < min_leaf {
            return None;
        }
        Some(Candidate {
            feature,
            threshold,
            reduction,
            left,
            right,
        })
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.nodes.first()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Node ids visited from the root. Stops early at the first node whose
    /// split feature is not finite in `row`.
    pub fn path(&self, row: &FeatureRow) -> Vec<usize> {
        let mut path = Vec::new();
        let mut id = 0;
        while let Some(node) = self.nodes.get(id) {
            path.push(id);
            let Some(split) = &node.split else {
                break;
            };
            let value = row[split.feature.column()];
            if !value.is_finite() {
                break;
            }
            id = if value < split.threshold {
                split.left
            } else {
                split.right
            };
        }
        path
    }

    /// Distribution at the node the song ends at. A fitted tree always has a
    /// root, so every row gets a prediction.
    pub fn predict(&self, row: &FeatureRow) -> LeafPrediction {
        let node = self.path(row).last().copied().unwrap_or(0);
        let reached = &self.nodes[node];
        LeafPrediction {
            node,
            probabilities: reached.probabilities(),
            label: reached.label(),
            reached_leaf: reached.is_leaf(),
        }
    }

    /// Indented text rendering, one node per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.nodes.is_empty() {
            self.render_node(0, "root", &mut out);
        }
        out
    }

    fn render_node(&self, id: usize, rule: &str, out: &mut String) {
        let node = &self.nodes[id];
        let probs = node.probabilities();
        let _ = writeln!(
            out,
            "{:indent$}{}) {} n={} impurity={:.3} {} ({:.3} {:.3} {:.3}){}",
            "",
            id,
            rule,
            node.size(),
            node.impurity,
            node.label(),
            probs[0],
            probs[1],
            probs[2],
            if node.is_leaf() { " *" } else { "" },
            indent = node.depth * 2
        );
        if let Some(split) = &node.split {
            let name = split.feature.name();
            self.render_node(split.left, &format!("{} < {:.4}", name, split.threshold), out);
            self.render_node(split.right, &format!("{} >= {:.4}", name, split.threshold), out);
        }
    }
}

/// Midpoint of two distinct sorted values. Adjacent floats have no midpoint
/// strictly above `here`, so `next` itself is used and `< next` still
/// separates them.
fn split_threshold(here: f64, next: f64) -> f64 {
    let mid = (here + next) / 2.0;
    if mid > here && mid <= next {
        mid
    } else {
        next
    }
}

fn count_labels(labels: &[PenType], members: &[usize]) -> [usize; PenType::COUNT] {
    let mut counts = [0; PenType::COUNT];
    for &i in members {
        counts[labels[i].index()] += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    use PenType::{FountainPen as B, GlitterGelPen as C, Quill as A};

    fn row_with(feature: TreeFeature, value: f64) -> FeatureRow {
        let mut row = [0.0; FEATURE_COUNT];
        row[feature.column()] = value;
        row
    }

    fn acousticness_dataset() -> (Vec<FeatureRow>, Vec<PenType>) {
        let a_values = [0.05, 0.1, 0.2, 0.3, 0.4, 0.49];
        let b_values = [0.51, 0.6, 0.7, 0.8, 0.9, 0.95];
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for v in a_values {
            rows.push(row_with(TreeFeature::Acousticness, v));
            labels.push(A);
        }
        for v in b_values {
            rows.push(row_with(TreeFeature::Acousticness, v));
            labels.push(B);
        }
        (rows, labels)
    }

    #[test]
    fn test_impurity_criteria() {
        assert_eq!(SplitCriterion::Deviance.impurity(&[4, 0, 0]), 0.0);
        assert_eq!(SplitCriterion::Gini.impurity(&[4, 0, 0]), 0.0);
        let dev = SplitCriterion::Deviance.impurity(&[2, 2, 0]);
        assert!((dev - 8.0 * 2f64.ln()).abs() < 1e-12);
        let gini = SplitCriterion::Gini.impurity(&[2, 2, 0]);
        assert!((gini - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_perfect_split_on_acousticness() {
        let (rows, labels) = acousticness_dataset();
        for criterion in [SplitCriterion::Deviance, SplitCriterion::Gini] {
            let params = TreeParams {
                criterion,
                ..TreeParams::default()
            };
            let tree = DecisionTree::fit(&rows, &labels, params);
            let root = tree.root().unwrap();
            let split = root.split.as_ref().unwrap();
            assert_eq!(split.feature, TreeFeature::Acousticness);
            assert!((split.threshold - 0.5).abs() < 1e-9);
            assert_eq!(tree.leaf_count(), 2);

            for (row, label) in rows.iter().zip(&labels) {
                assert_eq!(tree.predict(row).label, *label);
            }
        }
    }

    #[test]
    fn test_adjacent_float_values_still_split() {
        let next = 1.0 + f64::EPSILON;
        let mut rows = vec![row_with(TreeFeature::Energy, 1.0); 5];
        rows.extend(vec![row_with(TreeFeature::Energy, next); 5]);
        let labels: Vec<PenType> = [A; 5].into_iter().chain([B; 5]).collect();

        let tree = DecisionTree::fit(&rows, &labels, TreeParams::default());
        assert_eq!(tree.nodes().len(), 3);
        let split = tree.root().unwrap().split.as_ref().unwrap();
        assert_eq!(split.feature, TreeFeature::Energy);
        assert_eq!(split.threshold, next);
        assert_eq!(tree.nodes()[split.left].counts, [5, 0, 0]);
        assert_eq!(tree.nodes()[split.right].counts, [0, 5, 0]);
        for (row, label) in rows.iter().zip(&labels) {
            assert_eq!(tree.predict(row).label, *label);
        }
    }

    #[test]
    fn test_split_threshold_falls_back_to_upper_value() {
        assert_eq!(split_threshold(0.25, 0.75), 0.5);
        assert_eq!(split_threshold(1.0, 1.0 + f64::EPSILON), 1.0 + f64::EPSILON);
        assert_eq!(split_threshold(f64::MAX / 1.5, f64::MAX), f64::MAX);
    }

    #[test]
    fn test_leaf_distribution_and_tie_break() {
        let rows = vec![row_with(TreeFeature::Energy, 0.5); 4];
        let labels = vec![C, B, C, B];
        let tree = DecisionTree::fit(&rows, &labels, TreeParams::default());
        assert_eq!(tree.nodes().len(), 1);
        let prediction = tree.predict(&rows[0]);
        assert_eq!(prediction.probabilities, [0.0, 0.5, 0.5]);
        // B precedes C in category order
        assert_eq!(prediction.label, B);
    }

    #[test]
    fn test_min_split_stops_growth() {
        let (rows, labels) = acousticness_dataset();
        let params = TreeParams {
            min_split: 13,
            ..TreeParams::default()
        };
        let tree = DecisionTree::fit(&rows, &labels, params);
        assert_eq!(tree.nodes().len(), 1);
        assert!(tree.root().unwrap().is_leaf());
    }

    #[test]
    fn test_min_dev_gates_on_node_impurity() {
        let (rows, labels) = acousticness_dataset();
        // Root impurity equals itself, so any fraction up to 1 still splits it
        let params = TreeParams {
            min_dev: 1.0,
            ..TreeParams::default()
        };
        assert_eq!(DecisionTree::fit(&rows, &labels, params).nodes().len(), 3);
        let params = TreeParams {
            min_dev: 1.5,
            ..TreeParams::default()
        };
        assert_eq!(DecisionTree::fit(&rows, &labels, params).nodes().len(), 1);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..30 {
            let mut row = [0.0; FEATURE_COUNT];
            row[TreeFeature::Energy.column()] = (i * 7 % 11) as f64 / 11.0;
            row[TreeFeature::Valence.column()] = (i * 5 % 13) as f64 / 13.0;
            row[TreeFeature::Tempo.column()] = 90.0 + (i * 3 % 17) as f64;
            rows.push(row);
            labels.push(PenType::ALL[i % 3]);
        }
        let first = DecisionTree::fit(&rows, &labels, TreeParams::default());
        let second = DecisionTree::fit(&rows, &labels, TreeParams::default());
        assert_eq!(first, second);
        let p1: Vec<_> = rows.iter().map(|r| first.predict(r)).collect();
        let p2: Vec<_> = rows.iter().map(|r| second.predict(r)).collect();
        assert_eq!(p1, p2);
    }

    #[test]
    fn test_non_finite_feature_unscoreable() {
        let (rows, labels) = acousticness_dataset();
        let tree = DecisionTree::fit(&rows, &labels, TreeParams::default());
        let bad = row_with(TreeFeature::Acousticness, f64::NAN);
        let stopped = tree.predict(&bad);
        assert!(!stopped.reached_leaf);
        assert_eq!(stopped.node, 0);
        assert_eq!(tree.path(&bad), vec![0]);
        // Root of the acousticness dataset is evenly split between A and B
        assert_eq!(stopped.label, A);
        assert_eq!(stopped.probabilities, tree.nodes()[0].probabilities());
        assert_eq!(non_finite_feature(&bad), Some(TreeFeature::Acousticness));
        // NaN in a feature the tree never reads is still routable
        let mut unused = row_with(TreeFeature::Acousticness, 0.2);
        unused[TreeFeature::Tempo.column()] = f64::INFINITY;
        assert_eq!(tree.predict(&unused).label, A);
        assert!(tree.predict(&unused).reached_leaf);
    }

    #[test]
    fn test_render_lists_every_node() {
        let (rows, labels) = acousticness_dataset();
        let tree = DecisionTree::fit(&rows, &labels, TreeParams::default());
        let text = tree.render();
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("acousticness < 0.5000"));
        assert!(text.lines().next().unwrap().starts_with("0) root n=12"));
    }
}
