//! Principal components over the standardized tree features.
//!
//! Used to explore which features carry the most variance. Columns are
//! scaled to unit variance first, so the components are those of the
//! correlation matrix.

use linfa::traits::Fit;
use linfa::DatasetBase;
use linfa_reduction::Pca;
use ndarray::{Array1, Array2, Axis};
use serde::Serialize;
use tracing::warn;

use crate::tree::{FeatureRow, TreeFeature, FEATURE_COUNT};

#[derive(Debug, Clone, Serialize)]
pub struct Component {
    pub eigenvalue: f64,
    pub explained_variance: f64,
    /// (feature name, loading), in feature column order.
    pub loadings: Vec<(&'static str, f64)>,
}

impl Component {
    /// Features with the largest absolute loadings first.
    pub fn top_features(&self, n: usize) -> Vec<(&'static str, f64)> {
        let mut sorted = self.loadings.clone();
        sorted.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
        sorted.truncate(n);
        sorted
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PcaSummary {
    pub samples: usize,
    /// Components sorted by eigenvalue, largest first.
    pub components: Vec<Component>,
}

impl PcaSummary {
    fn empty(samples: usize) -> Self {
        Self {
            samples,
            components: Vec::new(),
        }
    }
}

/// Correlation-matrix PCA. Constant features contribute zero loadings.
pub fn principal_components(rows: &[FeatureRow]) -> PcaSummary {
    let n = rows.len();
    if n < 2 {
        return PcaSummary::empty(n);
    }

    let (standardized, varying) = standardize(rows);
    if varying == 0 {
        return PcaSummary::empty(n);
    }

    let dataset = DatasetBase::from(standardized);
    let model = match Pca::params(n.min(FEATURE_COUNT)).fit(&dataset) {
        Ok(model) => model,
        Err(err) => {
            warn!(error = ?err, "principal components failed");
            return PcaSummary::empty(n);
        }
    };

    // Trace of the correlation matrix is the number of non-constant columns.
    let trace = varying as f64;
    let eigenvalues: Array1<f64> = model.explained_variance();
    let components = model
        .components()
        .axis_iter(Axis(0))
        .zip(eigenvalues.iter())
        .map(|(vector, &eigenvalue)| {
            let eigenvalue = eigenvalue.max(0.0);
            Component {
                eigenvalue,
                explained_variance: eigenvalue / trace,
                loadings: TreeFeature::ALL
                    .iter()
                    .map(|f| (f.name(), vector[f.column()]))
                    .collect(),
            }
        })
        .collect();

    PcaSummary {
        samples: n,
        components,
    }
}

/// Center each column and scale to unit sample variance; constant columns
/// become 0. Also returns how many columns vary.
fn standardize(rows: &[FeatureRow]) -> (Array2<f64>, usize) {
    let mut data = Array2::zeros((rows.len(), FEATURE_COUNT));
    for (i, row) in rows.iter().enumerate() {
        for (j, &value) in row.iter().enumerate() {
            data[[i, j]] = value;
        }
    }

    let mean = data.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(FEATURE_COUNT));
    let sd = data.std_axis(Axis(0), 1.0);
    let mut varying = 0;
    for (j, mut column) in data.axis_iter_mut(Axis(1)).enumerate() {
        if sd[j] > 0.0 {
            varying += 1;
            column.mapv_inplace(|v| (v - mean[j]) / sd[j]);
        } else {
            column.fill(0.0);
        }
    }
    (data, varying)
}
