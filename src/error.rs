//! Error and data-quality types for the classification core.
//!
//! Fatal conditions are `ClassifyError`; everything that should be reported
//! without aborting the batch is a `DataQualityNote` collected into the report.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::models::PenType;

pub type Result<T> = std::result::Result<T, ClassifyError>;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("data integrity: {0}")]
    DataIntegrity(#[from] DataIntegrityError),

    /// Neighbor selection needs at least k+1 songs.
    #[error("insufficient data: corpus has {corpus_size} songs, k={k} needs at least {}", .k + 1)]
    InsufficientData { corpus_size: usize, k: usize },

    #[error("lexicon {source_name}, line {line}: {message}")]
    Lexicon {
        source_name: String,
        line: usize,
        message: String,
    },

    #[error("database: {0}")]
    Database(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataIntegrityError {
    #[error("song '{track_name}' is not in any pen-type list")]
    MissingLabel { track_name: String },

    #[error("song '{track_name}' appears in several pen-type lists: {}", join_labels(.labels))]
    MultipleLabels {
        track_name: String,
        labels: Vec<PenType>,
    },

    #[error("unknown pen type '{value}' for track '{track_name}'")]
    UnknownPenType { track_name: String, value: String },
}

fn join_labels(labels: &[PenType]) -> String {
    labels
        .iter()
        .map(|p| p.name())
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// Data Quality Notes (non-fatal)
// ============================================================================

/// Which vector space a degenerate vector was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VectorSpace {
    LyricTerms,
    Emotions,
}

impl fmt::Display for VectorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VectorSpace::LyricTerms => f.write_str("lyric terms"),
            VectorSpace::Emotions => f.write_str("emotions"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum DataQualityNote {
    /// All-zero feature vector; similarity against it follows the zero-vector policy.
    DegenerateVector { track_name: String, space: VectorSpace },
    /// Audio feature is NaN or infinite; the song is left out of the tree.
    NonFiniteFeature { track_name: String, feature: String },
    /// Song could not be scored by the tree and has no tree prediction.
    Unscoreable { track_name: String, reason: String },
    /// Membership-list entry matching no song in the source table.
    UnmatchedListEntry {
        pen_type: PenType,
        entry: String,
        suggestion: Option<String>,
    },
    /// Repeated identifier dropped during deduplication.
    DuplicateSong { track_name: String },
}

impl DataQualityNote {
    pub fn track_name(&self) -> &str {
        match self {
            DataQualityNote::DegenerateVector { track_name, .. }
            | DataQualityNote::NonFiniteFeature { track_name, .. }
            | DataQualityNote::Unscoreable { track_name, .. }
            | DataQualityNote::DuplicateSong { track_name } => track_name,
            DataQualityNote::UnmatchedListEntry { entry, .. } => entry,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DataQualityNote::DegenerateVector { .. } => "degenerate_vector",
            DataQualityNote::NonFiniteFeature { .. } => "non_finite_feature",
            DataQualityNote::Unscoreable { .. } => "unscoreable",
            DataQualityNote::UnmatchedListEntry { .. } => "unmatched_list_entry",
            DataQualityNote::DuplicateSong { .. } => "duplicate_song",
        }
    }
}

impl fmt::Display for DataQualityNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataQualityNote::DegenerateVector { track_name, space } => {
                write!(f, "'{}' has an all-zero {} vector", track_name, space)
            }
            DataQualityNote::NonFiniteFeature { track_name, feature } => {
                write!(f, "'{}' has a non-finite {}", track_name, feature)
            }
            DataQualityNote::Unscoreable { track_name, reason } => {
                write!(f, "'{}' is unscoreable: {}", track_name, reason)
            }
            DataQualityNote::UnmatchedListEntry {
                pen_type,
                entry,
                suggestion,
            } => {
                write!(f, "{} list entry '{}' matches no song", pen_type, entry)?;
                if let Some(s) = suggestion {
                    write!(f, " (did you mean '{}'?)", s)?;
                }
                Ok(())
            }
            DataQualityNote::DuplicateSong { track_name } => {
                write!(f, "duplicate song '{}' dropped", track_name)
            }
        }
    }
}
