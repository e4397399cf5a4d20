//! Core data models for the pen-type pipeline.
//!
//! This module contains the song records, the category set, the frozen
//! corpus, and the run statistics shared by every binary.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Categories
// ============================================================================

/// Stylistic category ("pen type") assigned to a song by the crowd-sourced labeling.
/// Declaration order is the tie-break order everywhere (Quill < FountainPen < GlitterGelPen).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PenType {
    Quill,
    FountainPen,
    GlitterGelPen,
}

impl PenType {
    pub const ALL: [PenType; 3] = [PenType::Quill, PenType::FountainPen, PenType::GlitterGelPen];

    pub const COUNT: usize = 3;

    /// Position in `ALL`, used to index count arrays.
    pub fn index(self) -> usize {
        match self {
            PenType::Quill => 0,
            PenType::FountainPen => 1,
            PenType::GlitterGelPen => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PenType::Quill => "Quill",
            PenType::FountainPen => "Fountain Pen",
            PenType::GlitterGelPen => "Glitter Gel Pen",
        }
    }
}

impl fmt::Display for PenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PenType {
    type Err = String;

    /// Accepts display names ("Glitter Gel Pen", "glitter-gel-pen") and the letters a/b/c.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "quill" | "a" => Ok(PenType::Quill),
            "fountainpen" | "fountain" | "b" => Ok(PenType::FountainPen),
            "glittergelpen" | "glitter" | "c" => Ok(PenType::GlitterGelPen),
            _ => Err(format!("unknown pen type '{}'", s)),
        }
    }
}

/// Set of pen types. Nearest-neighbor votes that tie return every tied label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PenTypeSet(u8);

impl PenTypeSet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn single(pen: PenType) -> Self {
        Self(1 << pen.index())
    }

    pub fn insert(&mut self, pen: PenType) {
        self.0 |= 1 << pen.index();
    }

    pub fn contains(self, pen: PenType) -> bool {
        self.0 & (1 << pen.index()) != 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Members in category order.
    pub fn iter(self) -> impl Iterator<Item = PenType> {
        PenType::ALL.into_iter().filter(move |p| self.contains(*p))
    }

    /// Lowest member in category order.
    pub fn first(self) -> Option<PenType> {
        self.iter().next()
    }
}

impl FromIterator<PenType> for PenTypeSet {
    fn from_iter<I: IntoIterator<Item = PenType>>(iter: I) -> Self {
        let mut set = PenTypeSet::empty();
        for pen in iter {
            set.insert(pen);
        }
        set
    }
}

impl Serialize for PenTypeSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl fmt::Display for PenTypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(PenType::name).collect();
        f.write_str(&names.join(" | "))
    }
}

// ============================================================================
// Song Models
// ============================================================================

/// Audio features from the streaming catalog, one field per column.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AudioFeatures {
    pub danceability: f64,
    pub energy: f64,
    pub key: Option<i32>, // 0 to 11 (pitch class)
    pub loudness: f64,
    pub mode: Option<i32>, // 0=minor, 1=major
    pub speechiness: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
    pub valence: f64,
    pub tempo: f64, // BPM
    // Integer columns stay `None` when the source value is NULL.
    pub time_signature: Option<i32>,
    pub duration_ms: Option<i64>,
    pub explicit: Option<bool>,
    pub key_name: String,  // "C", "C#", ...
    pub mode_name: String, // "major" / "minor"
}

impl Default for AudioFeatures {
    fn default() -> Self {
        Self {
            danceability: 0.0,
            energy: 0.0,
            key: Some(0),
            loudness: 0.0,
            mode: Some(1),
            speechiness: 0.0,
            acousticness: 0.0,
            instrumentalness: 0.0,
            liveness: 0.0,
            valence: 0.0,
            tempo: 0.0,
            time_signature: Some(4),
            duration_ms: Some(0),
            explicit: Some(false),
            key_name: "C".to_string(),
            mode_name: "major".to_string(),
        }
    }
}

/// Raw song row as produced by the data-acquisition collaborators (unlabeled).
#[derive(Clone, Debug)]
pub struct RawSong {
    pub track_name: String,
    pub album: String,
    pub audio: AudioFeatures,
    pub lyrics: String,
}

/// Labeled song, immutable once the corpus is frozen.
#[derive(Clone, Debug, Serialize)]
pub struct Song {
    pub track_name: String,
    /// Normalized identifier key, unique within the corpus.
    pub key: String,
    pub album: String,
    pub audio: AudioFeatures,
    #[serde(skip)]
    pub lyrics: String,
    pub pen_type: PenType,
}

/// Ordered, frozen collection of labeled songs.
#[derive(Clone, Debug, Default)]
pub struct Corpus {
    songs: Vec<Song>,
}

impl Corpus {
    /// Freeze a list of already-validated songs. Use `dataset::build_corpus` for raw input.
    pub fn from_songs(songs: Vec<Song>) -> Self {
        Self { songs }
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn labels(&self) -> Vec<PenType> {
        self.songs.iter().map(|s| s.pen_type).collect()
    }

    /// Position of a song by its normalized key.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.songs.iter().position(|s| s.key == key)
    }

    /// Songs per category, in `PenType::ALL` order.
    pub fn label_counts(&self) -> [usize; PenType::COUNT] {
        let mut counts = [0; PenType::COUNT];
        for song in &self.songs {
            counts[song.pen_type.index()] += 1;
        }
        counts
    }
}

// ============================================================================
// Membership Lists
// ============================================================================

/// The three named track lists that define ground-truth membership.
#[derive(Clone, Debug, Default)]
pub struct MembershipLists {
    lists: [Vec<String>; PenType::COUNT],
}

impl MembershipLists {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pen: PenType, track_name: impl Into<String>) {
        self.lists[pen.index()].push(track_name.into());
    }

    pub fn tracks(&self, pen: PenType) -> &[String] {
        &self.lists[pen.index()]
    }

    pub fn total(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Per-phase run statistics, logged as JSON like the extraction stats.
#[derive(Default, Debug, Clone, Serialize)]
pub struct RunStats {
    // Dataset construction
    pub source_rows: usize,
    pub excluded_rows: usize,
    pub duplicate_rows: usize,
    pub corpus_size: usize,
    pub unmatched_list_entries: usize,

    // Features
    pub vocabulary_size: usize,
    pub degenerate_lyric_vectors: usize,
    pub degenerate_emotion_vectors: usize,

    // Classifiers
    pub lyric_knn_error: f64,
    pub emotion_knn_error: f64,
    pub tree_error: f64,
    pub baseline_error: f64,
    pub tree_nodes: usize,
    pub tree_leaves: usize,
    pub unscoreable_songs: usize,

    // Timing
    pub elapsed_seconds: f64,
}

impl RunStats {
    /// Log stats to stderr in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            eprintln!("[STATS:{}]\n{}", phase, json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
