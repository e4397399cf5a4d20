//! Labeled dataset construction.
//!
//! Joins the raw song table with the three membership lists and freezes the
//! result into a `Corpus`. Exclusions are by identifier key, applied once.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use crate::error::{DataIntegrityError, DataQualityNote, Result};
use crate::models::{Corpus, MembershipLists, PenType, RawSong, Song};
use crate::normalize::track_key;

/// Minimum Jaro-Winkler similarity for a "did you mean" suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.85;

/// Frozen corpus plus the non-fatal notes found while building it.
#[derive(Debug, Clone)]
pub struct BuiltCorpus {
    pub corpus: Corpus,
    pub notes: Vec<DataQualityNote>,
    pub excluded: usize,
    pub duplicates: usize,
}

/// Build the labeled corpus.
///
/// Fails with `DataIntegrityError` when a kept song is in no list or in more
/// than one list. Nothing is computed from lyrics or audio features here.
pub fn build_corpus(
    rows: Vec<RawSong>,
    lists: &MembershipLists,
    exclusions: &[String],
) -> Result<BuiltCorpus> {
    let excluded_keys: FxHashSet<String> = exclusions.iter().map(|e| track_key(e)).collect();
    let mut notes = Vec::new();
    let mut excluded = 0;
    let mut duplicates = 0;

    // Exclude and deduplicate by key, keeping first occurrence
    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut kept: Vec<(String, RawSong)> = Vec::with_capacity(rows.len());
    for row in rows {
        let key = track_key(&row.track_name);
        if excluded_keys.contains(&key) {
            debug!(track = %row.track_name, "excluded by identifier");
            excluded += 1;
            continue;
        }
        if !seen.insert(key.clone()) {
            warn!(track = %row.track_name, "duplicate song dropped");
            notes.push(DataQualityNote::DuplicateSong {
                track_name: row.track_name,
            });
            duplicates += 1;
            continue;
        }
        kept.push((key, row));
    }

    let labels = collect_labels(lists);

    // Validate every kept song before building anything
    for (key, row) in &kept {
        match labels.get(key) {
            None => {
                return Err(DataIntegrityError::MissingLabel {
                    track_name: row.track_name.clone(),
                }
                .into())
            }
            Some(pens) if pens.len() > 1 => {
                return Err(DataIntegrityError::MultipleLabels {
                    track_name: row.track_name.clone(),
                    labels: pens.clone(),
                }
                .into())
            }
            Some(_) => {}
        }
    }

    notes.extend(unmatched_entries(lists, &kept, &excluded_keys));

    let songs = kept
        .into_iter()
        .map(|(key, row)| {
            let pen_type = labels[&key][0];
            Song {
                track_name: row.track_name,
                key,
                album: row.album,
                audio: row.audio,
                lyrics: row.lyrics,
                pen_type,
            }
        })
        .collect();

    Ok(BuiltCorpus {
        corpus: Corpus::from_songs(songs),
        notes,
        excluded,
        duplicates,
    })
}

/// Map each key to the distinct lists it appears in, in category order.
fn collect_labels(lists: &MembershipLists) -> FxHashMap<String, Vec<PenType>> {
    let mut labels: FxHashMap<String, Vec<PenType>> = FxHashMap::default();
    for pen in PenType::ALL {
        for name in lists.tracks(pen) {
            let entry = labels.entry(track_key(name)).or_default();
            if !entry.contains(&pen) {
                entry.push(pen);
            }
        }
    }
    labels
}

fn unmatched_entries(
    lists: &MembershipLists,
    kept: &[(String, RawSong)],
    excluded_keys: &FxHashSet<String>,
) -> Vec<DataQualityNote> {
    let known: FxHashSet<&str> = kept.iter().map(|(k, _)| k.as_str()).collect();
    let mut notes = Vec::new();

    for pen in PenType::ALL {
        for entry in lists.tracks(pen) {
            let key = track_key(entry);
            if known.contains(key.as_str()) || excluded_keys.contains(&key) {
                continue;
            }
            let suggestion = closest_title(&key, kept);
            warn!(entry = %entry, pen_type = %pen, suggestion = ?suggestion, "list entry matches no song");
            notes.push(DataQualityNote::UnmatchedListEntry {
                pen_type: pen,
                entry: entry.clone(),
                suggestion,
            });
        }
    }
    notes
}

fn closest_title(key: &str, kept: &[(String, RawSong)]) -> Option<String> {
    kept.iter()
        .map(|(k, row)| (strsim::jaro_winkler(key, k), row))
        .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, row)| row.track_name.clone())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ClassifyError;
    use crate::models::AudioFeatures;

    pub(crate) fn raw(name: &str, lyrics: &str) -> RawSong {
        RawSong {
            track_name: name.to_string(),
            album: "Test Album".to_string(),
            audio: AudioFeatures::default(),
            lyrics: lyrics.to_string(),
        }
    }

    fn lists(entries: &[(PenType, &str)]) -> MembershipLists {
        let mut lists = MembershipLists::new();
        for (pen, name) in entries {
            lists.insert(*pen, *name);
        }
        lists
    }

    #[test]
    fn test_build_corpus_assigns_labels() {
        let rows = vec![raw("Betty", ""), raw("Shake It Off", "")];
        let lists = lists(&[
            (PenType::FountainPen, "betty"),
            (PenType::GlitterGelPen, "Shake It Off"),
        ]);
        let built = build_corpus(rows, &lists, &[]).unwrap();
        assert_eq!(built.corpus.len(), 2);
        assert_eq!(built.corpus.songs()[0].pen_type, PenType::FountainPen);
        assert_eq!(built.corpus.songs()[1].pen_type, PenType::GlitterGelPen);
        assert!(built.notes.is_empty());
    }

    #[test]
    fn test_song_in_two_lists_fails() {
        let rows = vec![raw("Betty", "we are happy"), raw("Cardigan", "")];
        let lists = lists(&[
            (PenType::Quill, "Betty"),
            (PenType::FountainPen, "Betty"),
            (PenType::FountainPen, "Cardigan"),
        ]);
        match build_corpus(rows, &lists, &[]) {
            Err(ClassifyError::DataIntegrity(DataIntegrityError::MultipleLabels {
                track_name,
                labels,
            })) => {
                assert_eq!(track_name, "Betty");
                assert_eq!(labels, vec![PenType::Quill, PenType::FountainPen]);
            }
            other => panic!("expected MultipleLabels, got {:?}", other),
        }
    }

    #[test]
    fn test_unlabeled_song_fails() {
        let rows = vec![raw("Betty", ""), raw("Mystery Track", "")];
        let lists = lists(&[(PenType::Quill, "Betty")]);
        let err = build_corpus(rows, &lists, &[]).unwrap_err();
        assert!(matches!(
            err,
            ClassifyError::DataIntegrity(DataIntegrityError::MissingLabel { .. })
        ));
    }

    #[test]
    fn test_exclusion_by_identifier() {
        let rows = vec![raw("Betty", ""), raw("Bonus Interview", ""), raw("Cardigan", "")];
        let lists = lists(&[(PenType::Quill, "Betty"), (PenType::Quill, "Cardigan")]);
        let built = build_corpus(rows, &lists, &["bonus interview".to_string()]).unwrap();
        assert_eq!(built.excluded, 1);
        let names: Vec<&str> = built.corpus.songs().iter().map(|s| s.track_name.as_str()).collect();
        assert_eq!(names, vec!["Betty", "Cardigan"]);
    }

    #[test]
    fn test_duplicates_keep_first() {
        let rows = vec![
            raw("Love Story", "first"),
            raw("Love Story (Taylor's Version)", "second"),
        ];
        let lists = lists(&[(PenType::GlitterGelPen, "Love Story")]);
        let built = build_corpus(rows, &lists, &[]).unwrap();
        assert_eq!(built.corpus.len(), 1);
        assert_eq!(built.corpus.songs()[0].lyrics, "first");
        assert_eq!(built.duplicates, 1);
        assert!(matches!(built.notes[0], DataQualityNote::DuplicateSong { .. }));
    }

    #[test]
    fn test_unmatched_list_entry_suggests_title() {
        let rows = vec![raw("Champagne Problems", "")];
        let lists = lists(&[
            (PenType::Quill, "Champagne Problems"),
            (PenType::Quill, "Champagne Problem"),
        ]);
        let built = build_corpus(rows, &lists, &[]).unwrap();
        assert_eq!(built.notes.len(), 1);
        match &built.notes[0] {
            DataQualityNote::UnmatchedListEntry { suggestion, .. } => {
                assert_eq!(suggestion.as_deref(), Some("Champagne Problems"));
            }
            other => panic!("unexpected note {:?}", other),
        }
    }
}
