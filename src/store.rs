//! SQLite source and output databases.
//!
//! Source tables:
//! - `songs`: one row per track, audio feature columns plus `lyrics`
//! - `pen_lists(pen_type, track_name)`: ground-truth membership
//!
//! The output database is created fresh and written in batched transactions.

use rusqlite::{params, Connection};

use crate::error::{DataIntegrityError, Result};
use crate::models::{AudioFeatures, Corpus, MembershipLists, PenType, RawSong};
use crate::pipeline::Analysis;
use crate::progress::{create_progress_bar, log_batch};

const WRITE_BATCH_SIZE: usize = 500;

// ============================================================================
// Reading
// ============================================================================

/// Read every song row in table order. NULL real-valued features become NaN
/// and NULL integer features `None`, so both surface as data-quality notes
/// instead of silently becoming 0.
pub fn read_songs(conn: &Connection) -> Result<Vec<RawSong>> {
    let mut stmt = conn.prepare(
        "SELECT track_name, album_name, danceability, energy, key, loudness, mode,
                speechiness, acousticness, instrumentalness, liveness, valence, tempo,
                time_signature, duration_ms, explicit, key_name, mode_name, lyrics
         FROM songs
         ORDER BY rowid",
    )?;

    let mut rows = stmt.query([])?;
    let mut songs = Vec::new();
    while let Some(row) = rows.next()? {
        let real = |idx: usize| -> rusqlite::Result<f64> {
            Ok(row.get::<_, Option<f64>>(idx)?.unwrap_or(f64::NAN))
        };
        let audio = AudioFeatures {
            danceability: real(2)?,
            energy: real(3)?,
            key: row.get(4)?,
            loudness: real(5)?,
            mode: row.get(6)?,
            speechiness: real(7)?,
            acousticness: real(8)?,
            instrumentalness: real(9)?,
            liveness: real(10)?,
            valence: real(11)?,
            tempo: real(12)?,
            time_signature: row.get(13)?,
            duration_ms: row.get(14)?,
            explicit: row.get::<_, Option<i64>>(15)?.map(|v| v != 0),
            key_name: row.get::<_, Option<String>>(16)?.unwrap_or_default(),
            mode_name: row.get::<_, Option<String>>(17)?.unwrap_or_default(),
        };
        songs.push(RawSong {
            track_name: row.get(0)?,
            album: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            audio,
            lyrics: row.get::<_, Option<String>>(18)?.unwrap_or_default(),
        });
    }
    Ok(songs)
}

pub fn read_membership_lists(conn: &Connection) -> Result<MembershipLists> {
    let mut stmt = conn.prepare("SELECT pen_type, track_name FROM pen_lists ORDER BY rowid")?;
    let mut rows = stmt.query([])?;
    let mut lists = MembershipLists::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        let track_name: String = row.get(1)?;
        let pen: PenType = value
            .parse()
            .map_err(|_| DataIntegrityError::UnknownPenType {
                track_name: track_name.clone(),
                value: value.clone(),
            })?;
        lists.insert(pen, track_name);
    }
    Ok(lists)
}

// ============================================================================
// Writing
// ============================================================================

pub fn write_analysis(conn: &mut Connection, corpus: &Corpus, analysis: &Analysis) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;

        CREATE TABLE song_features (
            idx INTEGER PRIMARY KEY,
            track_name TEXT NOT NULL,
            album TEXT NOT NULL,
            pen_type TEXT NOT NULL,
            lexical_diversity REAL NOT NULL,
            sentiment REAL NOT NULL,
            anger INTEGER NOT NULL,
            anticipation INTEGER NOT NULL,
            disgust INTEGER NOT NULL,
            fear INTEGER NOT NULL,
            joy INTEGER NOT NULL,
            sadness INTEGER NOT NULL,
            surprise INTEGER NOT NULL,
            trust INTEGER NOT NULL,
            positive INTEGER NOT NULL,
            negative INTEGER NOT NULL
        );

        CREATE TABLE predictions (
            idx INTEGER NOT NULL,
            classifier TEXT NOT NULL,
            predicted TEXT,
            correct INTEGER,
            neighbors_json TEXT,
            PRIMARY KEY (idx, classifier)
        );

        CREATE TABLE confusion (
            classifier TEXT NOT NULL,
            predicted TEXT NOT NULL,
            truth TEXT NOT NULL,
            count INTEGER NOT NULL
        );

        CREATE TABLE summary (
            classifier TEXT PRIMARY KEY,
            correct INTEGER,
            total INTEGER,
            error_rate REAL NOT NULL
        );

        CREATE TABLE tree_nodes (
            id INTEGER PRIMARY KEY,
            depth INTEGER NOT NULL,
            n INTEGER NOT NULL,
            quill INTEGER NOT NULL,
            fountain_pen INTEGER NOT NULL,
            glitter_gel_pen INTEGER NOT NULL,
            impurity REAL NOT NULL,
            feature TEXT,
            threshold REAL,
            left_child INTEGER,
            right_child INTEGER
        );

        CREATE TABLE quality_notes (
            kind TEXT NOT NULL,
            track_name TEXT NOT NULL,
            detail TEXT NOT NULL
        );",
    )?;

    write_song_features(conn, corpus, analysis)?;
    write_predictions(conn, corpus, analysis)?;

    let tx = conn.transaction()?;
    {
        let mut confusion = tx.prepare_cached(
            "INSERT INTO confusion (classifier, predicted, truth, count) VALUES (?1, ?2, ?3, ?4)",
        )?;
        let mut summary = tx.prepare_cached(
            "INSERT INTO summary (classifier, correct, total, error_rate) VALUES (?1, ?2, ?3, ?4)",
        )?;
        let evaluations = [
            ("lyric_knn", &analysis.lyric_knn.evaluation),
            ("emotion_knn", &analysis.emotion_knn.evaluation),
            ("tree", &analysis.tree.evaluation),
        ];
        for (name, eval) in evaluations {
            for predicted in PenType::ALL {
                for truth in PenType::ALL {
                    confusion.execute(params![
                        name,
                        predicted.name(),
                        truth.name(),
                        eval.confusion.get(predicted, truth) as i64
                    ])?;
                }
            }
            summary.execute(params![name, eval.correct as i64, eval.total as i64, eval.error_rate])?;
        }
        summary.execute(params!["baseline", None::<i64>, None::<i64>, analysis.baseline_error])?;

        let mut node_stmt = tx.prepare_cached(
            "INSERT INTO tree_nodes (id, depth, n, quill, fountain_pen, glitter_gel_pen, impurity,
                                     feature, threshold, left_child, right_child)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?;
        for node in analysis.tree.tree.nodes() {
            let split = node.split.as_ref();
            node_stmt.execute(params![
                node.id as i64,
                node.depth as i64,
                node.size() as i64,
                node.counts[0] as i64,
                node.counts[1] as i64,
                node.counts[2] as i64,
                node.impurity,
                split.map(|s| s.feature.name()),
                split.map(|s| s.threshold),
                split.map(|s| s.left as i64),
                split.map(|s| s.right as i64),
            ])?;
        }

        let mut note_stmt =
            tx.prepare_cached("INSERT INTO quality_notes (kind, track_name, detail) VALUES (?1, ?2, ?3)")?;
        for note in &analysis.notes {
            note_stmt.execute(params![note.kind(), note.track_name(), note.to_string()])?;
        }
    }
    tx.commit()?;
    Ok(())
}

fn write_song_features(conn: &mut Connection, corpus: &Corpus, analysis: &Analysis) -> Result<()> {
    let pb = create_progress_bar(corpus.len() as u64, "song_features");
    let indexed: Vec<usize> = (0..corpus.len()).collect();

    for chunk in indexed.chunks(WRITE_BATCH_SIZE) {
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO song_features (idx, track_name, album, pen_type, lexical_diversity, sentiment,
                    anger, anticipation, disgust, fear, joy, sadness, surprise, trust, positive, negative)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            )?;
            for &idx in chunk {
                let song = &corpus.songs()[idx];
                let a = &analysis.annotations[idx];
                let e = a.emotions;
                stmt.execute(params![
                    idx as i64,
                    song.track_name,
                    song.album,
                    song.pen_type.name(),
                    a.lexical_diversity,
                    a.sentiment,
                    e[0],
                    e[1],
                    e[2],
                    e[3],
                    e[4],
                    e[5],
                    e[6],
                    e[7],
                    a.positive,
                    a.negative,
                ])?;
                pb.inc(1);
            }
        }
        tx.commit()?;
        log_batch("song_features", pb.position() as usize, corpus.len());
    }

    pb.finish_with_message(format!("Wrote {} song feature rows", corpus.len()));
    Ok(())
}

fn write_predictions(conn: &mut Connection, corpus: &Corpus, analysis: &Analysis) -> Result<()> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO predictions (idx, classifier, predicted, correct, neighbors_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (name, report) in [("lyric_knn", &analysis.lyric_knn), ("emotion_knn", &analysis.emotion_knn)] {
            for p in &report.predictions {
                let neighbors: Vec<&str> = p
                    .neighbors
                    .iter()
                    .map(|&j| corpus.songs()[j].track_name.as_str())
                    .collect();
                stmt.execute(params![
                    p.song as i64,
                    name,
                    p.predicted.to_string(),
                    p.correct,
                    serde_json::to_string(&neighbors).ok(),
                ])?;
            }
        }
        for (idx, song) in corpus.songs().iter().enumerate() {
            stmt.execute(params![
                idx as i64,
                "tree",
                analysis.tree.predictions[idx].label.name(),
                analysis.tree.correct(idx, song.pen_type),
                None::<String>,
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::build_corpus;
    use crate::lexicon::Lexicons;
    use crate::pipeline::{analyze, PipelineConfig};

    fn source_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE songs (
                track_name TEXT, album_name TEXT, danceability REAL, energy REAL, key INTEGER,
                loudness REAL, mode INTEGER, speechiness REAL, acousticness REAL,
                instrumentalness REAL, liveness REAL, valence REAL, tempo REAL,
                time_signature INTEGER, duration_ms INTEGER, explicit INTEGER,
                key_name TEXT, mode_name TEXT, lyrics TEXT
            );
            CREATE TABLE pen_lists (pen_type TEXT, track_name TEXT);",
        )
        .unwrap();
        let songs = [
            ("Quill One", "quill parchment candle", Some(0.9)),
            ("Quill Two", "quill parchment window", Some(0.8)),
            ("Fountain One", "fountain letter window", Some(0.5)),
            ("Fountain Two", "fountain letter rain", None),
            ("Glitter One", "glitter party rain", Some(0.1)),
            ("Glitter Two", "glitter party candle", Some(0.2)),
        ];
        for (name, lyrics, acousticness) in songs {
            conn.execute(
                "INSERT INTO songs VALUES (?1, 'Album', 0.5, 0.5, 5, -7.0, 1, 0.04, ?2, 0.0, 0.1, 0.4,
                                           120.0, 4, 200000, 0, 'F', 'major', ?3)",
                params![name, acousticness, lyrics],
            )
            .unwrap();
        }
        for (pen, name) in [
            ("Quill", "Quill One"),
            ("Quill", "Quill Two"),
            ("Fountain Pen", "Fountain One"),
            ("Fountain Pen", "Fountain Two"),
            ("Glitter Gel Pen", "Glitter One"),
            ("Glitter Gel Pen", "Glitter Two"),
        ] {
            conn.execute("INSERT INTO pen_lists VALUES (?1, ?2)", params![pen, name]).unwrap();
        }
        conn
    }

    #[test]
    fn test_read_songs_null_real_is_nan() {
        let conn = source_db();
        let songs = read_songs(&conn).unwrap();
        assert_eq!(songs.len(), 6);
        assert_eq!(songs[0].track_name, "Quill One");
        assert_eq!(songs[0].audio.key_name, "F");
        assert!(songs[3].audio.acousticness.is_nan());
    }

    #[test]
    fn test_read_songs_null_integer_is_missing() {
        let conn = source_db();
        conn.execute("UPDATE songs SET time_signature = NULL, explicit = NULL WHERE track_name = 'Glitter One'", [])
            .unwrap();
        let songs = read_songs(&conn).unwrap();
        assert_eq!(songs.len(), 6);
        assert_eq!(songs[4].audio.time_signature, None);
        assert_eq!(songs[4].audio.explicit, None);
        assert_eq!(songs[0].audio.time_signature, Some(4));
        assert_eq!(songs[0].audio.explicit, Some(false));

        let lists = read_membership_lists(&conn).unwrap();
        let built = build_corpus(songs, &lists, &[]).unwrap();
        let analysis = analyze(&built.corpus, &PipelineConfig::default(), &Lexicons::default()).unwrap();
        assert!(analysis.notes.iter().any(|n| matches!(
            n,
            crate::error::DataQualityNote::NonFiniteFeature { track_name, feature }
                if track_name == "Glitter One" && feature == "time_signature"
        )));
    }

    #[test]
    fn test_unknown_pen_type_rejected() {
        let conn = source_db();
        conn.execute("INSERT INTO pen_lists VALUES ('Crayon', 'Quill One')", []).unwrap();
        assert!(read_membership_lists(&conn).is_err());
    }

    #[test]
    fn test_write_analysis_round_trip() {
        let source = source_db();
        let rows = read_songs(&source).unwrap();
        let lists = read_membership_lists(&source).unwrap();
        let built = build_corpus(rows, &lists, &[]).unwrap();
        let analysis = analyze(&built.corpus, &PipelineConfig::default(), &Lexicons::default()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let mut out = Connection::open(dir.path().join("classified.sqlite3")).unwrap();
        write_analysis(&mut out, &built.corpus, &analysis).unwrap();

        let features: i64 = out.query_row("SELECT COUNT(*) FROM song_features", [], |r| r.get(0)).unwrap();
        assert_eq!(features, 6);
        let predictions: i64 = out.query_row("SELECT COUNT(*) FROM predictions", [], |r| r.get(0)).unwrap();
        assert_eq!(predictions, 18);
        let confusion_total: i64 = out
            .query_row("SELECT SUM(count) FROM confusion WHERE classifier = 'lyric_knn'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(confusion_total, 6);
        let baseline: f64 = out
            .query_row("SELECT error_rate FROM summary WHERE classifier = 'baseline'", [], |r| r.get(0))
            .unwrap();
        assert!((baseline - 4.0 / 6.0).abs() < 1e-12);
        let notes: i64 = out
            .query_row("SELECT COUNT(*) FROM quality_notes WHERE kind = 'non_finite_feature'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(notes, 1);
    }
}
