//! Explain one song's classifications: its nearest lyric and emotion
//! neighbors and the decision-tree path it follows.
//!
//! Usage: neighbors <source.sqlite3> <track name> [--k 2]

use anyhow::{bail, Context, Result};
use clap::Parser;
use rusqlite::Connection;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use pen_types::dataset::build_corpus;
use pen_types::knn::nearest_neighbors;
use pen_types::lexicon::Lexicons;
use pen_types::models::Corpus;
use pen_types::normalize::track_key;
use pen_types::pipeline::{analyze, PipelineConfig};
use pen_types::similarity::SimilarityMatrix;
use pen_types::store::{read_membership_lists, read_songs};

#[derive(Parser)]
#[command(name = "neighbors")]
#[command(about = "Show nearest neighbors and tree path for one song")]
struct Args {
    source: PathBuf,

    /// Track name, matched the same way list entries are
    track: String,

    #[arg(long, default_value = "2")]
    k: usize,
}

fn print_neighbors(title: &str, corpus: &Corpus, matrix: &SimilarityMatrix, song: usize, k: usize) {
    println!("\n{} ({:?})", title, matrix.kind());
    for (rank, (idx, score)) in nearest_neighbors(matrix, song, k).into_iter().enumerate() {
        let other = &corpus.songs()[idx];
        println!(
            "  {}. {:<40} {:>8.4}  {}",
            rank + 1,
            other.track_name,
            score,
            other.pen_type
        );
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let conn = Connection::open(&args.source).context("Failed to open source database")?;
    let rows = read_songs(&conn)?;
    let lists = read_membership_lists(&conn)?;
    let built = build_corpus(rows, &lists, &[])?;
    let corpus = built.corpus;

    let Some(song) = corpus.position(&track_key(&args.track)) else {
        bail!("No labeled song matches '{}'", args.track);
    };

    let config = PipelineConfig {
        k: args.k,
        ..PipelineConfig::default()
    };
    let analysis = analyze(&corpus, &config, &Lexicons::default())?;

    let target = &corpus.songs()[song];
    println!("{} [{}]", target.track_name, target.pen_type);

    let lyric = &analysis.lyric_knn.predictions[song];
    print_neighbors("Lyric neighbors", &corpus, &analysis.lyric_similarity, song, args.k);
    println!("  predicted: {} (correct: {})", lyric.predicted, lyric.correct);

    let emotion = &analysis.emotion_knn.predictions[song];
    print_neighbors("Emotion neighbors", &corpus, &analysis.emotion_distance, song, args.k);
    println!("  predicted: {} (correct: {})", emotion.predicted, emotion.correct);

    println!("\nTree path");
    let tree = &analysis.tree.tree;
    let row = &analysis.feature_rows[song];
    for id in tree.path(row) {
        let node = &tree.nodes()[id];
        match &node.split {
            Some(split) => {
                let value = row[split.feature.column()];
                if !value.is_finite() {
                    println!(
                        "  {}) {} is not finite, stopping with n={} -> {}",
                        id,
                        split.feature.name(),
                        node.size(),
                        node.label()
                    );
                    continue;
                }
                let side = if value < split.threshold { "<" } else { ">=" };
                println!(
                    "  {}) {} = {:.4} {} {:.4}",
                    id,
                    split.feature.name(),
                    value,
                    side,
                    split.threshold
                );
            }
            None => println!("  {}) leaf n={} -> {}", id, node.size(), node.label()),
        }
    }
    let prediction = &analysis.tree.predictions[song];
    println!("  predicted: {} (correct: {})", prediction.label, prediction.label == target.pen_type);

    Ok(())
}
