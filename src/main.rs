use anyhow::{Context, Result};
use clap::Parser;
use rusqlite::Connection;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use pen_types::dataset::build_corpus;
use pen_types::error::{DataQualityNote, VectorSpace};
use pen_types::lexicon::{EmotionLexicon, Lexicons, SentimentLexicon};
use pen_types::models::{PenType, RunStats};
use pen_types::pipeline::{analyze, Analysis, PipelineConfig};
use pen_types::progress::{create_spinner, format_duration, phase_banner, set_log_only};
use pen_types::safety::{validate_output_path, OUTPUT_PATTERN};
use pen_types::store::{read_membership_lists, read_songs, write_analysis};
use pen_types::tree::{SplitCriterion, TreeParams};

#[derive(Parser)]
#[command(name = "pen-types")]
#[command(about = "Classify songs into pen types from audio features and lyrics")]
struct Args {
    /// Source SQLite database with `songs` and `pen_lists` tables
    source: PathBuf,

    /// Output SQLite database (name must contain "classified")
    output: PathBuf,

    /// Neighbors per nearest-neighbor vote
    #[arg(long, default_value = "2")]
    k: usize,

    /// Smallest node the tree will split
    #[arg(long, default_value = "10")]
    min_split: usize,

    /// Smallest child a split may produce
    #[arg(long, default_value = "5")]
    min_leaf: usize,

    /// Impurity floor for splitting a node, as a fraction of the root impurity
    #[arg(long, default_value = "0.01")]
    min_dev: f64,

    #[arg(long, value_enum, default_value = "deviance")]
    criterion: SplitCriterion,

    /// Track names to leave out (comma-separated, matched by normalized name)
    #[arg(long)]
    exclude: Option<String>,

    /// Sentiment lexicon TSV (word, weight) replacing the built-in one
    #[arg(long)]
    sentiment_lexicon: Option<PathBuf>,

    /// Emotion lexicon TSV (word, category) replacing the built-in one
    #[arg(long)]
    emotion_lexicon: Option<PathBuf>,

    /// Write run statistics JSON to this path
    #[arg(long)]
    stats_json: Option<PathBuf>,

    /// Write the full analysis report JSON to this path
    #[arg(long)]
    report_json: Option<PathBuf>,

    /// Hide progress bars, print plain log lines
    #[arg(long)]
    log_only: bool,
}

fn count_degenerate(notes: &[DataQualityNote], wanted: VectorSpace) -> usize {
    notes
        .iter()
        .filter(|n| matches!(n, DataQualityNote::DegenerateVector { space, .. } if *space == wanted))
        .count()
}

fn print_summary(analysis: &Analysis) {
    println!("\n{:=<60}", "");
    println!("Lyric nearest neighbors (k={})", analysis.config.k);
    println!("  Error rate: {:.3}", analysis.lyric_knn.evaluation.error_rate);
    print!("{}", analysis.lyric_knn.evaluation.confusion);

    println!("\nEmotion nearest neighbors (k={})", analysis.config.k);
    println!("  Error rate: {:.3}", analysis.emotion_knn.evaluation.error_rate);
    print!("{}", analysis.emotion_knn.evaluation.confusion);

    println!("\nDecision tree (in-sample)");
    println!("  Error rate: {:.3}", analysis.tree.evaluation.error_rate);
    print!("{}", analysis.tree.evaluation.confusion);
    print!("{}", analysis.tree.tree.render());

    println!("\nBaseline (majority class) error: {:.3}", analysis.baseline_error);

    if let Some(first) = analysis.pca.components.first() {
        let top: Vec<String> = first
            .top_features(3)
            .iter()
            .map(|(name, loading)| format!("{}={:.2}", name, loading))
            .collect();
        println!(
            "PC1 explains {:.1}% of variance: {}",
            100.0 * first.explained_variance,
            top.join(", ")
        );
    }
    println!("{:=<60}", "");
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
    set_log_only(args.log_only);

    let mut protected = vec![args.source.as_path()];
    protected.extend(args.sentiment_lexicon.as_deref());
    protected.extend(args.emotion_lexicon.as_deref());
    validate_output_path(&args.output, OUTPUT_PATTERN, &protected)?;

    let start = Instant::now();
    let mut stats = RunStats::default();

    let sentiment = match &args.sentiment_lexicon {
        Some(path) => SentimentLexicon::load(path).context("Failed to load sentiment lexicon")?,
        None => SentimentLexicon::builtin().clone(),
    };
    let emotions = match &args.emotion_lexicon {
        Some(path) => EmotionLexicon::load(path).context("Failed to load emotion lexicon")?,
        None => EmotionLexicon::builtin().clone(),
    };
    let lexicons = Lexicons {
        sentiment: &sentiment,
        emotions: &emotions,
    };

    println!("Opening source database: {:?}", args.source);
    let source_conn = Connection::open(&args.source).context("Failed to open source database")?;
    let rows = read_songs(&source_conn).context("Failed to read songs")?;
    let lists = read_membership_lists(&source_conn).context("Failed to read pen-type lists")?;
    drop(source_conn);
    stats.source_rows = rows.len();
    println!(
        "{}",
        phase_banner(1, &format!("Read {} songs, {} list entries", rows.len(), lists.total()))
    );

    let exclusions: Vec<String> = args
        .exclude
        .as_deref()
        .map(|s| s.split(',').map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect())
        .unwrap_or_default();

    let built = build_corpus(rows, &lists, &exclusions).context("Failed to build labeled corpus")?;
    stats.excluded_rows = built.excluded;
    stats.duplicate_rows = built.duplicates;
    stats.corpus_size = built.corpus.len();
    stats.unmatched_list_entries = built
        .notes
        .iter()
        .filter(|n| n.kind() == "unmatched_list_entry")
        .count();
    let distribution: Vec<String> = PenType::ALL
        .iter()
        .zip(built.corpus.label_counts())
        .map(|(pen, count)| format!("{} {}", pen, count))
        .collect();
    println!(
        "{}",
        phase_banner(
            2,
            &format!("Corpus of {} labeled songs ({})", built.corpus.len(), distribution.join(", "))
        )
    );
    stats.log_phase("corpus");

    let config = PipelineConfig {
        k: args.k,
        tree: TreeParams {
            criterion: args.criterion,
            min_split: args.min_split,
            min_leaf: args.min_leaf,
            min_dev: args.min_dev,
        },
    };

    let spinner = create_spinner(&phase_banner(3, "Scoring similarity and fitting tree"));
    let mut analysis = analyze(&built.corpus, &config, &lexicons).context("Analysis failed")?;
    spinner.finish_with_message(phase_banner(3, "Analysis complete"));

    let mut notes = built.notes.clone();
    notes.append(&mut analysis.notes);
    analysis.notes = notes;

    stats.vocabulary_size = analysis.vocabulary_size;
    stats.degenerate_lyric_vectors = count_degenerate(&analysis.notes, VectorSpace::LyricTerms);
    stats.degenerate_emotion_vectors = count_degenerate(&analysis.notes, VectorSpace::Emotions);
    stats.unscoreable_songs = analysis.notes.iter().filter(|n| n.kind() == "unscoreable").count();
    stats.lyric_knn_error = analysis.lyric_knn.evaluation.error_rate;
    stats.emotion_knn_error = analysis.emotion_knn.evaluation.error_rate;
    stats.tree_error = analysis.tree.evaluation.error_rate;
    stats.baseline_error = analysis.baseline_error;
    stats.tree_nodes = analysis.tree.tree.nodes().len();
    stats.tree_leaves = analysis.tree.tree.leaf_count();

    for note in &analysis.notes {
        println!("  note: {}", note);
    }

    if args.output.exists() {
        std::fs::remove_file(&args.output).context("Failed to remove existing output file")?;
    }
    println!("{}", phase_banner(4, &format!("Writing output database {:?}", args.output)));
    let mut output_conn = Connection::open(&args.output).context("Failed to create output database")?;
    write_analysis(&mut output_conn, &built.corpus, &analysis).context("Failed to write output")?;

    if let Some(path) = &args.report_json {
        let json = serde_json::to_string_pretty(&analysis)?;
        std::fs::write(path, json).context("Failed to write report JSON")?;
    }

    print_summary(&analysis);

    stats.elapsed_seconds = start.elapsed().as_secs_f64();
    stats.log_phase("final");
    if let Some(path) = &args.stats_json {
        stats.write_to_file(path).context("Failed to write stats JSON")?;
    }

    println!("Done in {}", format_duration(start.elapsed()));
    Ok(())
}
