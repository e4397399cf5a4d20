//! Console progress for the binaries.
//!
//! Progress bars go to stderr through `indicatif`. With `--log-only` they are
//! hidden and batch writers print one plain line per batch instead.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

static LOG_ONLY: AtomicBool = AtomicBool::new(false);

pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// Seconds below a minute, minutes above.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

/// Numbered stdout banner for a pipeline phase.
pub fn phase_banner(number: usize, title: &str) -> String {
    format!("Phase {}: {}", number, title)
}

/// Bar over `len` rows written to one output table.
pub fn create_progress_bar(len: u64, table: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        let style = ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        pb.set_style(style);
    }
    pb.set_message(format!("Writing {}", table));
    pb
}

/// Plain-text batch line, only in log-only mode.
pub fn log_batch(table: &str, written: usize, total: usize) {
    if is_log_only() {
        let pct = if total == 0 {
            100.0
        } else {
            100.0 * written as f64 / total as f64
        };
        eprintln!("[{}] {}/{} ({:.1}%)", table, written, total, pct);
    }
}

/// Spinner for the in-memory analysis, which has no row count.
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        let style = ProgressStyle::default_spinner()
            .template("{msg} {spinner} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb.set_message(msg.to_string());
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
    }

    #[test]
    fn test_phase_banner() {
        assert_eq!(phase_banner(2, "Corpus of 6 labeled songs"), "Phase 2: Corpus of 6 labeled songs");
    }

    #[test]
    fn test_progress_bar_names_table() {
        let pb = create_progress_bar(3, "song_features");
        assert_eq!(pb.message(), "Writing song_features");
        assert_eq!(pb.length(), Some(3));
    }
}
