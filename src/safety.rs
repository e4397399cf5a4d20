//! Guards for the report database path.
//!
//! `pen-types` deletes and recreates its output on every run. The output
//! must be marked as a classification report by name and must not resolve
//! to the song database or a lexicon file.

use anyhow::{bail, Result};
use std::path::Path;

/// Marker every report filename carries.
pub const OUTPUT_PATTERN: &str = "classified";

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    matches!((a.canonicalize(), b.canonicalize()), (Ok(x), Ok(y)) if x == y)
}

/// Refuse to overwrite anything that is not clearly a report database.
pub fn validate_output_path(output: &Path, required_pattern: &str, protected: &[&Path]) -> Result<()> {
    let name = output.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if !name.contains(required_pattern) {
        bail!(
            "Refusing to write report '{}': filename must contain '{}'",
            output.display(),
            required_pattern
        );
    }

    if let Some(input) = protected.iter().find(|p| same_file(output, p)) {
        bail!(
            "Refusing to write report '{}': it is the input file '{}'",
            output.display(),
            input.display()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_report_name_accepted() {
        let report = PathBuf::from("/tmp/eras-classified.sqlite3");
        let songs = PathBuf::from("/data/eras.sqlite3");
        assert!(validate_output_path(&report, OUTPUT_PATTERN, &[&songs]).is_ok());
    }

    #[test]
    fn test_report_name_without_marker_rejected() {
        let report = PathBuf::from("/tmp/eras-report.sqlite3");
        let err = validate_output_path(&report, OUTPUT_PATTERN, &[]).unwrap_err();
        assert!(err.to_string().contains("must contain 'classified'"));
    }

    #[test]
    fn test_report_over_song_database_rejected() {
        let songs = PathBuf::from("/data/eras-classified.sqlite3");
        let err = validate_output_path(&songs, OUTPUT_PATTERN, &[&songs]).unwrap_err();
        assert!(err.to_string().contains("it is the input file"));
    }

    #[test]
    fn test_report_over_lexicon_through_dot_path_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let lexicon = dir.path().join("emotions-classified.tsv");
        std::fs::write(&lexicon, b"joy\tjoy\n").unwrap();
        let songs = dir.path().join("eras.sqlite3");
        let indirect = dir.path().join(".").join("emotions-classified.tsv");
        assert!(validate_output_path(&indirect, OUTPUT_PATTERN, &[&songs, &lexicon]).is_err());
    }
}
