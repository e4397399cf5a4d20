//! Shared normalization functions for track identifiers and lyric text.
//! Used by dataset construction (identifier keys) and the vectorizer (lyric cleanup).

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Title variant patterns stripped from identifier keys (applied in order).
/// Re-recordings and remasters collapse onto the same key so deduplication can catch them.
pub static TITLE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Re-recording markers: "(Taylor's Version)", "[Artist's Version]"
        Regex::new(r"(?i)\s*[\(\[][^)\]]*'s\s+version[\)\]]").unwrap(),
        // Vault tracks: "(From The Vault)"
        Regex::new(r"(?i)\s*[\(\[]from\s+the\s+vault[\)\]]").unwrap(),
        // Remaster variants: "- Remastered 2021", "(2021 Remaster)"
        Regex::new(r"(?i)\s*[-–—/]\s*(?:remaster(?:ed)?(?:\s+\d{4})?|(?:\d{4}\s+)?remaster(?:ed)?)").unwrap(),
        Regex::new(r"(?i)\s*[\(\[](?:remaster(?:ed)?(?:\s+\d{4})?|(?:\d{4}\s+)?remaster(?:ed)?)[\)\]]").unwrap(),
        // Mix/version variants: "(Radio Edit)", "[Album Version]", "- Single Version"
        Regex::new(r"(?i)\s*[\(\[](?:radio\s+edit|single\s+version|album\s+version|pop\s+version|original\s+mix)[\)\]]").unwrap(),
        Regex::new(r"(?i)\s*[-–—]\s*(?:radio\s+edit|single\s+version|album\s+version|pop\s+version)\s*$").unwrap(),
        // Featured artists: "(feat. Artist)", "[ft. Someone]"
        Regex::new(r"(?i)\s*[\(\[](?:feat\.?|ft\.?|featuring)\s+[^)\]]+[\)\]]").unwrap(),
    ]
});

/// Bracketed lyric section markers: "[Chorus]", "[Verse 2: Artist]", "[Bridge]".
pub static SECTION_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]\n]*\]").unwrap());

/// Regex to collapse multiple whitespace into single space
pub static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

fn is_combining_mark(c: char) -> bool {
    matches!(c, '\u{0300}'..='\u{036F}' | '\u{1AB0}'..='\u{1AFF}' |
             '\u{1DC0}'..='\u{1DFF}' | '\u{20D0}'..='\u{20FF}' |
             '\u{FE20}'..='\u{FE2F}')
}

/// Strip diacritics, transliterate remaining non-ASCII, and lowercase.
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    any_ascii(&stripped).to_lowercase()
}

/// Replace typographic quotes with their ASCII forms.
pub fn normalize_punctuation(s: &str) -> String {
    s.replace(['\u{2018}', '\u{2019}', '\u{02BC}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{00B4}', '\u{0060}'], "'")
        .replace(['\u{2013}', '\u{2014}'], "-")
}

/// Identifier key for a track name. Two names with the same key are the same song.
pub fn track_key(track_name: &str) -> String {
    let mut result = normalize_punctuation(track_name);
    for pattern in TITLE_PATTERNS.iter() {
        result = pattern.replace_all(&result, "").to_string();
    }
    let folded = fold_to_ascii(&result);
    MULTI_SPACE.replace_all(folded.trim(), " ").to_string()
}

/// Prepare raw lyric text for tokenization: ASCII quotes, no section markers.
pub fn clean_lyrics(lyrics: &str) -> String {
    let text = normalize_punctuation(lyrics);
    SECTION_MARKER.replace_all(&text, " ").to_string()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_key_basic() {
        assert_eq!(track_key("Love Story"), "love story");
        assert_eq!(track_key("  All   Too Well "), "all too well");
        assert_eq!(track_key("Champagne Problems"), track_key("champagne problems"));
    }

    #[test]
    fn test_track_key_strips_variants() {
        assert_eq!(track_key("Love Story (Taylor’s Version)"), "love story");
        assert_eq!(track_key("Mr. Perfectly Fine (Taylor's Version) (From The Vault)"), "mr. perfectly fine");
        assert_eq!(track_key("Style - Remastered 2021"), "style");
        assert_eq!(track_key("Exile (feat. Bon Iver)"), "exile");
        assert_eq!(track_key("Teardrops On My Guitar - Pop Version"), "teardrops on my guitar");
    }

    #[test]
    fn test_track_key_punctuation_and_diacritics() {
        assert_eq!(track_key("Don’t Blame Me"), "don't blame me");
        assert_eq!(track_key("Café"), "cafe");
    }

    #[test]
    fn test_fold_to_ascii() {
        assert_eq!(fold_to_ascii("Björk"), "bjork");
        assert_eq!(fold_to_ascii("Beyoncé"), "beyonce");
    }

    #[test]
    fn test_clean_lyrics_strips_section_markers() {
        let cleaned = clean_lyrics("[Verse 1]\nWe’re happy\n[Chorus: Both]\nFree");
        assert!(!cleaned.contains("Verse"));
        assert!(!cleaned.contains("Chorus"));
        assert!(cleaned.contains("We're happy"));
        assert!(cleaned.contains("Free"));
    }
}
