//! Track-name sanitizing
//!
//! Catalog titles frequently carry qualifiers that hurt both search recall
//! and similarity scoring: "Free Trial (feat. X) [Explicit]", "Loving Cup -
//! (Live At The Beacon Theatre)". This is a best-effort heuristic, not a
//! parser; any input produces some output.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // leftmost parenthesized or bracketed span
    static ref BRACKETED_SPAN: Regex = Regex::new(r"\(.*?\)|\[.*?\]").unwrap();
}

/// Strip bracketed noise and trailing dash-suffixes from a track title.
///
/// Removes only the first `(...)` or `[...]` span, then keeps the text
/// before the first `-`. A clean title comes back trimmed and otherwise
/// unchanged.
pub fn sanitize_track_name(name: &str) -> String {
    let stripped = BRACKETED_SPAN.replacen(name, 1, "");
    let before_dash = stripped.split('-').next().unwrap_or("");
    before_dash.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_title_unchanged() {
        assert_eq!(sanitize_track_name("Free Trial"), "Free Trial");
    }

    #[test]
    fn test_bracket_and_dash_stripping() {
        assert_eq!(
            sanitize_track_name("Loving Cup - (Live At The Beacon Theatre)"),
            "Loving Cup"
        );
    }

    #[test]
    fn test_only_first_span_removed() {
        // second bracketed span survives; one span only, by contract
        assert_eq!(
            sanitize_track_name("Free Trial (feat. X) [Explicit]"),
            "Free Trial  [Explicit]"
        );
    }

    #[test]
    fn test_square_brackets() {
        assert_eq!(sanitize_track_name("Song [Remastered]"), "Song");
    }

    #[test]
    fn test_dash_suffix() {
        assert_eq!(sanitize_track_name("Song - 2011 Remaster"), "Song");
    }

    #[test]
    fn test_whitespace_trimmed() {
        assert_eq!(sanitize_track_name("  Song  "), "Song");
    }

    #[test]
    fn test_unbalanced_brackets_accepted() {
        // malformed input never panics, any result is accepted
        assert_eq!(sanitize_track_name("Song (unclosed"), "Song (unclosed");
    }
}
