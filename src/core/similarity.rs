//! Fuzzy track similarity scoring
//!
//! Decides whether two tracks from different catalogs represent the same
//! recording. String comparison is case-insensitive Jaro-Winkler with a hard
//! veto on qualifier terms, so a studio track never matches its own remix on
//! name similarity alone.

use strsim::jaro_winkler;

use crate::models::Track;

/// Terms that change what recording a title refers to. When exactly one of
/// two strings contains such a term, their similarity is forced to zero.
const QUALIFIER_TERMS: [&str; 7] = [
    "instrumental",
    "remix",
    "cover",
    "live",
    "version",
    "edit",
    "nightcore",
];

/// Feature weights for the final weighted average.
const NAME_WEIGHT: f64 = 50.0;
const ARTISTS_WEIGHT: f64 = 30.0;
const ALBUM_WEIGHT: f64 = 20.0;
const LENGTH_WEIGHT: f64 = 20.0;

/// Gap in seconds beyond which durations contribute nothing.
const MAX_LENGTH_GAP_SECS: u64 = 5;

/// Case-insensitive string similarity in [0, 1] with the qualifier veto.
pub fn string_similarity(s1: &str, s2: &str) -> f64 {
    let a = s1.to_lowercase();
    let b = s2.to_lowercase();

    for term in QUALIFIER_TERMS {
        if a.contains(term) != b.contains(term) {
            return 0.0;
        }
    }

    jaro_winkler(&a, &b)
}

/// Maximum pairwise score over the full cross-product of two lists.
///
/// Rewards any single strong match (a shared featured artist, say) without
/// penalizing extra members on either side.
pub fn pairwise_max<S, T>(list_a: &[S], list_b: &[T], f: impl Fn(&str, &str) -> f64) -> f64
where
    S: AsRef<str>,
    T: AsRef<str>,
{
    let mut max = 0.0f64;
    for a in list_a {
        for b in list_b {
            max = max.max(f(a.as_ref(), b.as_ref()));
        }
    }
    max
}

fn artists_similarity(artists_a: &[String], artists_b: &[String]) -> f64 {
    // an empty list is no evidence, not a mismatch
    if artists_a.is_empty() || artists_b.is_empty() {
        return 0.5;
    }
    pairwise_max(artists_a, artists_b, string_similarity)
}

fn length_similarity(secs_a: u64, secs_b: u64) -> f64 {
    let gap = secs_a.abs_diff(secs_b);
    if gap > MAX_LENGTH_GAP_SECS {
        return 0.0;
    }
    1.0 - gap as f64 / MAX_LENGTH_GAP_SECS as f64
}

/// Match confidence between two tracks, in [0, 1].
///
/// Each feature is scored only when both tracks carry it; the result is the
/// weighted average over available features. With no shared features the
/// score is 0.
pub fn track_similarity(track_a: &Track, track_b: &Track) -> f64 {
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;

    if !track_a.name.is_empty() && !track_b.name.is_empty() {
        weighted_sum += string_similarity(&track_a.name, &track_b.name) * NAME_WEIGHT;
        total_weight += NAME_WEIGHT;
    }

    if !track_a.artists.is_empty() && !track_b.artists.is_empty() {
        weighted_sum += artists_similarity(&track_a.artists, &track_b.artists) * ARTISTS_WEIGHT;
        total_weight += ARTISTS_WEIGHT;
    }

    if !track_a.albums().is_empty() && !track_b.albums().is_empty() {
        weighted_sum +=
            pairwise_max(track_a.albums(), track_b.albums(), string_similarity) * ALBUM_WEIGHT;
        total_weight += ALBUM_WEIGHT;
    }

    if let (Some(len_a), Some(len_b)) = (track_a.length_seconds(), track_b.length_seconds()) {
        weighted_sum += length_similarity(len_a, len_b) * LENGTH_WEIGHT;
        total_weight += LENGTH_WEIGHT;
    }

    if total_weight == 0.0 {
        return 0.0;
    }

    weighted_sum / total_weight
}

/// Whether two tracks clear the similarity threshold.
pub fn same_track(track_a: &Track, track_b: &Track, threshold: f64) -> bool {
    track_similarity(track_a, track_b) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(name: &str, artists: &[&str], album: Option<&str>, duration_ms: Option<u64>) -> Track {
        let mut t = Track::new("id", name);
        t.artists = artists.iter().map(|a| a.to_string()).collect();
        t.album = album.map(String::from);
        t.duration_ms = duration_ms;
        t
    }

    #[test]
    fn test_qualifier_veto() {
        assert_eq!(string_similarity("Song (Remix)", "Song"), 0.0);
        assert!(string_similarity("Song (Remix)", "Song (Remix)") > 0.9);
        assert_eq!(string_similarity("Song", "Song (Live)"), 0.0);
        assert_eq!(string_similarity("Song (Instrumental)", "Song"), 0.0);
    }

    #[test]
    fn test_string_similarity_case_insensitive() {
        assert!((string_similarity("HELLO", "hello") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pairwise_max_takes_best_pair() {
        let a = ["Main Artist", "Guest"];
        let b = ["Someone Else", "Guest"];
        let score = pairwise_max(&a, &b, string_similarity);
        assert!((score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_artist_list_is_neutral() {
        let a: Vec<String> = vec![];
        let b = vec!["Artist".to_string()];
        assert_eq!(artists_similarity(&a, &b), 0.5);
    }

    #[test]
    fn test_length_similarity_linear_decay() {
        // 3s gap: 1 - 3/5
        assert!((length_similarity(180, 183) - 0.4).abs() < f64::EPSILON);
        // 6s gap: beyond the window
        assert_eq!(length_similarity(180, 186), 0.0);
        assert!((length_similarity(180, 180) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_length_feature_from_duration_ms() {
        let a = track("Song", &["Artist"], None, Some(180_000));
        let b = track("Song", &["Artist"], None, Some(183_000));
        // name and artists are perfect, length scores 0.4
        let expected = (1.0 * 50.0 + 1.0 * 30.0 + 0.4 * 20.0) / 100.0;
        assert!((track_similarity(&a, &b) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_absent_features_are_skipped() {
        let a = track("Song", &[], None, None);
        let b = track("Song", &["Artist"], Some("Album"), Some(200_000));
        // only the name feature is shared
        assert!((track_similarity(&a, &b) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_no_shared_features_scores_zero() {
        let a = track("", &[], None, None);
        let b = track("Song", &["Artist"], None, None);
        assert_eq!(track_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_similarity_bounds_and_symmetry() {
        let tracks = vec![
            track("Free Trial", &["Lil Yachty"], Some("Lil Boat 2"), Some(181_000)),
            track("Free Trial (Remix)", &["Lil Yachty", "Guest"], None, Some(190_000)),
            track("Loving Cup", &["The Rolling Stones"], Some("Exile"), None),
            track("", &[], None, None),
        ];

        for a in &tracks {
            for b in &tracks {
                let s = track_similarity(a, b);
                assert!((0.0..=1.0).contains(&s), "score {s} out of bounds");
                let r = track_similarity(b, a);
                assert!((s - r).abs() < 1e-12, "asymmetric: {s} vs {r}");
            }
        }
    }

    #[test]
    fn test_same_track_threshold() {
        let a = track("Free Trial", &["Lil Yachty"], Some("Lil Boat 2"), Some(181_000));
        let b = track("Free Trial", &["Lil Yachty"], Some("Lil Boat 2"), Some(181_000));
        assert!(same_track(&a, &b, 0.7));

        let c = track("Completely Different", &["Nobody"], None, None);
        assert!(!same_track(&a, &c, 0.7));
    }
}
