//! Track model

use serde::{Deserialize, Serialize};

/// One recording, normalized across catalogs.
///
/// `id` is only unique within the catalog that returned it. Every field
/// except `id` and `name` is optional; consumers must treat absence as
/// "no evidence", never as a mismatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Catalog-scoped track id
    pub id: String,
    /// Display title as returned by the catalog (not sanitized)
    pub name: String,
    /// Artist names in catalog order; the first entry is the primary artist
    #[serde(default)]
    pub artists: Vec<String>,
    /// Album name
    #[serde(default)]
    pub album: Option<String>,
    /// Duration in milliseconds
    #[serde(default)]
    pub duration_ms: Option<u64>,
    /// International standard recording code
    #[serde(default)]
    pub isrc: Option<String>,
    /// Release date, informational only
    #[serde(default)]
    pub release_date: Option<String>,
}

impl Track {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            artists: Vec::new(),
            album: None,
            duration_ms: None,
            isrc: None,
            release_date: None,
        }
    }

    /// Duration in whole seconds, when known.
    pub fn length_seconds(&self) -> Option<u64> {
        self.duration_ms.map(|ms| ms / 1000)
    }

    /// Primary artist, when any artist is known.
    pub fn primary_artist(&self) -> Option<&str> {
        self.artists.first().map(String::as_str)
    }

    /// Album as a zero-or-one element slice, for pairwise comparisons.
    pub fn albums(&self) -> &[String] {
        self.album.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_seconds_is_integer_division() {
        let mut track = Track::new("1", "Song");
        track.duration_ms = Some(183_999);
        assert_eq!(track.length_seconds(), Some(183));

        track.duration_ms = None;
        assert_eq!(track.length_seconds(), None);
    }

    #[test]
    fn test_albums_slice() {
        let mut track = Track::new("1", "Song");
        assert!(track.albums().is_empty());

        track.album = Some("Album".into());
        assert_eq!(track.albums(), ["Album".to_string()]);
    }

    #[test]
    fn test_primary_artist_is_first() {
        let mut track = Track::new("1", "Song");
        assert_eq!(track.primary_artist(), None);

        track.artists = vec!["Main".into(), "Feature".into()];
        assert_eq!(track.primary_artist(), Some("Main"));
    }
}
