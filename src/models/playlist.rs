//! Playlist and migration-result models

use serde::{Deserialize, Serialize};

use super::{Platform, Track};

/// An ordered list of tracks plus catalog metadata.
///
/// Track order is preserved exactly as the source catalog returned it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub artwork_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Output record of one completed migration run.
///
/// A run that misses some tracks is still a completed run; the misses are
/// reported here rather than raised as errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Destination playlist id
    pub playlist_id: String,
    /// Destination playlist URL, when the catalog returns one synchronously
    pub playlist_url: Option<String>,
    /// Total number of tracks in the source playlist
    pub number_of_tracks: usize,
    /// Source-track snapshots that could not be confidently matched
    pub missed_tracks: Vec<Track>,
    pub source: Platform,
    pub destination: Platform,
}
