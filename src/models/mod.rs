//! Unified data models shared by every catalog adapter

pub mod playlist;
pub mod track;

pub use playlist::{MigrationResult, Playlist};
pub use track::Track;

use serde::{Deserialize, Serialize};

/// A streaming catalog we can read from or write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    AppleMusic,
    Spotify,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::AppleMusic => "apple-music",
            Platform::Spotify => "spotify",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_display() {
        assert_eq!(Platform::AppleMusic.to_string(), "apple-music");
        assert_eq!(Platform::Spotify.to_string(), "spotify");
    }
}
