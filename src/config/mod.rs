//! Configuration
//!
//! Settings load from an optional JSON file with serde defaults; credential
//! fields can be overridden from `PORTIFY_*` environment variables so tokens
//! stay out of the settings file.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Similarity threshold and per-tier result limits.
///
/// The defaults are the empirically chosen constants the engine was tuned
/// with; callers may loosen or tighten them per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchingConfig {
    /// Minimum track similarity for a confident match
    pub threshold: f64,
    /// Result limit for the ISRC tier
    pub isrc_limit: u32,
    /// Result limit for the full-metadata tier
    pub metadata_limit: u32,
    /// Result limit for the primary-artist tier
    pub artist_limit: u32,
    /// Result limit for the fuzzy-name tier (broader query, larger net)
    pub name_limit: u32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            isrc_limit: 10,
            metadata_limit: 10,
            artist_limit: 10,
            name_limit: 20,
        }
    }
}

/// Timeouts and retry/backoff for all catalog HTTP calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub backoff_cap_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            backoff_ms: 300,
            backoff_cap_ms: 10_000,
        }
    }
}

/// Apple Music credentials. The developer token is generated from these at
/// adapter construction; the user token scopes library playlist writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppleMusicConfig {
    pub team_id: String,
    pub key_id: String,
    /// ES256 private key, PEM-encoded
    pub private_key: String,
    pub music_user_token: Option<String>,
    /// Default storefront when the playlist URL does not carry one
    pub storefront: String,
}

impl Default for AppleMusicConfig {
    fn default() -> Self {
        Self {
            team_id: String::new(),
            key_id: String::new(),
            private_key: String::new(),
            music_user_token: None,
            storefront: "us".to_string(),
        }
    }
}

/// Spotify credentials. Obtaining and refreshing the OAuth token is the
/// caller's concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpotifyConfig {
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub matching: MatchingConfig,
    pub http: HttpConfig,
    pub apple_music: AppleMusicConfig,
    pub spotify: SpotifyConfig,
    /// Number of tracks resolved in flight; 1 means strictly sequential
    pub concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            matching: MatchingConfig::default(),
            http: HttpConfig::default(),
            apple_music: AppleMusicConfig::default(),
            spotify: SpotifyConfig::default(),
            concurrency: 1,
        }
    }
}

impl Config {
    /// Load settings from a JSON file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("failed to read settings file {}", p.display()))?;
                serde_json::from_str(&content)
                    .with_context(|| format!("failed to parse settings file {}", p.display()))?
            }
            None => Config::default(),
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("PORTIFY_APPLE_TEAM_ID") {
            self.apple_music.team_id = v;
        }
        if let Ok(v) = std::env::var("PORTIFY_APPLE_KEY_ID") {
            self.apple_music.key_id = v;
        }
        if let Ok(v) = std::env::var("PORTIFY_APPLE_PRIVATE_KEY") {
            self.apple_music.private_key = v;
        }
        if let Ok(v) = std::env::var("PORTIFY_APPLE_MUSIC_USER_TOKEN") {
            self.apple_music.music_user_token = Some(v);
        }
        if let Ok(v) = std::env::var("PORTIFY_SPOTIFY_ACCESS_TOKEN") {
            self.spotify.access_token = v;
        }
    }

    /// Fail fast when credentials required for a run are missing.
    pub fn check_credentials(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.apple_music.team_id.is_empty() {
            missing.push("appleMusic.teamId");
        }
        if self.apple_music.key_id.is_empty() {
            missing.push("appleMusic.keyId");
        }
        if self.apple_music.private_key.is_empty() {
            missing.push("appleMusic.privateKey");
        }
        if self.spotify.access_token.is_empty() {
            missing.push("spotify.accessToken");
        }
        if !missing.is_empty() {
            bail!("missing credentials: {}", missing.join(", "));
        }
        Ok(())
    }
}
