//! Apple Music adapter
//!
//! Catalog reads use a developer token (ES256 JWT signed from the configured
//! key); library playlist writes additionally require a Music User Token.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{header, Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::{AppleMusicConfig, HttpConfig};
use crate::errors::ServiceError;
use crate::models::{Platform, Playlist, Track};
use crate::services::http::{build_client, send_json, send_ok, RetryPolicy};
use crate::services::{batched_playlist_write, drain_pages, CreatedPlaylist, Page, StreamingService};
use crate::utils::artists::split_artist_string;

const API_BASE: &str = "https://api.music.apple.com";

/// Developer tokens are valid for 12 hours per Apple's token guidelines.
const TOKEN_TTL_HOURS: i64 = 12;

/// Library playlist writes accept at most 100 tracks per request.
const BATCH_LIMIT: usize = 100;

#[derive(Debug, Serialize)]
struct DeveloperTokenClaims {
    iss: String,
    iat: i64,
    exp: i64,
}

pub struct AppleMusicService {
    http: Client,
    policy: RetryPolicy,
    developer_token: String,
    music_user_token: Option<String>,
    default_storefront: String,
}

impl AppleMusicService {
    pub fn new(cfg: &AppleMusicConfig, http_cfg: &HttpConfig) -> Result<Self, ServiceError> {
        Ok(Self {
            http: build_client(http_cfg)?,
            policy: RetryPolicy::from_config(http_cfg),
            developer_token: generate_developer_token(cfg)?,
            music_user_token: cfg.music_user_token.clone(),
            default_storefront: cfg.storefront.clone(),
        })
    }

    fn storefront<'a>(&'a self, hint: Option<&'a str>) -> &'a str {
        hint.unwrap_or(&self.default_storefront)
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let mut request = self
            .http
            .get(url)
            .bearer_auth(&self.developer_token)
            .header(header::ACCEPT, "application/json");
        if let Some(token) = &self.music_user_token {
            request = request.header("Music-User-Token", token);
        }
        request
    }

    fn write(&self, builder: RequestBuilder) -> Result<RequestBuilder, ServiceError> {
        let token = self.music_user_token.as_ref().ok_or(ServiceError::Unsupported(
            "library playlist writes without a Music User Token",
        ))?;
        Ok(builder
            .bearer_auth(&self.developer_token)
            .header("Music-User-Token", token))
    }

    fn post(&self, url: &str) -> Result<RequestBuilder, ServiceError> {
        self.write(self.http.post(url))
    }

    fn delete(&self, url: &str) -> Result<RequestBuilder, ServiceError> {
        self.write(self.http.delete(url))
    }

    async fn create_seeded(
        &self,
        name: &str,
        description: Option<&str>,
        seed: Vec<String>,
    ) -> Result<CreatedPlaylist, ServiceError> {
        let mut attributes = json!({ "name": name });
        if let Some(desc) = description {
            attributes["description"] = json!(desc);
        }
        let payload = json!({
            "attributes": attributes,
            "relationships": {
                "tracks": { "data": song_refs(&seed) }
            }
        });

        let url = format!("{API_BASE}/v1/me/library/playlists");
        let envelope: LibraryPlaylistEnvelope =
            send_json(self.post(&url)?.json(&payload), &self.policy).await?;
        let playlist_id = envelope
            .data
            .into_iter()
            .next()
            .map(|r| r.id)
            .ok_or_else(|| ServiceError::BadResponse("create playlist returned no data".into()))?;

        // library playlists get no shareable catalog url synchronously
        Ok(CreatedPlaylist {
            id: playlist_id,
            url: None,
        })
    }

    async fn append_tracks(
        &self,
        playlist_id: String,
        batch: Vec<String>,
    ) -> Result<(), ServiceError> {
        debug!(playlist = %playlist_id, count = batch.len(), "apple.add_tracks");
        let url = format!("{API_BASE}/v1/me/library/playlists/{playlist_id}/tracks");
        let payload = json!({ "data": song_refs(&batch) });
        send_ok(self.post(&url)?.json(&payload), &self.policy).await
    }

    async fn delete_library_playlist(&self, playlist_id: String) -> Result<(), ServiceError> {
        debug!(playlist = %playlist_id, "apple.delete_playlist");
        let url = format!("{API_BASE}/v1/me/library/playlists/{playlist_id}");
        send_ok(self.delete(&url)?, &self.policy).await
    }

    async fn fetch_track_page(&self, path_or_url: String) -> Result<Page<SongResource>, ServiceError> {
        // pagination cursors come back as relative paths
        let url = if path_or_url.starts_with("http") {
            path_or_url
        } else {
            format!("{API_BASE}{path_or_url}")
        };
        let envelope: SongPage = send_json(self.get(&url), &self.policy).await?;
        Ok(Page {
            items: envelope.data,
            next: envelope.next,
        })
    }
}

fn generate_developer_token(cfg: &AppleMusicConfig) -> Result<String, ServiceError> {
    let now = Utc::now();
    let claims = DeveloperTokenClaims {
        iss: cfg.team_id.clone(),
        iat: now.timestamp(),
        exp: (now + ChronoDuration::hours(TOKEN_TTL_HOURS)).timestamp(),
    };

    let mut header = Header::new(Algorithm::ES256);
    header.kid = Some(cfg.key_id.clone());

    let key = EncodingKey::from_ec_pem(cfg.private_key.as_bytes())
        .map_err(|e| ServiceError::InvalidInput(format!("apple music private key: {e}")))?;

    jsonwebtoken::encode(&header, &claims, &key)
        .map_err(|e| ServiceError::InvalidInput(format!("apple music developer token: {e}")))
}

#[async_trait]
impl StreamingService for AppleMusicService {
    fn platform(&self) -> Platform {
        Platform::AppleMusic
    }

    async fn get_playlist(
        &self,
        playlist_id: &str,
        storefront: Option<&str>,
    ) -> Result<Playlist, ServiceError> {
        let storefront = self.storefront(storefront);
        let url = format!("{API_BASE}/v1/catalog/{storefront}/playlists/{playlist_id}");
        let envelope: PlaylistEnvelope = send_json(self.get(&url), &self.policy).await?;

        let resource = envelope
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::BadResponse("playlist response had no data".into()))?;

        let attrs = resource.attributes;
        let first_page = Page {
            items: resource.relationships.tracks.data,
            next: resource.relationships.tracks.next,
        };
        let songs = drain_pages(first_page, |cursor| self.fetch_track_page(cursor)).await?;
        let tracks = songs.into_iter().map(song_to_track).collect();

        Ok(Playlist {
            id: playlist_id.to_string(),
            name: attrs.name,
            tracks,
            creator: attrs.curator_name,
            description: attrs.description.and_then(|d| d.short.or(d.standard)),
            artwork_url: attrs.artwork.and_then(artwork_url),
            url: attrs.url,
        })
    }

    async fn search_track(
        &self,
        query: &str,
        limit: u32,
        storefront: Option<&str>,
    ) -> Result<Vec<Track>, ServiceError> {
        let storefront = self.storefront(storefront);
        let url = format!("{API_BASE}/v1/catalog/{storefront}/search");
        let request = self.get(&url).query(&[
            ("term", query),
            ("types", "songs"),
            ("limit", &limit.to_string()),
        ]);

        let envelope: SearchEnvelope = send_json(request, &self.policy).await?;
        let songs = envelope
            .results
            .and_then(|r| r.songs)
            .map(|s| s.data)
            .unwrap_or_default();

        Ok(songs.into_iter().map(song_to_track).collect())
    }

    async fn search_track_by_isrc(
        &self,
        isrc: &str,
        limit: u32,
        storefront: Option<&str>,
    ) -> Result<Vec<Track>, ServiceError> {
        let storefront = self.storefront(storefront);
        let url = format!("{API_BASE}/v1/catalog/{storefront}/songs");
        let request = self.get(&url).query(&[("filter[isrc]", isrc)]);

        let envelope: SongPage = send_json(request, &self.policy).await?;
        Ok(envelope
            .data
            .into_iter()
            .take(limit as usize)
            .map(song_to_track)
            .collect())
    }

    async fn create_playlist(
        &self,
        name: &str,
        description: Option<&str>,
        track_ids: &[String],
    ) -> Result<CreatedPlaylist, ServiceError> {
        batched_playlist_write(
            track_ids,
            BATCH_LIMIT,
            true,
            |seed| self.create_seeded(name, description, seed),
            |id, batch| self.append_tracks(id, batch),
            |id| self.delete_library_playlist(id),
        )
        .await
    }
}

fn song_refs(ids: &[String]) -> Vec<serde_json::Value> {
    ids.iter()
        .map(|id| json!({ "id": id, "type": "songs" }))
        .collect()
}

/// Map a catalog song resource into the unified track model.
fn song_to_track(song: SongResource) -> Track {
    let attrs = song.attributes;
    Track {
        id: song.id,
        name: attrs.name,
        artists: split_artist_string(&attrs.artist_name),
        album: attrs.album_name,
        duration_ms: attrs.duration_in_millis,
        isrc: attrs.isrc,
        release_date: attrs.release_date,
    }
}

fn artwork_url(artwork: Artwork) -> Option<String> {
    let url = artwork.url?;
    // the url is a template with {w}/{h} placeholders
    Some(
        url.replace("{w}", &artwork.width.unwrap_or(600).to_string())
            .replace("{h}", &artwork.height.unwrap_or(600).to_string()),
    )
}

// ---- wire types -----------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PlaylistEnvelope {
    data: Vec<PlaylistResource>,
}

#[derive(Debug, Deserialize)]
struct PlaylistResource {
    attributes: PlaylistAttributes,
    relationships: PlaylistRelationships,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistAttributes {
    name: String,
    #[serde(default)]
    curator_name: Option<String>,
    #[serde(default)]
    description: Option<DescriptionAttribute>,
    #[serde(default)]
    artwork: Option<Artwork>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DescriptionAttribute {
    #[serde(default)]
    short: Option<String>,
    #[serde(default)]
    standard: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Artwork {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PlaylistRelationships {
    tracks: SongPage,
}

#[derive(Debug, Deserialize)]
struct SongPage {
    #[serde(default)]
    data: Vec<SongResource>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SongResource {
    id: String,
    attributes: SongAttributes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SongAttributes {
    name: String,
    #[serde(default)]
    artist_name: String,
    #[serde(default)]
    album_name: Option<String>,
    #[serde(default)]
    duration_in_millis: Option<u64>,
    #[serde(default)]
    isrc: Option<String>,
    #[serde(default)]
    release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    results: Option<SearchResults>,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default)]
    songs: Option<SongPage>,
}

#[derive(Debug, Deserialize)]
struct LibraryPlaylistEnvelope {
    data: Vec<LibraryPlaylistResource>,
}

#[derive(Debug, Deserialize)]
struct LibraryPlaylistResource {
    id: String,
}
