//! Spotify adapter
//!
//! All calls carry the configured OAuth bearer token. ISRC search rides the
//! regular search endpoint with an `isrc:` field filter; playlist creation
//! needs the current user's id first.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::{HttpConfig, SpotifyConfig};
use crate::errors::ServiceError;
use crate::models::{Platform, Playlist, Track};
use crate::services::http::{build_client, send_json, send_ok, RetryPolicy};
use crate::services::{batched_playlist_write, drain_pages, CreatedPlaylist, Page, StreamingService};

const API_BASE: &str = "https://api.spotify.com/v1";

/// The add-items endpoint accepts at most 100 URIs per request.
const BATCH_LIMIT: usize = 100;

pub struct SpotifyService {
    http: Client,
    policy: RetryPolicy,
    access_token: String,
}

impl SpotifyService {
    pub fn new(cfg: &SpotifyConfig, http_cfg: &HttpConfig) -> Result<Self, ServiceError> {
        Ok(Self {
            http: build_client(http_cfg)?,
            policy: RetryPolicy::from_config(http_cfg),
            access_token: cfg.access_token.clone(),
        })
    }

    fn get(&self, url: &str) -> RequestBuilder {
        self.http.get(url).bearer_auth(&self.access_token)
    }

    fn post(&self, url: &str) -> RequestBuilder {
        self.http.post(url).bearer_auth(&self.access_token)
    }

    async fn fetch_item_page(&self, url: String) -> Result<Page<PlaylistItem>, ServiceError> {
        let page: ItemPage = send_json(self.get(&url), &self.policy).await?;
        Ok(Page {
            items: page.items,
            next: page.next,
        })
    }

    async fn current_user_id(&self) -> Result<String, ServiceError> {
        let me: UserObject = send_json(self.get(&format!("{API_BASE}/me")), &self.policy).await?;
        Ok(me.id)
    }

    async fn create_empty(
        &self,
        user_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<CreatedPlaylist, ServiceError> {
        let mut payload = json!({ "name": name, "public": false });
        if let Some(desc) = description {
            payload["description"] = json!(desc);
        }
        let url = format!("{API_BASE}/users/{user_id}/playlists");
        let created: CreatedPlaylistObject =
            send_json(self.post(&url).json(&payload), &self.policy).await?;

        Ok(CreatedPlaylist {
            url: created.external_urls.and_then(|u| u.spotify),
            id: created.id,
        })
    }

    async fn append_uris(&self, playlist_id: String, batch: Vec<String>) -> Result<(), ServiceError> {
        debug!(playlist = %playlist_id, count = batch.len(), "spotify.add_tracks");
        let url = format!("{API_BASE}/playlists/{playlist_id}/tracks");
        let payload = json!({ "uris": batch });
        send_ok(self.post(&url).json(&payload), &self.policy).await
    }

    /// Removing an own playlist on this catalog is unfollowing it.
    async fn unfollow_playlist(&self, playlist_id: String) -> Result<(), ServiceError> {
        debug!(playlist = %playlist_id, "spotify.unfollow_playlist");
        let url = format!("{API_BASE}/playlists/{playlist_id}/followers");
        send_ok(self.http.delete(&url).bearer_auth(&self.access_token), &self.policy).await
    }
}

#[async_trait]
impl StreamingService for SpotifyService {
    fn platform(&self) -> Platform {
        Platform::Spotify
    }

    async fn get_playlist(
        &self,
        playlist_id: &str,
        _storefront: Option<&str>,
    ) -> Result<Playlist, ServiceError> {
        let url = format!("{API_BASE}/playlists/{playlist_id}");
        let object: PlaylistObject = send_json(self.get(&url), &self.policy).await?;

        let first_page = Page {
            items: object.tracks.items,
            next: object.tracks.next,
        };
        // subsequent cursors are absolute URLs
        let items = drain_pages(first_page, |cursor| self.fetch_item_page(cursor)).await?;

        // local files and removed tracks come back as null or id-less items
        let tracks = items
            .into_iter()
            .filter_map(|item| item.track)
            .filter_map(track_object_to_track)
            .collect();

        Ok(Playlist {
            id: playlist_id.to_string(),
            name: object.name,
            tracks,
            creator: object.owner.and_then(|o| o.display_name),
            description: object.description.filter(|d| !d.is_empty()),
            artwork_url: object.images.into_iter().next().map(|i| i.url),
            url: object.external_urls.and_then(|u| u.spotify),
        })
    }

    async fn search_track(
        &self,
        query: &str,
        limit: u32,
        _storefront: Option<&str>,
    ) -> Result<Vec<Track>, ServiceError> {
        let request = self.get(&format!("{API_BASE}/search")).query(&[
            ("q", query),
            ("type", "track"),
            ("limit", &limit.to_string()),
        ]);

        let envelope: SearchEnvelope = send_json(request, &self.policy).await?;
        let items = envelope.tracks.map(|t| t.items).unwrap_or_default();
        Ok(items.into_iter().filter_map(track_object_to_track).collect())
    }

    async fn search_track_by_isrc(
        &self,
        isrc: &str,
        limit: u32,
        storefront: Option<&str>,
    ) -> Result<Vec<Track>, ServiceError> {
        self.search_track(&format!("isrc:{isrc}"), limit, storefront)
            .await
    }

    async fn create_playlist(
        &self,
        name: &str,
        description: Option<&str>,
        track_ids: &[String],
    ) -> Result<CreatedPlaylist, ServiceError> {
        let user_id = self.current_user_id().await?;
        let uris: Vec<String> = track_ids
            .iter()
            .map(|id| format!("spotify:track:{id}"))
            .collect();

        // the create endpoint takes no tracks, every batch is an append
        batched_playlist_write(
            &uris,
            BATCH_LIMIT,
            false,
            |_seed| self.create_empty(&user_id, name, description),
            |id, batch| self.append_uris(id, batch),
            |id| self.unfollow_playlist(id),
        )
        .await
    }
}

/// Map a track object into the unified model, dropping id-less entries.
fn track_object_to_track(object: TrackObject) -> Option<Track> {
    let id = object.id?;
    let mut track = Track::new(id, object.name);
    track.artists = object.artists.into_iter().map(|a| a.name).collect();
    track.album = object.album.as_ref().map(|a| a.name.clone());
    track.duration_ms = object.duration_ms;
    track.isrc = object.external_ids.and_then(|ids| ids.isrc);
    track.release_date = object.album.and_then(|a| a.release_date);
    Some(track)
}

// ---- wire types -----------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PlaylistObject {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    owner: Option<UserObject>,
    #[serde(default)]
    images: Vec<ImageObject>,
    #[serde(default)]
    external_urls: Option<ExternalUrls>,
    tracks: ItemPage,
}

#[derive(Debug, Deserialize)]
struct UserObject {
    #[serde(default)]
    id: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageObject {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ExternalUrls {
    #[serde(default)]
    spotify: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemPage {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    #[serde(default)]
    track: Option<TrackObject>,
}

#[derive(Debug, Deserialize)]
struct TrackObject {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    artists: Vec<ArtistObject>,
    #[serde(default)]
    album: Option<AlbumObject>,
    #[serde(default)]
    duration_ms: Option<u64>,
    #[serde(default)]
    external_ids: Option<ExternalIds>,
}

#[derive(Debug, Deserialize)]
struct ArtistObject {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlbumObject {
    name: String,
    #[serde(default)]
    release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    #[serde(default)]
    isrc: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    tracks: Option<TrackPage>,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<TrackObject>,
}

#[derive(Debug, Deserialize)]
struct CreatedPlaylistObject {
    id: String,
    #[serde(default)]
    external_urls: Option<ExternalUrls>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_object_mapping() {
        let object: TrackObject = serde_json::from_value(json!({
            "id": "6rqhFgbbKwnb9MLmUQDhG6",
            "name": "Free Trial",
            "artists": [{ "name": "Lil Yachty" }, { "name": "Guest" }],
            "album": { "name": "Lil Boat 2", "release_date": "2018-03-09" },
            "duration_ms": 181000u64,
            "external_ids": { "isrc": "USUM71900001" }
        }))
        .unwrap();

        let track = track_object_to_track(object).unwrap();
        assert_eq!(track.id, "6rqhFgbbKwnb9MLmUQDhG6");
        assert_eq!(track.artists, vec!["Lil Yachty", "Guest"]);
        assert_eq!(track.album.as_deref(), Some("Lil Boat 2"));
        assert_eq!(track.isrc.as_deref(), Some("USUM71900001"));
        assert_eq!(track.release_date.as_deref(), Some("2018-03-09"));
    }

    #[test]
    fn test_idless_track_is_dropped() {
        // local files have a null id
        let object: TrackObject = serde_json::from_value(json!({
            "id": null,
            "name": "Home Recording"
        }))
        .unwrap();
        assert!(track_object_to_track(object).is_none());
    }

    #[test]
    fn test_playlist_object_tolerates_null_items() {
        let object: PlaylistObject = serde_json::from_value(json!({
            "name": "Mix",
            "tracks": {
                "items": [
                    { "track": null },
                    { "track": { "id": "a", "name": "Kept" } }
                ],
                "next": null
            }
        }))
        .unwrap();

        let kept: Vec<Track> = object
            .tracks
            .items
            .into_iter()
            .filter_map(|i| i.track)
            .filter_map(track_object_to_track)
            .collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "Kept");
    }
}
