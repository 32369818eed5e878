//! Streaming-service adapters
//!
//! Each catalog implements the [`StreamingService`] capability interface and
//! maps its own wire format into the unified models. New catalogs are added
//! by implementing the trait, never by branching on a type tag.

pub mod apple_music;
pub mod http;
pub mod spotify;

pub use apple_music::AppleMusicService;
pub use spotify::SpotifyService;

use std::future::Future;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use crate::errors::ServiceError;
use crate::models::{Platform, Playlist, Track};

/// Result of a playlist-creation call.
#[derive(Debug, Clone)]
pub struct CreatedPlaylist {
    pub id: String,
    /// Not every catalog can return a shareable URL synchronously.
    pub url: Option<String>,
}

/// Read/write operations one catalog exposes, in the unified model.
///
/// Pagination and per-service field mapping stay behind this boundary;
/// `get_playlist` always returns the complete track list.
#[async_trait]
pub trait StreamingService: Send + Sync {
    fn platform(&self) -> Platform;

    /// Fetch playlist metadata and all tracks, following the catalog's
    /// pagination cursor until exhausted.
    async fn get_playlist(
        &self,
        playlist_id: &str,
        storefront: Option<&str>,
    ) -> Result<Playlist, ServiceError>;

    /// Free-text track search. An empty result is a valid outcome.
    async fn search_track(
        &self,
        query: &str,
        limit: u32,
        storefront: Option<&str>,
    ) -> Result<Vec<Track>, ServiceError>;

    /// Exact-key search by ISRC. Catalogs without the capability return
    /// [`ServiceError::Unsupported`].
    async fn search_track_by_isrc(
        &self,
        isrc: &str,
        limit: u32,
        storefront: Option<&str>,
    ) -> Result<Vec<Track>, ServiceError>;

    /// Create a playlist seeded with `track_ids`, in order. Ids beyond the
    /// catalog's per-request batch limit are written with follow-up
    /// add-tracks calls; overflow is never dropped. A failed follow-up write
    /// removes the just-created playlist again before the error is returned,
    /// so no partially filled playlist is left on the account.
    async fn create_playlist(
        &self,
        name: &str,
        description: Option<&str>,
        track_ids: &[String],
    ) -> Result<CreatedPlaylist, ServiceError>;
}

/// A validated reference to a playlist on a specific catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistRef {
    pub id: String,
    /// Regional partition, when the URL carries one (Apple Music)
    pub storefront: Option<String>,
}

lazy_static! {
    static ref SPOTIFY_PLAYLIST_URL: Regex =
        Regex::new(r"^https?://open\.spotify\.com/playlist/([A-Za-z0-9]+)").unwrap();
    static ref APPLE_PLAYLIST_URL: Regex =
        Regex::new(r"^https?://music\.apple\.com/([a-z]{2})/playlist/[^/]+/(pl\.[\w.-]+)")
            .unwrap();
}

/// Validate a playlist URL against the expected catalog URL shape.
///
/// Fails fast with [`ServiceError::InvalidInput`] on malformed references.
pub fn parse_playlist_url(platform: Platform, url: &str) -> Result<PlaylistRef, ServiceError> {
    match platform {
        Platform::Spotify => SPOTIFY_PLAYLIST_URL
            .captures(url)
            .map(|caps| PlaylistRef {
                id: caps[1].to_string(),
                storefront: None,
            })
            .ok_or_else(|| {
                ServiceError::InvalidInput(format!("not a Spotify playlist url: {url}"))
            }),
        Platform::AppleMusic => APPLE_PLAYLIST_URL
            .captures(url)
            .map(|caps| PlaylistRef {
                id: caps[2].to_string(),
                storefront: Some(caps[1].to_string()),
            })
            .ok_or_else(|| {
                ServiceError::InvalidInput(format!("not an Apple Music playlist url: {url}"))
            }),
    }
}

/// One page of a paginated catalog response.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the next page; `None` when exhausted
    pub next: Option<String>,
}

/// Collect every page by following `next` cursors until exhausted.
///
/// The first page is fetched by the caller; `fetch_next` is invoked once per
/// remaining cursor. Item order is preserved across pages.
pub async fn drain_pages<T, F, Fut>(first: Page<T>, mut fetch_next: F) -> Result<Vec<T>, ServiceError>
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = Result<Page<T>, ServiceError>>,
{
    let mut items = first.items;
    let mut cursor = first.next;

    while let Some(next) = cursor {
        let page = fetch_next(next).await?;
        items.extend(page.items);
        cursor = page.next;
    }

    Ok(items)
}

/// Split `ids` into write batches of at most `limit`, preserving order.
pub fn track_id_batches(ids: &[String], limit: usize) -> Vec<&[String]> {
    ids.chunks(limit).collect()
}

/// Create a playlist and append `track_ids` to it in batches of `limit`.
///
/// When `seed_create` is set the create call receives the first batch;
/// catalogs whose create endpoint takes no tracks get an empty seed and
/// every batch goes through `add_tracks`. If any append fails, the playlist
/// just created is removed again through `cleanup` (best effort) before the
/// error propagates, so no partially filled playlist survives the run.
pub async fn batched_playlist_write<CFut, AFut, DFut>(
    track_ids: &[String],
    limit: usize,
    seed_create: bool,
    create: impl FnOnce(Vec<String>) -> CFut,
    mut add_tracks: impl FnMut(String, Vec<String>) -> AFut,
    cleanup: impl FnOnce(String) -> DFut,
) -> Result<CreatedPlaylist, ServiceError>
where
    CFut: Future<Output = Result<CreatedPlaylist, ServiceError>>,
    AFut: Future<Output = Result<(), ServiceError>>,
    DFut: Future<Output = Result<(), ServiceError>>,
{
    let batches = track_id_batches(track_ids, limit);
    let (seed, rest) = if seed_create {
        batches
            .split_first()
            .map_or((Vec::new(), &[][..]), |(first, rest)| (first.to_vec(), rest))
    } else {
        (Vec::new(), &batches[..])
    };

    let created = create(seed).await?;

    for batch in rest {
        if let Err(e) = add_tracks(created.id.clone(), batch.to_vec()).await {
            if let Err(cleanup_err) = cleanup(created.id.clone()).await {
                warn!(playlist = %created.id, error = %cleanup_err, "playlist.cleanup_failed");
            }
            return Err(e);
        }
    }

    Ok(created)
}
