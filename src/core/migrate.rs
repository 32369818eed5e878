//! Migration orchestration
//!
//! One [`Migrator::migrate`] call moves a playlist from the source catalog to
//! the destination: validate the URL, drain the source playlist, resolve each
//! track through the cache and matcher, then write the destination playlist
//! in batches. A track that fails to resolve is a miss in the result, never
//! an abort; only playlist-level failures end the run.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::MatchingConfig;
use crate::core::matcher::{track_to_mapping, TrackMatcher};
use crate::errors::ServiceError;
use crate::models::{MigrationResult, Track};
use crate::services::http::RetryPolicy;
use crate::services::{parse_playlist_url, CreatedPlaylist, StreamingService};
use crate::stores::{MatchCache, MigrationLog, MigrationRecord, ProgressSink};

pub struct Migrator {
    source: Arc<dyn StreamingService>,
    destination: Arc<dyn StreamingService>,
    cache: Arc<dyn MatchCache>,
    log: Arc<dyn MigrationLog>,
    matching: MatchingConfig,
    retry: RetryPolicy,
    /// Tracks resolved in flight; 1 means strictly sequential
    concurrency: usize,
}

enum Resolution {
    Matched(String),
    Missed(Track),
}

impl Migrator {
    pub fn new(
        source: Arc<dyn StreamingService>,
        destination: Arc<dyn StreamingService>,
        cache: Arc<dyn MatchCache>,
        log: Arc<dyn MigrationLog>,
        matching: MatchingConfig,
        retry: RetryPolicy,
        concurrency: usize,
    ) -> Self {
        Self {
            source,
            destination,
            cache,
            log,
            matching,
            retry,
            concurrency: concurrency.max(1),
        }
    }

    /// Migrate the playlist at `playlist_url` to the destination catalog.
    pub async fn migrate(
        &self,
        playlist_url: &str,
        progress: &dyn ProgressSink,
    ) -> Result<MigrationResult, ServiceError> {
        let source_platform = self.source.platform();
        let dest_platform = self.destination.platform();
        let playlist_ref = parse_playlist_url(source_platform, playlist_url)?;

        info!(
            source = %source_platform,
            destination = %dest_platform,
            playlist = %playlist_ref.id,
            "migration.start"
        );

        let playlist = self
            .source
            .get_playlist(&playlist_ref.id, playlist_ref.storefront.as_deref())
            .await?;
        let total = playlist.tracks.len();

        let matcher = TrackMatcher::new(self.matching.clone());
        let mut resolutions = stream::iter(playlist.tracks.iter())
            .map(|track| self.resolve_one(&matcher, track))
            .buffered(self.concurrency);

        let mut dest_ids = Vec::with_capacity(total);
        let mut missed_tracks = Vec::new();
        let mut done = 0usize;
        while let Some(resolution) = resolutions.next().await {
            match resolution {
                Resolution::Matched(id) => dest_ids.push(id),
                Resolution::Missed(track) => missed_tracks.push(track),
            }
            done += 1;
            progress.report(done, total);
        }

        let description = playlist.description.clone().unwrap_or_else(|| {
            format!(
                "Originally created by {} on {}[{}].",
                playlist.creator.as_deref().unwrap_or("unknown"),
                source_platform,
                playlist.url.as_deref().unwrap_or(playlist_url),
            )
        });

        let created = self
            .create_with_retry(&playlist.name, &description, &dest_ids)
            .await?;

        let record = MigrationRecord {
            name: playlist.name.clone(),
            creator: playlist.creator.clone(),
            artwork_url: playlist.artwork_url.clone(),
            source_url: playlist_url.to_string(),
            destination_url: created.url.clone(),
            created_at: chrono::Utc::now(),
        };
        self.log.record(record.clone());
        info!(
            playlist = %created.id,
            name = %record.name,
            creator = record.creator.as_deref().unwrap_or("unknown"),
            artwork = record.artwork_url.is_some(),
            source_url = %record.source_url,
            destination_url = record.destination_url.as_deref().unwrap_or(""),
            created_at = %record.created_at,
            matched = dest_ids.len(),
            missed = missed_tracks.len(),
            migrations_completed = self.log.completed_count(),
            "migration.done"
        );

        Ok(MigrationResult {
            playlist_id: created.id,
            playlist_url: created.url,
            number_of_tracks: total,
            missed_tracks,
            source: source_platform,
            destination: dest_platform,
        })
    }

    async fn resolve_one(&self, matcher: &TrackMatcher, track: &Track) -> Resolution {
        let source_platform = self.source.platform();
        let dest_platform = self.destination.platform();

        if let Some(hit) = self.cache.get(source_platform, dest_platform, &track.id) {
            return Resolution::Matched(hit.dest_id);
        }

        match matcher
            .resolve_match(self.destination.as_ref(), track, self.cache.as_ref(), None)
            .await
        {
            Ok(Some(found)) => {
                self.cache
                    .upsert(source_platform, dest_platform, &track.id, track_to_mapping(&found));
                Resolution::Matched(found.id)
            }
            Ok(None) => {
                info!(track = %track.name, "migration.track_missed");
                Resolution::Missed(track.clone())
            }
            Err(e) => {
                warn!(track = %track.name, error = %e, "migration.track_error");
                Resolution::Missed(track.clone())
            }
        }
    }

    /// Destination write with the whole-write retry loop. The create call is
    /// idempotent from our side only before the first success, so retries
    /// stop on the first permanent error.
    async fn create_with_retry(
        &self,
        name: &str,
        description: &str,
        dest_ids: &[String],
    ) -> Result<CreatedPlaylist, ServiceError> {
        let mut attempt = 0u32;
        loop {
            match self
                .destination
                .create_playlist(name, Some(description), dest_ids)
                .await
            {
                Ok(created) => return Ok(created),
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    let backoff = self.retry.delay(attempt);
                    warn!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "migration.create_retry"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::models::{Platform, Playlist};
    use crate::stores::{InMemoryMatchCache, InMemoryMigrationLog, NullProgress};

    /// Source catalog serving one fixed playlist.
    struct FakeSource {
        playlist: Playlist,
    }

    #[async_trait]
    impl StreamingService for FakeSource {
        fn platform(&self) -> Platform {
            Platform::Spotify
        }

        async fn get_playlist(
            &self,
            _playlist_id: &str,
            _storefront: Option<&str>,
        ) -> Result<Playlist, ServiceError> {
            Ok(self.playlist.clone())
        }

        async fn search_track(
            &self,
            _query: &str,
            _limit: u32,
            _storefront: Option<&str>,
        ) -> Result<Vec<Track>, ServiceError> {
            unimplemented!("source catalog is never searched")
        }

        async fn search_track_by_isrc(
            &self,
            _isrc: &str,
            _limit: u32,
            _storefront: Option<&str>,
        ) -> Result<Vec<Track>, ServiceError> {
            unimplemented!("source catalog is never searched")
        }

        async fn create_playlist(
            &self,
            _name: &str,
            _description: Option<&str>,
            _track_ids: &[String],
        ) -> Result<CreatedPlaylist, ServiceError> {
            unimplemented!("playlists are created on the destination")
        }
    }

    /// Destination catalog where a known subset of titles is findable.
    struct FakeDestination {
        findable: Vec<Track>,
        created: Mutex<Vec<(String, Vec<String>)>>,
        create_failures_left: Mutex<u32>,
    }

    impl FakeDestination {
        fn new(findable: Vec<Track>) -> Self {
            Self {
                findable,
                created: Mutex::new(Vec::new()),
                create_failures_left: Mutex::new(0),
            }
        }

        fn failing_first(findable: Vec<Track>, failures: u32) -> Self {
            let dest = Self::new(findable);
            *dest.create_failures_left.lock() = failures;
            dest
        }
    }

    #[async_trait]
    impl StreamingService for FakeDestination {
        fn platform(&self) -> Platform {
            Platform::AppleMusic
        }

        async fn get_playlist(
            &self,
            _playlist_id: &str,
            _storefront: Option<&str>,
        ) -> Result<Playlist, ServiceError> {
            unimplemented!("destination playlist is never read back")
        }

        async fn search_track(
            &self,
            query: &str,
            _limit: u32,
            _storefront: Option<&str>,
        ) -> Result<Vec<Track>, ServiceError> {
            Ok(self
                .findable
                .iter()
                .filter(|t| query.contains(&t.name))
                .cloned()
                .collect())
        }

        async fn search_track_by_isrc(
            &self,
            isrc: &str,
            _limit: u32,
            _storefront: Option<&str>,
        ) -> Result<Vec<Track>, ServiceError> {
            Ok(self
                .findable
                .iter()
                .filter(|t| t.isrc.as_deref() == Some(isrc))
                .cloned()
                .collect())
        }

        async fn create_playlist(
            &self,
            name: &str,
            _description: Option<&str>,
            track_ids: &[String],
        ) -> Result<CreatedPlaylist, ServiceError> {
            {
                let mut failures = self.create_failures_left.lock();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(ServiceError::Upstream { status: 503 });
                }
            }
            self.created
                .lock()
                .push((name.to_string(), track_ids.to_vec()));
            Ok(CreatedPlaylist {
                id: "new-playlist".to_string(),
                url: Some("https://music.apple.com/us/playlist/x/pl.1".to_string()),
            })
        }
    }

    fn track(id: &str, name: &str) -> Track {
        let mut t = Track::new(id, name);
        t.artists = vec!["Artist".to_string()];
        t.duration_ms = Some(180_000);
        t
    }

    fn playlist(tracks: Vec<Track>) -> Playlist {
        Playlist {
            id: "37i9dQZF1DXcBWIGoYBM5M".to_string(),
            name: "Road Trip".to_string(),
            tracks,
            creator: Some("someone".to_string()),
            description: None,
            artwork_url: None,
            url: Some("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M".to_string()),
        }
    }

    fn migrator(
        source: Arc<FakeSource>,
        destination: Arc<FakeDestination>,
        retry: RetryPolicy,
    ) -> Migrator {
        Migrator::new(
            source,
            destination,
            Arc::new(InMemoryMatchCache::new()),
            Arc::new(InMemoryMigrationLog::new()),
            MatchingConfig::default(),
            retry,
            1,
        )
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            backoff_ms: 1,
            backoff_cap_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_misses_do_not_abort_the_run() {
        // 10 source tracks, 2 of them unfindable on the destination
        let source_tracks: Vec<Track> = (0..10).map(|i| track(&format!("s{i}"), &format!("Song Number {i}"))).collect();
        let findable: Vec<Track> = source_tracks
            .iter()
            .filter(|t| t.name != "Song Number 3" && t.name != "Song Number 7")
            .map(|t| {
                let mut d = t.clone();
                d.id = format!("d-{}", t.id);
                d
            })
            .collect();

        let source = Arc::new(FakeSource {
            playlist: playlist(source_tracks),
        });
        let destination = Arc::new(FakeDestination::new(findable));
        let m = migrator(source, destination.clone(), fast_retry());

        let result = m
            .migrate(
                "https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M",
                &NullProgress,
            )
            .await
            .unwrap();

        assert_eq!(result.number_of_tracks, 10);
        assert_eq!(result.missed_tracks.len(), 2);
        assert_eq!(result.missed_tracks[0].name, "Song Number 3");
        assert_eq!(result.source, Platform::Spotify);
        assert_eq!(result.destination, Platform::AppleMusic);

        // the destination playlist got the 8 matched tracks, in source order
        let created = destination.created.lock();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].1.len(), 8);
        assert_eq!(created[0].1[0], "d-s0");
    }

    #[tokio::test]
    async fn test_invalid_url_fails_before_any_fetch() {
        let source = Arc::new(FakeSource {
            playlist: playlist(vec![]),
        });
        let destination = Arc::new(FakeDestination::new(vec![]));
        let m = migrator(source, destination, fast_retry());

        let err = m
            .migrate("https://example.com/not-a-playlist", &NullProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_create_retries_transient_failures() {
        let tracks = vec![track("s0", "Song Number 0")];
        let findable = vec![{
            let mut d = tracks[0].clone();
            d.id = "d-s0".to_string();
            d
        }];
        let source = Arc::new(FakeSource {
            playlist: playlist(tracks),
        });
        let destination = Arc::new(FakeDestination::failing_first(findable, 2));
        let m = migrator(source, destination.clone(), fast_retry());

        let result = m
            .migrate(
                "https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M",
                &NullProgress,
            )
            .await
            .unwrap();

        assert_eq!(result.playlist_id, "new-playlist");
        assert_eq!(destination.created.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted_propagates_error() {
        let source = Arc::new(FakeSource {
            playlist: playlist(vec![]),
        });
        // more failures than max_retries allows
        let destination = Arc::new(FakeDestination::failing_first(vec![], 10));
        let m = migrator(source, destination, fast_retry());

        let err = m
            .migrate(
                "https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M",
                &NullProgress,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Upstream { status: 503 }));
    }

    #[tokio::test]
    async fn test_progress_reports_every_track_and_logs_summary() {
        struct Recording(Mutex<Vec<(usize, usize)>>);
        impl ProgressSink for Recording {
            fn report(&self, done: usize, total: usize) {
                self.0.lock().push((done, total));
            }
        }

        let tracks: Vec<Track> = (0..3).map(|i| track(&format!("s{i}"), &format!("Song Number {i}"))).collect();
        let findable: Vec<Track> = tracks
            .iter()
            .map(|t| {
                let mut d = t.clone();
                d.id = format!("d-{}", t.id);
                d
            })
            .collect();
        let source = Arc::new(FakeSource {
            playlist: playlist(tracks),
        });
        let destination = Arc::new(FakeDestination::new(findable));
        let log = Arc::new(InMemoryMigrationLog::new());
        let m = Migrator::new(
            source,
            destination,
            Arc::new(InMemoryMatchCache::new()),
            log.clone(),
            MatchingConfig::default(),
            fast_retry(),
            2,
        );

        let progress = Recording(Mutex::new(Vec::new()));
        m.migrate(
            "https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M",
            &progress,
        )
        .await
        .unwrap();

        assert_eq!(progress.0.lock().clone(), vec![(1, 3), (2, 3), (3, 3)]);
        assert_eq!(log.completed_count(), 1);
        let record = &log.records()[0];
        assert_eq!(record.name, "Road Trip");
        assert_eq!(record.creator.as_deref(), Some("someone"));
        assert_eq!(
            record.source_url,
            "https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M"
        );
        assert!(record.destination_url.is_some());
        assert!(record.artwork_url.is_none());
        assert!(record.created_at <= chrono::Utc::now());
    }

    #[tokio::test]
    async fn test_cached_mapping_skips_resolution() {
        let tracks = vec![track("s0", "Song Number 0")];
        let source = Arc::new(FakeSource {
            playlist: playlist(tracks),
        });
        // destination has nothing findable, only the cache can resolve
        let destination = Arc::new(FakeDestination::new(vec![]));
        let cache = Arc::new(InMemoryMatchCache::new());
        cache.upsert(
            Platform::Spotify,
            Platform::AppleMusic,
            "s0",
            crate::stores::TrackMapping {
                dest_id: "d-cached".to_string(),
                name: "Song Number 0".to_string(),
                artists: vec!["Artist".to_string()],
            },
        );
        let m = Migrator::new(
            source,
            destination.clone(),
            cache,
            Arc::new(InMemoryMigrationLog::new()),
            MatchingConfig::default(),
            fast_retry(),
            1,
        );

        let result = m
            .migrate(
                "https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M",
                &NullProgress,
            )
            .await
            .unwrap();

        assert!(result.missed_tracks.is_empty());
        assert_eq!(destination.created.lock()[0].1, vec!["d-cached".to_string()]);
    }
}
