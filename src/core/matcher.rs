//! Track resolution against a destination catalog
//!
//! Resolution walks a fallback chain from the most precise key to the
//! broadest: ISRC lookup, then sanitized title with the full artist list,
//! then title with the primary artist only, then title alone. Each tier
//! short-circuits as soon as a candidate clears the similarity threshold.

use tracing::debug;

use crate::config::MatchingConfig;
use crate::core::sanitize::sanitize_track_name;
use crate::core::similarity::track_similarity;
use crate::errors::ServiceError;
use crate::models::Track;
use crate::services::StreamingService;
use crate::stores::{MatchCache, TrackMapping};

pub struct TrackMatcher {
    matching: MatchingConfig,
}

impl TrackMatcher {
    pub fn new(matching: MatchingConfig) -> Self {
        Self { matching }
    }

    /// Resolve `source_track` to its counterpart on `destination`.
    ///
    /// Returns `Ok(None)` when no candidate clears the threshold; per-tier
    /// search errors propagate, except an [`ServiceError::Unsupported`] ISRC
    /// tier which is skipped silently.
    pub async fn resolve_match(
        &self,
        destination: &dyn StreamingService,
        source_track: &Track,
        cache: &dyn MatchCache,
        storefront: Option<&str>,
    ) -> Result<Option<Track>, ServiceError> {
        if let Some(isrc) = source_track.isrc.as_deref() {
            if let Some(hit) = cache.get_isrc(destination.platform(), isrc) {
                debug!(isrc, dest_id = %hit.dest_id, "match.isrc_cache_hit");
                return Ok(Some(mapping_to_track(&hit)));
            }

            match destination
                .search_track_by_isrc(isrc, self.matching.isrc_limit, storefront)
                .await
            {
                Ok(candidates) => {
                    if let Some(found) = self.best_match(source_track, candidates, "isrc") {
                        cache.upsert_isrc(destination.platform(), isrc, track_to_mapping(&found));
                        return Ok(Some(found));
                    }
                }
                Err(ServiceError::Unsupported(_)) => {}
                Err(e) => return Err(e),
            }
        }

        let title = sanitize_track_name(&source_track.name);

        if !source_track.artists.is_empty() {
            let query = format!("{} {}", title, source_track.artists.join(" "));
            let candidates = destination
                .search_track(&query, self.matching.metadata_limit, storefront)
                .await?;
            if let Some(found) = self.best_match(source_track, candidates, "metadata") {
                return Ok(Some(found));
            }
        }

        if let Some(primary) = source_track.primary_artist() {
            let query = format!("{title} {primary}");
            let candidates = destination
                .search_track(&query, self.matching.artist_limit, storefront)
                .await?;
            if let Some(found) = self.best_match(source_track, candidates, "artist") {
                return Ok(Some(found));
            }
        }

        let candidates = destination
            .search_track(&title, self.matching.name_limit, storefront)
            .await?;
        Ok(self.best_match(source_track, candidates, "name"))
    }

    /// Best-scoring candidate above the threshold, earliest result winning
    /// ties. Catalogs rank by their own relevance; we respect that ordering.
    fn best_match(&self, source_track: &Track, candidates: Vec<Track>, tier: &str) -> Option<Track> {
        let mut best: Option<(f64, Track)> = None;
        for candidate in candidates {
            let score = track_similarity(source_track, &candidate);
            match &best {
                Some((top, _)) if score <= *top => {}
                _ => best = Some((score, candidate)),
            }
        }

        match best {
            Some((score, track)) if score >= self.matching.threshold => {
                debug!(tier, score, track = %track.name, "match.accepted");
                Some(track)
            }
            Some((score, _)) => {
                debug!(tier, best_score = score, "match.below_threshold");
                None
            }
            None => None,
        }
    }
}

fn mapping_to_track(mapping: &TrackMapping) -> Track {
    let mut track = Track::new(mapping.dest_id.clone(), mapping.name.clone());
    track.artists = mapping.artists.clone();
    track
}

pub(crate) fn track_to_mapping(track: &Track) -> TrackMapping {
    TrackMapping {
        dest_id: track.id.clone(),
        name: track.name.clone(),
        artists: track.artists.clone(),
    }
}
