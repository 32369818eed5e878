//! Stores and sinks the engine reports into
//!
//! The orchestrator talks to these through trait objects so the in-memory
//! implementations here can be swapped for persistent ones without touching
//! the engine. Store writes never fail; a lost cache entry or summary row
//! must not abort a migration.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::info;

use crate::models::Platform;

/// A remembered source-track to destination-track resolution.
#[derive(Debug, Clone)]
pub struct TrackMapping {
    /// Track id on the destination catalog
    pub dest_id: String,
    pub name: String,
    pub artists: Vec<String>,
}

/// Cache of resolved track matches, keyed per catalog pair.
///
/// Entries are also memoized by ISRC so a recording resolved once is found
/// again even when its source-catalog id differs.
pub trait MatchCache: Send + Sync {
    fn get(&self, source: Platform, destination: Platform, source_track_id: &str)
        -> Option<TrackMapping>;

    fn upsert(
        &self,
        source: Platform,
        destination: Platform,
        source_track_id: &str,
        mapping: TrackMapping,
    );

    fn get_isrc(&self, destination: Platform, isrc: &str) -> Option<TrackMapping>;

    fn upsert_isrc(&self, destination: Platform, isrc: &str, mapping: TrackMapping);
}

/// Process-local match cache.
#[derive(Debug, Default)]
pub struct InMemoryMatchCache {
    by_track: DashMap<String, TrackMapping>,
    by_isrc: DashMap<String, TrackMapping>,
}

impl InMemoryMatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn track_key(source: Platform, destination: Platform, source_track_id: &str) -> String {
        format!("{source}:{destination}:{source_track_id}")
    }

    fn isrc_key(destination: Platform, isrc: &str) -> String {
        format!("{destination}:{isrc}")
    }
}

impl MatchCache for InMemoryMatchCache {
    fn get(
        &self,
        source: Platform,
        destination: Platform,
        source_track_id: &str,
    ) -> Option<TrackMapping> {
        self.by_track
            .get(&Self::track_key(source, destination, source_track_id))
            .map(|entry| entry.clone())
    }

    fn upsert(
        &self,
        source: Platform,
        destination: Platform,
        source_track_id: &str,
        mapping: TrackMapping,
    ) {
        self.by_track
            .insert(Self::track_key(source, destination, source_track_id), mapping);
    }

    fn get_isrc(&self, destination: Platform, isrc: &str) -> Option<TrackMapping> {
        self.by_isrc
            .get(&Self::isrc_key(destination, isrc))
            .map(|entry| entry.clone())
    }

    fn upsert_isrc(&self, destination: Platform, isrc: &str, mapping: TrackMapping) {
        self.by_isrc.insert(Self::isrc_key(destination, isrc), mapping);
    }
}

/// Summary row written after a successful migration.
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub name: String,
    pub creator: Option<String>,
    pub artwork_url: Option<String>,
    pub source_url: String,
    pub destination_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Sink for completed-migration records and the running counter.
pub trait MigrationLog: Send + Sync {
    fn record(&self, record: MigrationRecord);

    /// Total migrations recorded so far.
    fn completed_count(&self) -> u64;
}

/// Process-local migration log.
#[derive(Debug, Default)]
pub struct InMemoryMigrationLog {
    records: Mutex<Vec<MigrationRecord>>,
}

impl InMemoryMigrationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<MigrationRecord> {
        self.records.lock().clone()
    }
}

impl MigrationLog for InMemoryMigrationLog {
    fn record(&self, record: MigrationRecord) {
        self.records.lock().push(record);
    }

    fn completed_count(&self) -> u64 {
        self.records.lock().len() as u64
    }
}

/// Receiver for per-track progress during a run.
pub trait ProgressSink: Send + Sync {
    /// Called once per processed track with (done, total).
    fn report(&self, done: usize, total: usize);
}

/// Drops progress on the floor.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _done: usize, _total: usize) {}
}

/// Emits progress through the log stream.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, done: usize, total: usize) {
        info!(done, total, "migration.progress");
    }
}
