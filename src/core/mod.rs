//! Core migration engine: sanitizing, scoring, matching, orchestration

pub mod matcher;
pub mod migrate;
pub mod sanitize;
pub mod similarity;

pub use matcher::TrackMatcher;
pub use migrate::Migrator;
