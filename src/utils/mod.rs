//! Utility modules

pub mod artists;
