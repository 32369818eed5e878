//! Artist-string splitting
//!
//! Catalogs that return a single combined artist string ("A featuring B",
//! "A & B", "A x B") need it broken into an ordered artist list before it
//! can feed search queries or similarity scoring.

/// Separators that mark a boundary between artist names, in priority order.
const SEPARATORS: [&str; 3] = [" featuring ", "&", " x "];

/// Split a combined artist string into individual artist names.
///
/// Each separator occurrence becomes a list boundary; fragments are trimmed
/// and empty ones dropped. Commas already present in the string act as
/// boundaries too, which handles catalog strings like "A, B & C".
pub fn split_artist_string(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }

    let mut joined = raw.to_string();
    for sep in SEPARATORS {
        joined = joined.replace(sep, ",");
    }

    joined
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(String::from)
        .collect()
}
