//! Cache key derivation.
//!
//! Every key into the metadata cache goes through [`normalize_query`], both
//! for raw user text and for canonical catalog titles, so an exact-title
//! query reuses metadata cached by an earlier fuzzy query.

use crate::metadata::MediaKind;

/// Lowercase, trim and collapse internal whitespace runs to a single space.
pub fn normalize_query(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Key of the watch-link cache for one catalog entry, e.g. `tmdb:movie:603`.
pub fn watch_cache_key(kind: MediaKind, tmdb_id: i64) -> String {
    format!("tmdb:{}:{}", kind.as_str(), tmdb_id)
}
