use std::sync::Arc;
use tracing::info;

use super::{CandidateDiscovery, CandidateList, RaceCoordinator, WatchLink};
use crate::cache::TtlCache;
use crate::metadata::MediaKind;
use crate::normalize::watch_cache_key;

/// Cache role label for logs and metrics.
pub const WATCH_CACHE: &str = "watch";

/// Default cap on candidates handed to the race.
pub const DEFAULT_MAX_CANDIDATES: usize = 20;

/// Cached catalog entry -> working watch page resolution.
#[derive(Clone)]
pub struct WatchLinkResolver {
    discovery: Arc<dyn CandidateDiscovery>,
    race: RaceCoordinator,
    cache: TtlCache<Option<WatchLink>>,
    max_candidates: usize,
}

impl WatchLinkResolver {
    pub fn new(
        discovery: Arc<dyn CandidateDiscovery>,
        race: RaceCoordinator,
        cache: TtlCache<Option<WatchLink>>,
        max_candidates: usize,
    ) -> Self {
        Self {
            discovery,
            race,
            cache,
            max_candidates,
        }
    }

    pub fn cache(&self) -> &TtlCache<Option<WatchLink>> {
        &self.cache
    }

    /// Find a working watch page for one catalog entry.
    ///
    /// The search phrase is the title hint, followed by the year when known.
    /// "No working link" is cached just like a found link.
    pub async fn resolve(
        &self,
        kind: MediaKind,
        tmdb_id: i64,
        title_hint: &str,
        year_hint: Option<&str>,
    ) -> Option<WatchLink> {
        let key = watch_cache_key(kind, tmdb_id);
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }

        let phrase = match year_hint.map(str::trim).filter(|y| !y.is_empty()) {
            Some(year) => format!("{} {}", title_hint.trim(), year),
            None => title_hint.trim().to_string(),
        };

        let discovered = self.discovery.discover(&phrase).await;
        let candidates = CandidateList::from_discovered(discovered, self.max_candidates);
        info!(
            "Racing {} candidates for {:?} ({})",
            candidates.len(),
            phrase,
            key
        );

        let winner = self.race.race(candidates).await;
        self.cache.set(key, winner.clone());
        winner
    }
}
