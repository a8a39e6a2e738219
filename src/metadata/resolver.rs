use std::sync::Arc;
use tracing::{debug, info};

use super::{CatalogClient, CatalogHit, MetadataRecord};
use crate::cache::TtlCache;
use crate::normalize::normalize_query;

/// Cache role label for logs and metrics.
pub const METADATA_CACHE: &str = "metadata";

/// Cached query -> metadata resolution.
///
/// Both found and not-found outcomes are cached for the TTL window. A found
/// record is also stored under its normalized canonical title, so a later
/// exact-title query is served from cache.
#[derive(Clone)]
pub struct MetadataResolver {
    catalog: Arc<dyn CatalogClient>,
    cache: TtlCache<Option<MetadataRecord>>,
    primary_language: String,
    fallback_language: String,
}

impl MetadataResolver {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        cache: TtlCache<Option<MetadataRecord>>,
        primary_language: impl Into<String>,
        fallback_language: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            cache,
            primary_language: primary_language.into(),
            fallback_language: fallback_language.into(),
        }
    }

    pub fn cache(&self) -> &TtlCache<Option<MetadataRecord>> {
        &self.cache
    }

    /// Resolve a raw user query. Blank queries resolve to `None` without
    /// touching the cache or the catalog.
    pub async fn resolve(&self, raw_query: &str) -> Option<MetadataRecord> {
        let key = normalize_query(raw_query);
        if key.is_empty() {
            return None;
        }

        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }

        let found = self.lookup(raw_query.trim()).await;

        self.cache.set(key, found.clone());
        if let Some(record) = &found {
            self.cache
                .set(normalize_query(&record.title), Some(record.clone()));
            info!(
                "Resolved {:?} to {} ({}) id={} kind={}",
                raw_query,
                record.title,
                record.year.as_deref().unwrap_or("-"),
                record.tmdb_id,
                record.kind
            );
        } else {
            info!("No catalog match for {:?}", raw_query);
        }

        found
    }

    /// Primary-language search, fallback-language search if nothing usable
    /// came back, then details enrichment of the first match.
    ///
    /// A failed primary search looks the same as an empty one, so transient
    /// errors also trigger the fallback search.
    async fn lookup(&self, query: &str) -> Option<MetadataRecord> {
        let mut matched = None;
        for language in [&self.primary_language, &self.fallback_language] {
            let hits = self.catalog.search(query, language).await;
            matched = first_title(hits, query);
            if matched.is_some() {
                debug!("Catalog match for {:?} in {}", query, language);
                break;
            }
        }
        let matched = matched?;

        let enriched = self
            .catalog
            .details(matched.kind, matched.tmdb_id)
            .await
            .and_then(|hit| hit.into_record(&matched.title));

        Some(enriched.unwrap_or(matched))
    }
}

/// First hit that is a movie or a show with an id, in provider order.
fn first_title(hits: Vec<CatalogHit>, query: &str) -> Option<MetadataRecord> {
    hits.into_iter().find_map(|hit| hit.into_record(query))
}
