use crate::{
    cache::TtlCache,
    config::Config,
    error::Result,
    history::HistoryStore,
    metadata::{
        CatalogClient, MetadataResolver, TmdbClient, resolver::METADATA_CACHE,
    },
    service::TitleService,
    watch::{
        CandidateDiscovery, DuckDuckGoDiscovery, HttpLinkValidator, LinkValidator,
        RaceCoordinator, WatchLinkResolver, resolver::WATCH_CACHE,
    },
};
use metrics_exporter_prometheus::PrometheusHandle;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Query handling with both resolvers and the history store
    pub service: TitleService,
    /// Prometheus render handle (absent when no recorder is installed)
    pub metrics: Option<PrometheusHandle>,
    pub started_at: Instant,
}

impl AppState {
    /// Create state backed by the real TMDB, DuckDuckGo and HTTP prober.
    pub fn new(config: Config) -> Result<Self> {
        // Shared client for catalog and search calls
        let http_client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()?;

        let catalog = TmdbClient::new(
            http_client.clone(),
            config.tmdb_api_key.clone(),
            config.tmdb_base_url.clone(),
        )
        .with_image_base(config.tmdb_image_base.clone())
        .with_timeout(config.catalog_timeout());

        let discovery = DuckDuckGoDiscovery::new(http_client)
            .with_endpoint(config.discovery_url.clone())
            .with_query_template(config.discovery_query_template.clone())
            .with_max_results(config.discovery_max_results);

        let validator = HttpLinkValidator::new(config.probe_timeout(), config.allow_private_hosts)?;

        Self::with_collaborators(
            config,
            Arc::new(catalog),
            Arc::new(discovery),
            Arc::new(validator),
        )
    }

    /// Create state around caller-supplied collaborators.
    ///
    /// Builds both caches, the race coordinator and the history store from
    /// `config`; fails if any of them rejects its settings.
    pub fn with_collaborators(
        config: Config,
        catalog: Arc<dyn CatalogClient>,
        discovery: Arc<dyn CandidateDiscovery>,
        validator: Arc<dyn LinkValidator>,
    ) -> Result<Self> {
        config.validate()?;

        let metadata_cache = TtlCache::new(
            METADATA_CACHE,
            config.metadata_cache_ttl(),
            config.metadata_cache_capacity,
        )?;
        let watch_cache = TtlCache::new(
            WATCH_CACHE,
            config.watch_cache_ttl(),
            config.watch_cache_capacity,
        )?;

        let metadata = MetadataResolver::new(
            catalog,
            metadata_cache,
            config.primary_language.clone(),
            config.fallback_language.clone(),
        );

        let race = RaceCoordinator::new(validator, config.race_concurrency, config.probe_timeout())?;
        let watch = WatchLinkResolver::new(discovery, race, watch_cache, config.max_candidates);

        let service = TitleService::new(metadata, watch, HistoryStore::new(config.history_limit));

        Ok(Self {
            config: Arc::new(config),
            service,
            metrics: None,
            started_at: Instant::now(),
        })
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
