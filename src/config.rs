use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CinelinkError, Result};
use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::metadata::tmdb;
use crate::watch::{discovery, race, resolver, validator};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub is_dev: bool,
    /// TMDB v3 API key (required in prod)
    pub tmdb_api_key: String,
    pub tmdb_base_url: String,
    /// Prefix for poster paths
    pub tmdb_image_base: String,
    /// Catalog search language tried first (default: ru-RU)
    pub primary_language: String,
    /// Catalog search language tried when the first one finds nothing (default: en-US)
    pub fallback_language: String,
    /// Per-call timeout for catalog requests in milliseconds (default: 4000)
    pub catalog_timeout_ms: u64,
    pub metadata_cache_ttl_secs: u64,
    pub metadata_cache_capacity: usize,
    pub watch_cache_ttl_secs: u64,
    pub watch_cache_capacity: usize,
    /// Search endpoint used for candidate discovery
    pub discovery_url: String,
    /// Search phrase template; `{query}` is replaced by "title year"
    pub discovery_query_template: String,
    /// Max links taken from one search (default: 4)
    pub discovery_max_results: usize,
    /// Max candidates handed to the race (default: 20)
    pub max_candidates: usize,
    /// Probes in flight at once (default: 8)
    pub race_concurrency: usize,
    /// Per-probe timeout in milliseconds (default: 3500)
    pub probe_timeout_ms: u64,
    /// Let the prober fetch private/loopback IP literals (default: false)
    pub allow_private_hosts: bool,
    /// History entries kept per user (default: 100)
    pub history_limit: usize,
    /// How often expired cache entries are swept, in seconds (default: 60)
    pub cache_sweep_secs: u64,
}

impl Default for Config {
    /// Dev defaults with no API key.
    fn default() -> Self {
        Self {
            port: 3000,
            is_dev: true,
            tmdb_api_key: String::new(),
            tmdb_base_url: tmdb::DEFAULT_BASE_URL.to_string(),
            tmdb_image_base: tmdb::DEFAULT_IMAGE_BASE.to_string(),
            primary_language: "ru-RU".to_string(),
            fallback_language: "en-US".to_string(),
            catalog_timeout_ms: tmdb::DEFAULT_TIMEOUT.as_millis() as u64,
            metadata_cache_ttl_secs: 30 * 60,
            metadata_cache_capacity: 512,
            watch_cache_ttl_secs: 30 * 60,
            watch_cache_capacity: 1024,
            discovery_url: discovery::DEFAULT_ENDPOINT.to_string(),
            discovery_query_template: discovery::DEFAULT_QUERY_TEMPLATE.to_string(),
            discovery_max_results: discovery::DEFAULT_MAX_RESULTS,
            max_candidates: resolver::DEFAULT_MAX_CANDIDATES,
            race_concurrency: race::DEFAULT_CONCURRENCY,
            probe_timeout_ms: validator::DEFAULT_PROBE_TIMEOUT.as_millis() as u64,
            allow_private_hosts: false,
            history_limit: DEFAULT_HISTORY_LIMIT,
            cache_sweep_secs: 60,
        }
    }
}

/// Parse an env var, falling back to `default` when unset or unparsable.
fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn string_or(key: &str, default: String) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    /// In DEV mode, provides sensible defaults. In PROD mode, PORT and TMDB_API_KEY are required.
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let is_dev = parse_or("DEV_MODE", false);

        // Port: required in prod, defaults to 3000 in dev
        let port = match env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| CinelinkError::Config(format!("PORT is not a valid port: {raw}")))?,
            Err(_) if is_dev => defaults.port,
            Err(_) => {
                return Err(CinelinkError::Config(
                    "PORT is required in production".to_string(),
                ));
            }
        };

        // API key: required in prod, empty in dev (catalog lookups then find nothing)
        let tmdb_api_key = env::var("TMDB_API_KEY")
            .map(|k| k.trim().to_string())
            .unwrap_or_default();
        if tmdb_api_key.is_empty() && !is_dev {
            return Err(CinelinkError::Config(
                "TMDB_API_KEY is required in production".to_string(),
            ));
        }

        let config = Config {
            port,
            is_dev,
            tmdb_api_key,
            tmdb_base_url: string_or("TMDB_BASE_URL", defaults.tmdb_base_url),
            tmdb_image_base: string_or("TMDB_IMAGE_BASE", defaults.tmdb_image_base),
            primary_language: string_or("PRIMARY_LANGUAGE", defaults.primary_language),
            fallback_language: string_or("FALLBACK_LANGUAGE", defaults.fallback_language),
            catalog_timeout_ms: parse_or("CATALOG_TIMEOUT_MS", defaults.catalog_timeout_ms),
            metadata_cache_ttl_secs: parse_or(
                "METADATA_CACHE_TTL_SECS",
                defaults.metadata_cache_ttl_secs,
            ),
            metadata_cache_capacity: parse_or(
                "METADATA_CACHE_CAPACITY",
                defaults.metadata_cache_capacity,
            ),
            watch_cache_ttl_secs: parse_or("WATCH_CACHE_TTL_SECS", defaults.watch_cache_ttl_secs),
            watch_cache_capacity: parse_or("WATCH_CACHE_CAPACITY", defaults.watch_cache_capacity),
            discovery_url: string_or("DISCOVERY_URL", defaults.discovery_url),
            discovery_query_template: string_or(
                "DISCOVERY_QUERY_TEMPLATE",
                defaults.discovery_query_template,
            ),
            discovery_max_results: parse_or(
                "DISCOVERY_MAX_RESULTS",
                defaults.discovery_max_results,
            ),
            max_candidates: parse_or("MAX_CANDIDATES", defaults.max_candidates),
            race_concurrency: parse_or("RACE_CONCURRENCY", defaults.race_concurrency),
            probe_timeout_ms: parse_or("PROBE_TIMEOUT_MS", defaults.probe_timeout_ms),
            allow_private_hosts: parse_or("ALLOW_PRIVATE_HOSTS", defaults.allow_private_hosts),
            history_limit: parse_or("HISTORY_LIMIT", defaults.history_limit),
            cache_sweep_secs: parse_or("CACHE_SWEEP_SECS", defaults.cache_sweep_secs),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make a component unusable.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("METADATA_CACHE_TTL_SECS", self.metadata_cache_ttl_secs),
            ("METADATA_CACHE_CAPACITY", self.metadata_cache_capacity as u64),
            ("WATCH_CACHE_TTL_SECS", self.watch_cache_ttl_secs),
            ("WATCH_CACHE_CAPACITY", self.watch_cache_capacity as u64),
            ("RACE_CONCURRENCY", self.race_concurrency as u64),
            ("PROBE_TIMEOUT_MS", self.probe_timeout_ms),
            ("CATALOG_TIMEOUT_MS", self.catalog_timeout_ms),
            ("CACHE_SWEEP_SECS", self.cache_sweep_secs),
            ("MAX_CANDIDATES", self.max_candidates as u64),
            ("DISCOVERY_MAX_RESULTS", self.discovery_max_results as u64),
        ];

        for (name, value) in positive {
            if value == 0 {
                return Err(CinelinkError::Config(format!("{name} must be positive")));
            }
        }
        Ok(())
    }

    pub fn metadata_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.metadata_cache_ttl_secs)
    }

    pub fn watch_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.watch_cache_ttl_secs)
    }

    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_millis(self.catalog_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_secs)
    }
}
