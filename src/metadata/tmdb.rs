//! TMDB catalog client.
//!
//! Wraps `/search/multi` and `/{movie|tv}/{id}`. Every failure mode (network
//! error, timeout, HTTP >= 400, undecodable JSON) is logged and downgraded to
//! an empty result. Individual malformed entries inside an otherwise valid
//! response are skipped.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{CatalogClient, CatalogHit, MediaKind};

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(4);

/// Longest error-body excerpt written to the log.
const ERROR_BODY_LIMIT: usize = 600;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Value>,
}

/// One TMDB result or details body. Movies and shows use different field
/// names for title and date; both are captured and picked per kind.
#[derive(Debug, Default)]
struct TmdbItem {
    media_type: Option<String>,
    id: Option<i64>,
    title: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    overview: Option<String>,
    vote_average: Option<f64>,
    poster_path: Option<String>,
}

impl TmdbItem {
    /// Read an item field by field. Only a non-object body, a non-integer
    /// `id` or a non-string `media_type` rejects the item; any other
    /// mistyped field is treated as missing.
    fn from_json(raw: &Value) -> Option<Self> {
        let obj = raw.as_object()?;

        let id = match obj.get("id") {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.as_i64()?),
        };
        let media_type = match obj.get("media_type") {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.as_str()?.to_string()),
        };
        let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);

        Some(Self {
            media_type,
            id,
            title: text("title"),
            name: text("name"),
            release_date: text("release_date"),
            first_air_date: text("first_air_date"),
            overview: text("overview"),
            vote_average: obj.get("vote_average").and_then(Value::as_f64),
            poster_path: text("poster_path"),
        })
    }
}

/// HTTP client for the TMDB v3 API.
#[derive(Clone, Debug)]
pub struct TmdbClient {
    http: Client,
    api_key: String,
    base_url: String,
    image_base: String,
    timeout: Duration,
}

impl TmdbClient {
    pub fn new(http: Client, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            image_base: DEFAULT_IMAGE_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_image_base(mut self, image_base: impl Into<String>) -> Self {
        self.image_base = image_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn poster_url(&self, path: Option<String>) -> Option<String> {
        path.filter(|p| !p.is_empty())
            .map(|p| format!("{}{}", self.image_base, p))
    }

    /// Flatten a TMDB item. `kind` overrides `media_type` for details bodies,
    /// which do not carry one.
    fn to_hit(&self, item: TmdbItem, kind: Option<MediaKind>) -> CatalogHit {
        let media_type = kind
            .map(|k| k.as_str().to_string())
            .or(item.media_type)
            .unwrap_or_default();

        let (title, date) = if media_type == MediaKind::Tv.as_str() {
            (item.name, item.first_air_date)
        } else {
            (item.title, item.release_date)
        };

        CatalogHit {
            media_type,
            id: item.id,
            title,
            date,
            overview: item.overview,
            rating: item.vote_average,
            poster_url: self.poster_url(item.poster_path),
        }
    }

    /// GET a JSON body, or `None` on any failure.
    async fn get_json(&self, url: &str, params: &[(&str, &str)], what: &str) -> Option<Value> {
        let start = Instant::now();
        let result = self
            .http
            .get(url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(params)
            .timeout(self.timeout)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    "TMDB {} request failed after {}ms: {}",
                    what,
                    start.elapsed().as_millis(),
                    e
                );
                return None;
            }
        };

        let status = response.status();
        debug!(
            "TMDB GET {} ({}) status={} time={}ms",
            url,
            what,
            status,
            start.elapsed().as_millis()
        );

        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            warn!(
                "TMDB {} error status={} body={:?}",
                what,
                status,
                excerpt(&body)
            );
            return None;
        }

        match response.json::<Value>().await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("TMDB {} returned undecodable body: {}", what, e);
                None
            }
        }
    }
}

/// Whitespace-collapsed prefix of an error body.
fn excerpt(body: &str) -> String {
    body.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(ERROR_BODY_LIMIT)
        .collect()
}

#[async_trait]
impl CatalogClient for TmdbClient {
    async fn search(&self, query: &str, language: &str) -> Vec<CatalogHit> {
        let url = format!("{}/search/multi", self.base_url);
        let params = [
            ("query", query),
            ("language", language),
            ("include_adult", "false"),
            ("page", "1"),
        ];

        let Some(body) = self.get_json(&url, &params, "search").await else {
            return Vec::new();
        };

        let results = match serde_json::from_value::<SearchResponse>(body) {
            Ok(parsed) => parsed.results,
            Err(e) => {
                warn!("TMDB search body has unexpected shape: {}", e);
                return Vec::new();
            }
        };

        let hits: Vec<CatalogHit> = results
            .into_iter()
            .filter_map(|raw| TmdbItem::from_json(&raw))
            .map(|item| self.to_hit(item, None))
            .collect();

        debug!(
            "TMDB search lang={} query={:?} results={}",
            language,
            query,
            hits.len()
        );
        hits
    }

    async fn details(&self, kind: MediaKind, tmdb_id: i64) -> Option<CatalogHit> {
        let url = format!("{}/{}/{}", self.base_url, kind.as_str(), tmdb_id);
        let body = self.get_json(&url, &[], "details").await?;

        match TmdbItem::from_json(&body) {
            Some(mut item) => {
                item.id = Some(item.id.unwrap_or(tmdb_id));
                Some(self.to_hit(item, Some(kind)))
            }
            None => {
                warn!("TMDB details for {} {} has unexpected shape", kind, tmdb_id);
                None
            }
        }
    }
}
