//! Catalog metadata: record types, the catalog collaborator seam, and the
//! cached resolution flow.

pub mod resolver;
pub mod tmdb;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use resolver::MetadataResolver;
pub use tmdb::TmdbClient;

/// The two catalog media kinds this service understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Tv,
}

impl MediaKind {
    /// Catalog wire tag (`movie` / `tv`).
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Tv => "tv",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaKind::Movie),
            "tv" => Ok(MediaKind::Tv),
            other => Err(format!("unknown media kind: {other}")),
        }
    }
}

/// Enriched metadata for one catalog title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub tmdb_id: i64,
    pub kind: MediaKind,
    pub title: String,
    /// Four-digit release (or first-air) year.
    pub year: Option<String>,
    pub overview: Option<String>,
    pub rating: Option<f64>,
    pub poster_url: Option<String>,
}

/// One raw entry returned by the catalog.
///
/// The client flattens provider-specific field names (movie `title` vs tv
/// `name`, `release_date` vs `first_air_date`) but does not filter: the
/// resolver decides which hits are usable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogHit {
    /// Provider media tag, e.g. `movie`, `tv`, `person`.
    pub media_type: String,
    pub id: Option<i64>,
    pub title: Option<String>,
    /// Full date string such as `2014-11-05`.
    pub date: Option<String>,
    pub overview: Option<String>,
    pub rating: Option<f64>,
    pub poster_url: Option<String>,
}

impl CatalogHit {
    /// Convert into a record, or `None` if the media tag is not a recognized
    /// kind or the hit has no id. `fallback_title` fills a missing title.
    pub fn into_record(self, fallback_title: &str) -> Option<MetadataRecord> {
        let kind = self.media_type.parse::<MediaKind>().ok()?;
        let tmdb_id = self.id?;

        let title = self
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| fallback_title.to_string());

        Some(MetadataRecord {
            tmdb_id,
            kind,
            title,
            year: self.date.as_deref().and_then(pick_year),
            overview: self.overview.filter(|o| !o.is_empty()),
            rating: self.rating,
            poster_url: self.poster_url,
        })
    }
}

/// First four characters of a date, if it has at least four.
fn pick_year(date: &str) -> Option<String> {
    let year: String = date.chars().take(4).collect();
    (year.chars().count() == 4).then_some(year)
}

/// Metadata catalog collaborator.
///
/// Implementations never fail: transport errors, error statuses and
/// undecodable bodies all come back as an empty result.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Free-text search in the given language, in provider order.
    async fn search(&self, query: &str, language: &str) -> Vec<CatalogHit>;

    /// Full details for one title.
    async fn details(&self, kind: MediaKind, tmdb_id: i64) -> Option<CatalogHit>;
}
