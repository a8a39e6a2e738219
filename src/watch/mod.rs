//! Watch-page discovery: search for candidate URLs, probe them concurrently,
//! keep the first one that turns out to be a live HTML page.

pub mod discovery;
pub mod race;
pub mod resolver;
pub mod validator;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub use discovery::DuckDuckGoDiscovery;
pub use race::RaceCoordinator;
pub use resolver::WatchLinkResolver;
pub use validator::HttpLinkValidator;

/// A validated watch page: the final (post-redirect) URL and its host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchLink {
    pub url: String,
    pub host: String,
}

/// Result of probing one candidate URL.
///
/// Rejection reasons are logged by the validator, not carried here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Accepted { resolved_url: String, host: String },
    Rejected,
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted { .. })
    }

    pub fn into_link(self) -> Option<WatchLink> {
        match self {
            ValidationOutcome::Accepted { resolved_url, host } => Some(WatchLink {
                url: resolved_url,
                host,
            }),
            ValidationOutcome::Rejected => None,
        }
    }
}

/// Distinct candidate URLs in discovery order, capped at a maximum length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateList(Vec<String>);

impl CandidateList {
    /// Trim, drop blanks, dedupe by first occurrence, then truncate.
    pub fn from_discovered<I, S>(raw: I, max: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let urls = raw
            .into_iter()
            .map(|u| u.as_ref().trim().to_string())
            .filter(|u| !u.is_empty())
            .filter(|u| seen.insert(u.clone()))
            .take(max)
            .collect();
        Self(urls)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl IntoIterator for CandidateList {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Web-search collaborator producing candidate watch-page URLs.
///
/// Returns an empty vector on any failure. Output may contain duplicates and
/// junk; [`CandidateList::from_discovered`] cleans it up.
#[async_trait]
pub trait CandidateDiscovery: Send + Sync {
    async fn discover(&self, phrase: &str) -> Vec<String>;
}

/// Probes one candidate URL. Never fails: every problem is a `Rejected`.
#[async_trait]
pub trait LinkValidator: Send + Sync {
    async fn validate(&self, url: &str) -> ValidationOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupe_keeps_first_occurrence_order() {
        let list = CandidateList::from_discovered(
            [
                "https://a.example/film",
                "https://b.example/film",
                "https://a.example/film",
                "https://c.example/film",
                "https://b.example/film",
            ],
            10,
        );

        assert_eq!(
            list.as_slice(),
            [
                "https://a.example/film",
                "https://b.example/film",
                "https://c.example/film"
            ]
        );
    }

    #[test]
    fn truncation_applies_after_dedupe() {
        let list = CandidateList::from_discovered(
            ["https://a.example", "https://a.example", "https://b.example", "https://c.example"],
            2,
        );
        assert_eq!(list.as_slice(), ["https://a.example", "https://b.example"]);
    }

    #[test]
    fn blanks_are_dropped() {
        let list = CandidateList::from_discovered(["", "   ", " https://a.example "], 10);
        assert_eq!(list.as_slice(), ["https://a.example"]);
    }

    #[test]
    fn empty_input_gives_empty_list() {
        let list = CandidateList::from_discovered(Vec::<String>::new(), 20);
        assert!(list.is_empty());
    }

    #[test]
    fn accepted_outcome_becomes_link() {
        let outcome = ValidationOutcome::Accepted {
            resolved_url: "https://mirror.example/film/1".to_string(),
            host: "mirror.example".to_string(),
        };
        assert!(outcome.is_accepted());
        assert_eq!(
            outcome.into_link(),
            Some(WatchLink {
                url: "https://mirror.example/film/1".to_string(),
                host: "mirror.example".to_string(),
            })
        );
        assert_eq!(ValidationOutcome::Rejected.into_link(), None);
    }
}
