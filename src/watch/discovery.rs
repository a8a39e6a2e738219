//! DuckDuckGo-backed candidate discovery.
//!
//! Queries the no-JavaScript HTML endpoint and pulls result links out of the
//! page. Result anchors point at a DuckDuckGo redirect (`/l/?uddg=<target>`);
//! the target is unwrapped so the prober sees the real site.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::CandidateDiscovery;

pub const DEFAULT_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// `{query}` is replaced by the title (plus year when known).
pub const DEFAULT_QUERY_TEMPLATE: &str = "lordfilm \"{query}\" смотреть онлайн бесплатно";

pub const DEFAULT_MAX_RESULTS: usize = 4;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(6);

/// Browser-like agent; the HTML endpoint serves an error page to bare clients.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

#[derive(Clone, Debug)]
pub struct DuckDuckGoDiscovery {
    http: Client,
    endpoint: String,
    query_template: String,
    max_results: usize,
    timeout: Duration,
}

impl DuckDuckGoDiscovery {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            query_template: DEFAULT_QUERY_TEMPLATE.to_string(),
            max_results: DEFAULT_MAX_RESULTS,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_query_template(mut self, template: impl Into<String>) -> Self {
        self.query_template = template.into();
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn search_query(&self, phrase: &str) -> String {
        if self.query_template.contains("{query}") {
            self.query_template.replace("{query}", phrase)
        } else {
            format!("{} {}", self.query_template, phrase)
        }
    }
}

#[async_trait]
impl CandidateDiscovery for DuckDuckGoDiscovery {
    async fn discover(&self, phrase: &str) -> Vec<String> {
        let query = self.search_query(phrase);

        let response = match self
            .http
            .get(&self.endpoint)
            .query(&[("q", query.as_str())])
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!("Discovery search returned {} for {:?}", response.status(), query);
                return Vec::new();
            }
            Err(e) => {
                warn!("Discovery search failed for {:?}: {}", query, e);
                return Vec::new();
            }
        };

        let html = match response.text().await {
            Ok(html) => html,
            Err(e) => {
                warn!("Discovery search body unreadable for {:?}: {}", query, e);
                return Vec::new();
            }
        };

        let links = extract_result_links(&html, self.max_results);
        debug!("Discovery found {} candidates for {:?}", links.len(), query);
        links
    }
}

/// Pull up to `max` http(s) result links out of a DuckDuckGo HTML page.
pub fn extract_result_links(html: &str, max: usize) -> Vec<String> {
    let Ok(anchor_sel) = Selector::parse("a.result__a[href]") else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    document
        .select(&anchor_sel)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(unwrap_result_href)
        .take(max)
        .collect()
}

/// Resolve a result href to the target site URL, keeping only http(s).
fn unwrap_result_href(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let parsed = Url::parse(&absolute).ok()?;

    let is_redirect = parsed
        .host_str()
        .is_some_and(|h| h.ends_with("duckduckgo.com"))
        && parsed.path().starts_with("/l/");
    let target = if is_redirect {
        parsed
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned())?
    } else {
        absolute
    };

    (target.starts_with("http://") || target.starts_with("https://")).then_some(target)
}
