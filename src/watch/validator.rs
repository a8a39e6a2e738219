//! HTTP probe deciding whether a candidate URL is a live HTML page.
//!
//! A candidate is accepted only if it is an http(s) URL with a host, the
//! fetch (following redirects) ends in a 2xx/3xx status on a URL that still
//! has a host, and the response is `text/html`. Anything else, including
//! every network error and timeout, is a rejection.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header, redirect};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::{Host, Url};

use super::{LinkValidator, ValidationOutcome};
use crate::error::Result;
use crate::metrics;

/// Default per-probe wall-clock budget.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(3500);

/// Redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 10;

/// Why a probe was rejected. Only used for logging.
#[derive(Debug, Error)]
enum Rejection {
    #[error("unusable candidate URL: {0}")]
    Candidate(String),
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("final status {0}")]
    Status(StatusCode),
    #[error("final URL has no host")]
    NoFinalHost,
    #[error("content type {0:?} is not HTML")]
    NotHtml(String),
}

/// Probes candidates with a dedicated reqwest client.
#[derive(Clone, Debug)]
pub struct HttpLinkValidator {
    client: Client,
    allow_private_hosts: bool,
}

impl HttpLinkValidator {
    /// Build a validator whose every request is bounded by `timeout`.
    ///
    /// Mirror sites routinely serve broken certificates, so TLS verification
    /// is off; proxies from the environment are ignored. Every redirect hop
    /// goes through the same URL check as the candidate itself.
    pub fn new(timeout: Duration, allow_private_hosts: bool) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(checked_redirects(allow_private_hosts))
            .danger_accept_invalid_certs(true)
            .no_proxy()
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            allow_private_hosts,
        })
    }

    async fn probe(&self, url: &str) -> Result<ValidationOutcome, Rejection> {
        let candidate =
            check_candidate_url(url, self.allow_private_hosts).map_err(Rejection::Candidate)?;

        let mut response = self.client.get(candidate).send().await?;

        let status = response.status();
        if !(200..400).contains(&status.as_u16()) {
            return Err(Rejection::Status(status));
        }

        let final_url = response.url().clone();
        let host = final_url
            .host_str()
            .filter(|h| !h.is_empty())
            .map(str::to_lowercase)
            .ok_or(Rejection::NoFinalHost)?;

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if !content_type.contains("text/html") {
            return Err(Rejection::NotHtml(content_type));
        }

        // The page has to actually start serving a body.
        response.chunk().await?;

        Ok(ValidationOutcome::Accepted {
            resolved_url: final_url.to_string(),
            host,
        })
    }
}

#[async_trait]
impl LinkValidator for HttpLinkValidator {
    async fn validate(&self, url: &str) -> ValidationOutcome {
        let outcome = match self.probe(url).await {
            Ok(outcome) => {
                debug!("Probe accepted {}", url);
                outcome
            }
            Err(reason) => {
                debug!("Probe rejected {}: {}", url, reason);
                ValidationOutcome::Rejected
            }
        };
        metrics::record_probe(outcome.is_accepted());
        outcome
    }
}

fn checked_redirects(allow_private: bool) -> redirect::Policy {
    redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error(format!("more than {MAX_REDIRECTS} redirects"));
        }
        match check_candidate_url(attempt.url().as_str(), allow_private) {
            Ok(_) => attempt.follow(),
            Err(reason) => attempt.error(format!("redirect refused: {reason}")),
        }
    })
}

/// Check that a search-sourced URL is worth fetching.
///
/// Accepts only `http://` and `https://` URLs with a host. Unless
/// `allow_private` is set, IP-literal hosts in private or reserved ranges are
/// refused so search results cannot point the prober at internal services.
/// Hostnames are not resolved.
pub fn check_candidate_url(url: &str, allow_private: bool) -> Result<Url, String> {
    let parsed = Url::parse(url).map_err(|_| format!("invalid URL: {url}"))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(format!("scheme '{scheme}' not allowed")),
    }

    let host = parsed.host().ok_or_else(|| format!("no host in URL: {url}"))?;

    if !allow_private {
        match host {
            Host::Ipv4(ip) if is_blocked_ipv4(ip) => {
                return Err(format!("private or reserved IPv4 address: {ip}"));
            }
            Host::Ipv6(ip) if is_blocked_ipv6(ip) => {
                return Err(format!("private or reserved IPv6 address: {ip}"));
            }
            _ => {}
        }
    }

    Ok(parsed)
}

/// `0/8`, `10/8`, `127/8`, `169.254/16`, `172.16/12`, `192.168/16`.
fn is_blocked_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();

    a == 0
        || a == 10
        || a == 127
        || (a == 169 && b == 254)
        || (a == 172 && (16..=31).contains(&b))
        || (a == 192 && b == 168)
}

/// Loopback, link-local `fe80::/10`, unique-local `fc00::/7`.
fn is_blocked_ipv6(ip: Ipv6Addr) -> bool {
    let s = ip.segments();

    ip.is_loopback() || (s[0] & 0xffc0) == 0xfe80 || (s[0] & 0xfe00) == 0xfc00
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn validator() -> HttpLinkValidator {
        // Mock servers listen on 127.0.0.1.
        HttpLinkValidator::new(Duration::from_millis(300), true).unwrap()
    }

    fn html() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw("<html><body>film</body></html>", "text/html; charset=utf-8")
    }

    #[tokio::test]
    async fn accepts_html_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/film/603"))
            .respond_with(html())
            .mount(&server)
            .await;

        let url = format!("{}/film/603", server.uri());
        let outcome = validator().validate(&url).await;

        assert_eq!(
            outcome,
            ValidationOutcome::Accepted {
                resolved_url: url,
                host: "127.0.0.1".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn returns_final_url_after_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/new", server.uri()).as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(html())
            .mount(&server)
            .await;

        let outcome = validator().validate(&format!("{}/old", server.uri())).await;

        match outcome {
            ValidationOutcome::Accepted { resolved_url, .. } => {
                assert_eq!(resolved_url, format!("{}/new", server.uri()));
            }
            ValidationOutcome::Rejected => panic!("redirect target should be accepted"),
        }
    }

    #[tokio::test]
    async fn rejects_redirect_into_private_address() {
        let server = MockServer::start().await;
        let port = server.address().port();
        Mock::given(method("GET"))
            .and(path("/hop"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("http://127.0.0.1:{port}/internal").as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/internal"))
            .respond_with(html())
            .expect(0)
            .mount(&server)
            .await;

        // `localhost` is a hostname, so the candidate itself passes the check.
        let strict = HttpLinkValidator::new(Duration::from_millis(300), false).unwrap();
        let outcome = strict.validate(&format!("http://localhost:{port}/hop")).await;

        assert_eq!(outcome, ValidationOutcome::Rejected);
    }

    #[tokio::test]
    async fn rejects_endless_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/loop"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/loop", server.uri()).as_str()),
            )
            .mount(&server)
            .await;

        assert_eq!(
            validator().validate(&format!("{}/loop", server.uri())).await,
            ValidationOutcome::Rejected
        );
    }

    #[tokio::test]
    async fn rejects_non_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        assert_eq!(
            validator().validate(&server.uri()).await,
            ValidationOutcome::Rejected
        );
    }

    #[tokio::test]
    async fn rejects_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(404).set_body_raw("<html>gone</html>", "text/html"),
            )
            .mount(&server)
            .await;

        assert_eq!(
            validator().validate(&server.uri()).await,
            ValidationOutcome::Rejected
        );
    }

    #[tokio::test]
    async fn rejects_slow_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(html().set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        assert_eq!(
            validator().validate(&server.uri()).await,
            ValidationOutcome::Rejected
        );
    }

    #[tokio::test]
    async fn rejects_connection_refused() {
        // Port 9 (discard) on loopback is almost never listening.
        assert_eq!(
            validator().validate("http://127.0.0.1:9/").await,
            ValidationOutcome::Rejected
        );
    }

    #[tokio::test]
    async fn rejects_unusable_urls_without_fetching() {
        let v = validator();
        for url in ["", "not-a-url", "mailto:someone@example.com", "ftp://files.example.com/a"] {
            assert_eq!(v.validate(url).await, ValidationOutcome::Rejected, "{url}");
        }
    }

    #[test]
    fn candidate_check_blocks_private_literals() {
        assert!(check_candidate_url("http://127.0.0.1/film", false).is_err());
        assert!(check_candidate_url("http://10.1.2.3/film", false).is_err());
        assert!(check_candidate_url("http://169.254.169.254/latest/", false).is_err());
        assert!(check_candidate_url("http://172.20.0.1/film", false).is_err());
        assert!(check_candidate_url("http://192.168.1.1/film", false).is_err());
        assert!(check_candidate_url("http://[::1]/film", false).is_err());
        assert!(check_candidate_url("http://[fd00::1]/film", false).is_err());
    }

    #[test]
    fn candidate_check_allows_public_hosts() {
        assert!(check_candidate_url("https://lordfilm.example/film/603", false).is_ok());
        assert!(check_candidate_url("http://8.8.8.8/", false).is_ok());
        assert!(check_candidate_url("http://172.32.0.1/", false).is_ok());
    }

    #[test]
    fn candidate_check_private_override() {
        assert!(check_candidate_url("http://127.0.0.1:8080/film", true).is_ok());
    }

    #[test]
    fn candidate_check_requires_http_scheme() {
        assert!(check_candidate_url("file:///etc/passwd", true).is_err());
        assert!(check_candidate_url("javascript:alert(1)", true).is_err());
    }
}
