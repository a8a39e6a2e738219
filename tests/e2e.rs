//! End-to-end tests for cinelink
//!
//! Starts a real Axum server on a random port with the production
//! collaborators (TMDB client, DuckDuckGo discovery, HTTP link prober), all
//! pointed at a wiremock server standing in for the outside world.
//!
//! The mock listens on 127.0.0.1, so the config sets `allow_private_hosts`;
//! otherwise the prober would refuse every candidate as a private address.

use cinelink::config::Config;
use cinelink::server::{build_router, state::AppState};
use serde_json::json;
use std::net::SocketAddr;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Test server helpers ───────────────────────────────────────────────────────

async fn start_server(upstream: &MockServer) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().unwrap();

    let config = Config {
        port: 0,
        is_dev: true,
        tmdb_api_key: "e2e-key".to_string(),
        tmdb_base_url: upstream.uri(),
        discovery_url: format!("{}/html/", upstream.uri()),
        discovery_query_template: "{query} online".to_string(),
        allow_private_hosts: true,
        probe_timeout_ms: 2_000,
        ..Config::default()
    };

    let state = AppState::new(config).expect("state");
    let app = build_router(state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// Catalog, search page and two candidate pages: one broken, one working.
async fn mount_upstream(upstream: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/search/multi"))
        .and(query_param("api_key", "e2e-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "media_type": "person", "id": 6384, "name": "Keanu Reeves" },
                {
                    "media_type": "movie",
                    "id": 603,
                    "title": "The Matrix",
                    "release_date": "1999-03-30",
                    "overview": "A hacker learns the truth.",
                    "vote_average": 8.2
                }
            ]
        })))
        .mount(upstream)
        .await;

    Mock::given(method("GET"))
        .and(path("/movie/603"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 603,
            "title": "The Matrix",
            "release_date": "1999-03-30",
            "overview": "Neo discovers the world is a simulation.",
            "vote_average": 8.2
        })))
        .mount(upstream)
        .await;

    let serp = format!(
        r#"<html><body>
        <a class="result__a" href="{0}/broken/matrix">Broken</a>
        <a class="result__a" href="{0}/good/matrix">Good</a>
        </body></html>"#,
        upstream.uri()
    );
    Mock::given(method("GET"))
        .and(path("/html/"))
        .and(query_param("q", "The Matrix 1999 online"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(serp, "text/html"))
        .mount(upstream)
        .await;

    Mock::given(method("GET"))
        .and(path("/broken/matrix"))
        .respond_with(ResponseTemplate::new(503))
        .mount(upstream)
        .await;

    Mock::given(method("GET"))
        .and(path("/good/matrix"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><body>player</body></html>", "text/html; charset=utf-8"),
        )
        .mount(upstream)
        .await;
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_health_check() {
    let upstream = MockServer::start().await;
    let addr = start_server(&upstream).await;

    let resp = reqwest::get(format!("http://{}/health", addr))
        .await
        .expect("health request");

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn e2e_query_resolves_metadata_and_working_link() {
    let upstream = MockServer::start().await;
    mount_upstream(&upstream).await;
    let addr = start_server(&upstream).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{}/users/1/queries", addr))
        .json(&json!({ "query": "the matrix" }))
        .send()
        .await
        .expect("query request");

    assert_eq!(resp.status(), 200);
    let card: serde_json::Value = resp.json().await.unwrap();

    assert_eq!(card["metadata"]["tmdb_id"], 603);
    assert_eq!(card["metadata"]["year"], "1999");
    assert_eq!(
        card["metadata"]["overview"],
        "Neo discovers the world is a simulation."
    );
    assert_eq!(
        card["watch"]["url"],
        format!("{}/good/matrix", upstream.uri())
    );
    assert_eq!(card["watch"]["host"], "127.0.0.1");

    let history: serde_json::Value = client
        .get(format!("http://{}/users/1/history", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history[0]["title"], "The Matrix");
}

#[tokio::test]
async fn e2e_watch_link_is_cached() {
    let upstream = MockServer::start().await;
    mount_upstream(&upstream).await;
    let addr = start_server(&upstream).await;

    let url = format!(
        "http://{}/watch/movie/603?title=The%20Matrix&year=1999",
        addr
    );
    for _ in 0..2 {
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);
    }

    // Second request is served from the watch cache: one search page fetch.
    let searches = upstream
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/html/")
        .count();
    assert_eq!(searches, 1);
}
