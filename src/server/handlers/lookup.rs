use crate::{
    error::{CinelinkError, Result},
    metadata::{MediaKind, MetadataRecord},
    metrics,
    server::state::AppState,
    service::TitleCard,
    watch::WatchLink,
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct MetadataParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct WatchParams {
    pub title: String,
    pub year: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

fn finish<T>(endpoint: &'static str, start: Instant, result: Result<T>) -> Result<T> {
    let status = match &result {
        Ok(_) => 200,
        Err(e) => e.status().as_u16(),
    };
    metrics::record_request(endpoint, status);
    metrics::record_duration(endpoint, start);
    result
}

/// Resolve catalog metadata for `?q=`.
pub async fn get_metadata(
    Query(params): Query<MetadataParams>,
    State(state): State<AppState>,
) -> Result<Json<MetadataRecord>> {
    let start = Instant::now();
    info!("Metadata lookup for {:?}", params.q);

    let result = resolve_metadata(&state, &params.q).await;

    finish("metadata", start, result)
}

/// Resolve a working watch page for one catalog entry.
pub async fn get_watch_link(
    Path((kind, id)): Path<(String, i64)>,
    Query(params): Query<WatchParams>,
    State(state): State<AppState>,
) -> Result<Json<WatchLink>> {
    let start = Instant::now();
    info!("Watch link lookup for {}/{} ({:?})", kind, id, params.title);

    let result = resolve_watch_link(&state, &kind, id, &params).await;

    finish("watch", start, result)
}

async fn resolve_metadata(state: &AppState, q: &str) -> Result<Json<MetadataRecord>> {
    if q.trim().is_empty() {
        return Err(CinelinkError::BadRequest("q must not be empty".to_string()));
    }
    state
        .service
        .metadata()
        .resolve(q)
        .await
        .map(Json)
        .ok_or_else(|| CinelinkError::NotFound(format!("no metadata for {q:?}")))
}

async fn resolve_watch_link(
    state: &AppState,
    kind: &str,
    id: i64,
    params: &WatchParams,
) -> Result<Json<WatchLink>> {
    let kind: MediaKind = kind.parse().map_err(CinelinkError::BadRequest)?;
    if params.title.trim().is_empty() {
        return Err(CinelinkError::BadRequest("title must not be empty".to_string()));
    }
    state
        .service
        .watch()
        .resolve(kind, id, &params.title, params.year.as_deref())
        .await
        .map(Json)
        .ok_or_else(|| CinelinkError::NotFound(format!("no working link for {kind}/{id}")))
}

/// Full query flow for one user: metadata, watch link, history.
pub async fn post_query(
    Path(user_id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<TitleCard>> {
    let start = Instant::now();
    let result = state.service.lookup(user_id, &body.query).await.map(Json);
    finish("query", start, result)
}
