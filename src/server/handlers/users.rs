use crate::{
    history::{HistoryEntry, StatEntry},
    server::state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

impl LimitParams {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)
    }
}

/// Most recent queries for a user.
pub async fn get_history(
    Path(user_id): Path<i64>,
    Query(params): Query<LimitParams>,
    State(state): State<AppState>,
) -> Json<Vec<HistoryEntry>> {
    Json(state.service.history().history(user_id, params.limit()))
}

/// Most suggested titles for a user.
pub async fn get_stats(
    Path(user_id): Path<i64>,
    Query(params): Query<LimitParams>,
    State(state): State<AppState>,
) -> Json<Vec<StatEntry>> {
    Json(state.service.history().stats(user_id, params.limit()))
}
