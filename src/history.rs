//! Per-user query history and title counters.
//!
//! In-memory only; entries live for the process lifetime. History is bounded
//! per user, oldest entries are dropped first.

use chrono::{SecondsFormat, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Default number of history entries kept per user.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// One answered query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// UTC timestamp, RFC 3339 with second precision.
    pub ts: String,
    pub query: String,
    pub title: Option<String>,
    pub url: Option<String>,
}

/// How many times a title was suggested to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatEntry {
    pub title: String,
    pub count: u64,
}

#[derive(Clone, Debug)]
pub struct HistoryStore {
    history: Arc<DashMap<i64, VecDeque<HistoryEntry>>>,
    stats: Arc<DashMap<i64, HashMap<String, u64>>>,
    per_user_limit: usize,
}

impl HistoryStore {
    pub fn new(per_user_limit: usize) -> Self {
        Self {
            history: Arc::new(DashMap::new()),
            stats: Arc::new(DashMap::new()),
            per_user_limit: per_user_limit.max(1),
        }
    }

    pub fn add_history(
        &self,
        user_id: i64,
        query: &str,
        title: Option<&str>,
        url: Option<&str>,
    ) {
        let entry = HistoryEntry {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            query: query.to_string(),
            title: title.map(str::to_string),
            url: url.map(str::to_string),
        };

        let mut entries = self.history.entry(user_id).or_default();
        entries.push_back(entry);
        while entries.len() > self.per_user_limit {
            entries.pop_front();
        }
    }

    pub fn inc_stat(&self, user_id: i64, title: &str) {
        *self
            .stats
            .entry(user_id)
            .or_default()
            .entry(title.to_string())
            .or_insert(0) += 1;
    }

    /// Most recent entries first.
    pub fn history(&self, user_id: i64, limit: usize) -> Vec<HistoryEntry> {
        self.history
            .get(&user_id)
            .map(|entries| entries.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// Highest counts first, ties broken by title.
    pub fn stats(&self, user_id: i64, limit: usize) -> Vec<StatEntry> {
        let Some(counts) = self.stats.get(&user_id) else {
            return Vec::new();
        };

        let mut rows: Vec<StatEntry> = counts
            .iter()
            .map(|(title, count)| StatEntry {
                title: title.clone(),
                count: *count,
            })
            .collect();
        rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.title.cmp(&b.title)));
        rows.truncate(limit);
        rows
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}
