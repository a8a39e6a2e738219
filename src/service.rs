//! Query handling: metadata, then a watch link, then history bookkeeping.

use serde::Serialize;
use tracing::info;

use crate::error::{CinelinkError, Result};
use crate::history::HistoryStore;
use crate::metadata::{MetadataRecord, MetadataResolver};
use crate::watch::{WatchLink, WatchLinkResolver};

/// Overview length kept in a rendered card.
const OVERVIEW_LIMIT: usize = 800;

/// Everything the transport needs to answer one query.
#[derive(Debug, Clone, Serialize)]
pub struct TitleCard {
    pub query: String,
    pub metadata: MetadataRecord,
    pub watch: Option<WatchLink>,
    /// Plain-text rendering of the card.
    pub text: String,
}

impl TitleCard {
    pub fn new(query: &str, metadata: MetadataRecord, watch: Option<WatchLink>) -> Self {
        let text = render_card(&metadata, watch.as_ref());
        Self {
            query: query.to_string(),
            metadata,
            watch,
            text,
        }
    }
}

fn render_card(meta: &MetadataRecord, watch: Option<&WatchLink>) -> String {
    let mut out = meta.title.clone();
    if let Some(year) = &meta.year {
        out.push_str(&format!(" ({year})"));
    }
    out.push('\n');

    if let Some(rating) = meta.rating {
        out.push_str(&format!("Rating: {rating:.1}\n"));
    }
    if let Some(overview) = meta.overview.as_deref().filter(|o| !o.is_empty()) {
        out.push_str(&format!("Overview: {}\n", truncate_overview(overview, OVERVIEW_LIMIT)));
    }
    match watch {
        Some(link) => out.push_str(&format!("Watch: {}\n", link.url)),
        None => out.push_str("Watch: no working link found\n"),
    }
    out
}

/// Cut to `limit` characters at the last word boundary and add an ellipsis.
fn truncate_overview(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let head: String = text.chars().take(limit).collect();
    let cut = match head.rsplit_once(' ') {
        Some((before, _)) => before,
        None => head.as_str(),
    };
    format!("{cut}…")
}

/// Cheap to clone; all state lives behind shared handles.
#[derive(Clone)]
pub struct TitleService {
    metadata: MetadataResolver,
    watch: WatchLinkResolver,
    history: HistoryStore,
}

impl TitleService {
    pub fn new(metadata: MetadataResolver, watch: WatchLinkResolver, history: HistoryStore) -> Self {
        Self {
            metadata,
            watch,
            history,
        }
    }

    pub fn metadata(&self) -> &MetadataResolver {
        &self.metadata
    }

    pub fn watch(&self) -> &WatchLinkResolver {
        &self.watch
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Answer a user's free-text query and record it.
    ///
    /// # Errors
    /// [`CinelinkError::BadRequest`] for a blank query,
    /// [`CinelinkError::NotFound`] when the catalog has no match. Unmatched
    /// queries are not recorded.
    pub async fn lookup(&self, user_id: i64, raw_query: &str) -> Result<TitleCard> {
        let query = raw_query.trim();
        if query.is_empty() {
            return Err(CinelinkError::BadRequest("query must not be empty".to_string()));
        }

        let Some(meta) = self.metadata.resolve(query).await else {
            return Err(CinelinkError::NotFound(format!("nothing found for {query:?}")));
        };

        let watch = self
            .watch
            .resolve(meta.kind, meta.tmdb_id, &meta.title, meta.year.as_deref())
            .await;

        self.history.add_history(
            user_id,
            query,
            Some(&meta.title),
            watch.as_ref().map(|w| w.url.as_str()),
        );
        self.history.inc_stat(user_id, &meta.title);

        info!(
            "User {} query {:?} -> {} (watch: {})",
            user_id,
            query,
            meta.title,
            watch.as_ref().map_or("none", |w| w.host.as_str())
        );

        Ok(TitleCard::new(query, meta, watch))
    }
}
