//! Read-only dashboard over the lifecycle store

use axum::{
    extract::{Query, State},
    response::Html,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use awsrelay_sqs::{LifecycleStore, Message, QueueStats};

const INDEX_HTML: &str = include_str!("../static/index.html");
const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub queue: Option<String>,
    pub deleted: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<String>,
}

/// `limit` as given on the query string; bad values fall back to the default
fn history_limit(raw: Option<&str>) -> usize {
    match raw.map(str::parse::<i64>) {
        Some(Ok(n)) if n <= 0 => 0,
        Some(Ok(n)) => usize::try_from(n).unwrap_or(0),
        _ => DEFAULT_HISTORY_LIMIT,
    }
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn stats(State(store): State<Arc<LifecycleStore>>) -> Json<Vec<QueueStats>> {
    Json(store.get_queue_stats())
}

/// Current-state messages, newest first
pub async fn messages(
    State(store): State<Arc<LifecycleStore>>,
    Query(query): Query<MessagesQuery>,
) -> Json<Vec<Message>> {
    let queue = query.queue.as_deref().filter(|q| !q.is_empty());
    let include_deleted = query.deleted.as_deref() == Some("true");

    let mut messages = store.get_messages(queue, include_deleted);
    messages.sort_by(|a, b| b.id.cmp(&a.id));
    Json(messages)
}

pub async fn history(
    State(store): State<Arc<LifecycleStore>>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<Message>> {
    Json(store.get_history(history_limit(query.limit.as_deref())))
}

pub async fn clear(State(store): State<Arc<LifecycleStore>>) -> Json<Value> {
    store.clear();
    info!("Lifecycle store cleared");
    Json(json!({ "status": "cleared" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_limit() {
        assert_eq!(history_limit(None), DEFAULT_HISTORY_LIMIT);
        assert_eq!(history_limit(Some("5")), 5);
        assert_eq!(history_limit(Some("0")), 0);
        assert_eq!(history_limit(Some("-3")), 0);
        assert_eq!(history_limit(Some("lots")), DEFAULT_HISTORY_LIMIT);
    }
}
