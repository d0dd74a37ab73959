//! In-memory lifecycle store for observed SQS messages

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Kind of lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageAction {
    Send,
    Receive,
    Delete,
}

/// One lifecycle event, also used as the current-state record of a message.
///
/// `deleted` and `deleted_at` are only ever set on current-state records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: u64,
    pub message_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub receipt_handle: String,
    pub queue_url: String,
    pub queue_name: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
    pub action: MessageAction,
    pub timestamp: DateTime<Utc>,
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Per-queue counters derived from history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub queue_name: String,
    pub queue_url: String,
    pub total_sent: usize,
    pub total_received: usize,
    pub total_deleted: usize,
    pub pending: usize,
}

impl QueueStats {
    fn new(queue_name: &str, queue_url: &str) -> Self {
        Self {
            queue_name: queue_name.to_string(),
            queue_url: queue_url.to_string(),
            total_sent: 0,
            total_received: 0,
            total_deleted: 0,
            pending: 0,
        }
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    /// provider message id -> current state
    messages: HashMap<String, Message>,
    /// queue name -> provider message ids seen on that queue
    queues: HashMap<String, HashSet<String>>,
    /// receipt handle -> provider message id
    receipts: HashMap<String, String>,
    /// every event, oldest first
    history: Vec<Message>,
    next_id: u64,
}

impl StoreInner {
    fn next_event_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn join_queue(&mut self, queue_name: &str, message_id: &str) {
        self.queues
            .entry(queue_name.to_string())
            .or_default()
            .insert(message_id.to_string());
    }
}

/// Concurrent record of every observed message lifecycle event.
///
/// All structures sit behind a single read/write lock. Each public method
/// takes the lock once and never performs I/O while holding it.
#[derive(Debug, Default)]
pub struct LifecycleStore {
    inner: RwLock<StoreInner>,
}

impl LifecycleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sent message. Callers filter out empty message ids.
    pub fn record_send(
        &self,
        queue_url: &str,
        queue_name: &str,
        message_id: &str,
        body: &str,
        attributes: HashMap<String, String>,
    ) {
        debug_assert!(!message_id.is_empty(), "record_send needs a message id");

        let mut inner = self.inner.write();
        let event = Message {
            id: inner.next_event_id(),
            message_id: message_id.to_string(),
            receipt_handle: String::new(),
            queue_url: queue_url.to_string(),
            queue_name: queue_name.to_string(),
            body: body.to_string(),
            attributes,
            action: MessageAction::Send,
            timestamp: Utc::now(),
            deleted: false,
            deleted_at: None,
        };

        inner.messages.insert(message_id.to_string(), event.clone());
        inner.join_queue(queue_name, message_id);
        inner.history.push(event);

        debug!(queue = %queue_name, message_id = %message_id, "Recorded send");
    }

    /// Record a received message.
    ///
    /// The receipt handle always points at `message_id` afterwards. Messages
    /// that were already on the queue before observation started get a
    /// current-state entry on first receive.
    pub fn record_receive(
        &self,
        queue_url: &str,
        queue_name: &str,
        message_id: &str,
        receipt_handle: &str,
        body: &str,
        attributes: HashMap<String, String>,
    ) {
        let mut inner = self.inner.write();
        let event = Message {
            id: inner.next_event_id(),
            message_id: message_id.to_string(),
            receipt_handle: receipt_handle.to_string(),
            queue_url: queue_url.to_string(),
            queue_name: queue_name.to_string(),
            body: body.to_string(),
            attributes,
            action: MessageAction::Receive,
            timestamp: Utc::now(),
            deleted: false,
            deleted_at: None,
        };

        inner
            .receipts
            .insert(receipt_handle.to_string(), message_id.to_string());

        if !inner.messages.contains_key(message_id) {
            inner.messages.insert(message_id.to_string(), event.clone());
            inner.join_queue(queue_name, message_id);
            debug!(queue = %queue_name, message_id = %message_id, "First sighting on receive");
        }

        inner.history.push(event);

        debug!(queue = %queue_name, message_id = %message_id, "Recorded receive");
    }

    /// Record a delete by receipt handle.
    ///
    /// Unknown handles still produce a history event, with no message id or
    /// body, and leave the current state untouched.
    pub fn record_delete(&self, queue_url: &str, queue_name: &str, receipt_handle: &str) {
        let mut inner = self.inner.write();
        let now = Utc::now();
        let mut event = Message {
            id: inner.next_event_id(),
            message_id: String::new(),
            receipt_handle: receipt_handle.to_string(),
            queue_url: queue_url.to_string(),
            queue_name: queue_name.to_string(),
            body: String::new(),
            attributes: HashMap::new(),
            action: MessageAction::Delete,
            timestamp: now,
            deleted: false,
            deleted_at: None,
        };

        if let Some(message_id) = inner.receipts.get(receipt_handle).cloned() {
            if let Some(current) = inner.messages.get_mut(&message_id) {
                current.deleted = true;
                current.deleted_at = Some(now);
                event.body.clone_from(&current.body);
            }
            event.message_id = message_id;
            debug!(queue = %queue_name, message_id = %event.message_id, "Recorded delete");
        } else {
            debug!(queue = %queue_name, receipt = %receipt_handle, "Delete with unknown receipt handle");
        }

        inner.history.push(event);
    }

    /// Snapshot of current-state records, in no particular order
    pub fn get_messages(&self, queue_name: Option<&str>, include_deleted: bool) -> Vec<Message> {
        let inner = self.inner.read();
        inner
            .messages
            .values()
            .filter(|m| queue_name.map_or(true, |q| m.queue_name == q))
            .filter(|m| include_deleted || !m.deleted)
            .cloned()
            .collect()
    }

    /// Most recent events first. A `limit` of 0 returns the whole history.
    pub fn get_history(&self, limit: usize) -> Vec<Message> {
        let inner = self.inner.read();
        let limit = if limit == 0 {
            inner.history.len()
        } else {
            limit.min(inner.history.len())
        };

        inner.history.iter().rev().take(limit).cloned().collect()
    }

    /// Per-queue counters for every queue with at least one event, sorted by name
    pub fn get_queue_stats(&self) -> Vec<QueueStats> {
        let inner = self.inner.read();
        let mut stats: BTreeMap<&str, QueueStats> = BTreeMap::new();

        for event in &inner.history {
            let entry = stats
                .entry(event.queue_name.as_str())
                .or_insert_with(|| QueueStats::new(&event.queue_name, &event.queue_url));
            match event.action {
                MessageAction::Send => entry.total_sent += 1,
                MessageAction::Receive => entry.total_received += 1,
                MessageAction::Delete => entry.total_deleted += 1,
            }
        }

        for (queue_name, members) in &inner.queues {
            if let Some(entry) = stats.get_mut(queue_name.as_str()) {
                entry.pending = members
                    .iter()
                    .filter_map(|id| inner.messages.get(id))
                    .filter(|m| !m.deleted)
                    .count();
            }
        }

        stats.into_values().collect()
    }

    /// Drop every record. Event ids keep counting up.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.messages.clear();
        inner.queues.clear();
        inner.receipts.clear();
        inner.history.clear();

        debug!("Cleared lifecycle store");
    }

    /// Number of events in history
    pub fn history_len(&self) -> usize {
        self.inner.read().history.len()
    }
}
