//! Per-user outbound message queue.
//!
//! Producers append; long-poll and streaming consumers drain. Each queue is bounded:
//! when full, the oldest message is dropped. Messages not yet drained stay queued
//! across consumer disconnects. A user's entry lives only while it holds messages or
//! has a consumer waiting on it.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;

/// Kind of outbound message.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Checkin,
    #[default]
    Chat,
    System,
}

/// Message waiting for delivery to a user.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OutboundMessage {
    /// Unique ID (ULID)
    pub id: String,
    pub role: String,
    pub text: String,
    #[serde(default)]
    pub kind: MessageKind,
    /// Unix timestamp (ms)
    pub created_at: i64,
}

impl OutboundMessage {
    pub fn new(role: &str, text: &str, kind: MessageKind) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            role: role.to_string(),
            text: text.to_string(),
            kind,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn assistant(text: &str, kind: MessageKind) -> Self {
        Self::new("assistant", text, kind)
    }
}

#[derive(Default)]
struct UserQueue {
    messages: VecDeque<OutboundMessage>,
    notify: Arc<Notify>,
    waiters: usize,
}

impl UserQueue {
    fn is_idle(&self) -> bool {
        self.messages.is_empty() && self.waiters == 0
    }
}

/// Registration of a waiting consumer; releases the entry on drop.
struct Waiter<'a> {
    outbox: &'a Outbox,
    user_id: &'a str,
    notify: Arc<Notify>,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        let mut queues = self.outbox.lock();
        if let Some(queue) = queues.get_mut(self.user_id) {
            queue.waiters = queue.waiters.saturating_sub(1);
            if queue.is_idle() {
                queues.remove(self.user_id);
            }
        }
    }
}

pub struct Outbox {
    capacity: usize,
    queues: Mutex<HashMap<String, UserQueue>>,
}

impl Outbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            queues: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, UserQueue>> {
        self.queues.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a message and wake one waiting consumer.
    pub fn push(&self, user_id: &str, message: OutboundMessage) {
        let mut queues = self.lock();
        let queue = queues.entry(user_id.to_string()).or_default();
        if queue.messages.len() >= self.capacity {
            if let Some(dropped) = queue.messages.pop_front() {
                tracing::warn!(user_id, dropped = %dropped.id, "Outbox full, dropping oldest message");
            }
        }
        tracing::debug!(user_id, id = %message.id, "Queued outbound message");
        queue.messages.push_back(message);
        queue.notify.notify_one();
    }

    /// Remove and return every queued message.
    pub fn drain(&self, user_id: &str) -> Vec<OutboundMessage> {
        let mut queues = self.lock();
        let Some(queue) = queues.get_mut(user_id) else {
            return Vec::new();
        };
        let messages = queue.messages.drain(..).collect();
        if queue.is_idle() {
            queues.remove(user_id);
        }
        messages
    }

    /// Remove and return the oldest queued message.
    pub fn pop(&self, user_id: &str) -> Option<OutboundMessage> {
        let mut queues = self.lock();
        let queue = queues.get_mut(user_id)?;
        let message = queue.messages.pop_front();
        if queue.is_idle() {
            queues.remove(user_id);
        }
        message
    }

    /// Number of users with queued messages or waiting consumers.
    pub fn user_count(&self) -> usize {
        self.lock().len()
    }

    pub fn len(&self, user_id: &str) -> usize {
        self.lock().get(user_id).map_or(0, |q| q.messages.len())
    }

    pub fn is_empty(&self, user_id: &str) -> bool {
        self.len(user_id) == 0
    }

    fn wait_on<'a>(&'a self, user_id: &'a str) -> Waiter<'a> {
        let mut queues = self.lock();
        let queue = queues.entry(user_id.to_string()).or_default();
        queue.waiters += 1;
        Waiter {
            outbox: self,
            user_id,
            notify: queue.notify.clone(),
        }
    }

    /// Long-poll: drain now, or wait up to `timeout` for the next message.
    pub async fn wait_drain(&self, user_id: &str, timeout: Duration) -> Vec<OutboundMessage> {
        let messages = self.drain(user_id);
        if !messages.is_empty() {
            return messages;
        }
        let waiter = self.wait_on(user_id);
        let _ = tokio::time::timeout(timeout, waiter.notify.notified()).await;
        drop(waiter);
        self.drain(user_id)
    }

    /// Streaming: pop one message, or wait up to `timeout` for one.
    pub async fn next(&self, user_id: &str, timeout: Duration) -> Option<OutboundMessage> {
        if let Some(message) = self.pop(user_id) {
            return Some(message);
        }
        let waiter = self.wait_on(user_id);
        let _ = tokio::time::timeout(timeout, waiter.notify.notified()).await;
        drop(waiter);
        self.pop(user_id)
    }
}
