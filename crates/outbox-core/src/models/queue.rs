use std::fmt;

use serde::{Deserialize, Serialize};

use super::{generate_id, ChatMessage, Timestamped};

// =============================================================================
// Action payloads
// =============================================================================

/// Deliver a message that was written while offline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    /// Local id of the stored [`super::OfflineMessage`], if the UI stored one.
    /// Its delivery status is reconciled with the queue outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub message: ChatMessage,
}

/// Re-run the completion for a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegeneratePayload {
    pub conversation_id: String,
    /// Index of the assistant message to regenerate; `None` means the last one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Persist a conversation snapshot remotely
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSavePayload {
    pub conversation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// Deferred work, tagged by `type` with the payload under `payload`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum QueuedAction {
    SendMessage(SendMessagePayload),
    Regenerate(RegeneratePayload),
    ConversationSave(ConversationSavePayload),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SendMessage,
    Regenerate,
    ConversationSave,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::SendMessage => "send_message",
            ActionKind::Regenerate => "regenerate",
            ActionKind::ConversationSave => "conversation_save",
        };
        f.write_str(name)
    }
}

impl QueuedAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            QueuedAction::SendMessage(_) => ActionKind::SendMessage,
            QueuedAction::Regenerate(_) => ActionKind::Regenerate,
            QueuedAction::ConversationSave(_) => ActionKind::ConversationSave,
        }
    }

    /// Local message id this action delivers, if any
    pub fn message_local_id(&self) -> Option<&str> {
        match self {
            QueuedAction::SendMessage(payload) => payload.local_id.as_deref(),
            _ => None,
        }
    }
}

// =============================================================================
// QueueItem
// =============================================================================

/// Where an item sits in its retry lifecycle at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum QueueItemState {
    /// Eligible for a processing attempt now
    Ready,
    /// Failed before; not eligible until `until`
    Backoff { until: u64 },
    /// Retry ceiling reached; never selected again unless requeued
    Exhausted,
}

/// A durable unit of deferred work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: String,
    #[serde(flatten)]
    pub action: QueuedAction,
    /// Enqueue time
    pub timestamp: u64,
    #[serde(default)]
    pub retry_count: u32,
    pub max_retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry: Option<u64>,
    /// Most recent executor failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl QueueItem {
    /// `max_retries` is clamped to at least 1
    pub fn new(action: QueuedAction, max_retries: u32, now: u64) -> Self {
        Self {
            id: generate_id("queue"),
            action,
            timestamp: now,
            retry_count: 0,
            max_retries: max_retries.max(1),
            next_retry: None,
            last_error: None,
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }

    pub fn is_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    pub fn state(&self, now: u64) -> QueueItemState {
        if self.is_exhausted() {
            return QueueItemState::Exhausted;
        }
        match self.next_retry {
            Some(until) if until > now => QueueItemState::Backoff { until },
            _ => QueueItemState::Ready,
        }
    }

    pub fn is_ready(&self, now: u64) -> bool {
        self.state(now) == QueueItemState::Ready
    }

    /// Count a failed attempt and schedule the next one from `delays`.
    /// Returns the resulting state.
    pub fn record_failure(
        &mut self,
        now: u64,
        delays: &[u64],
        error: Option<String>,
    ) -> QueueItemState {
        self.retry_count = (self.retry_count + 1).min(self.max_retries);
        self.last_error = error;
        if self.is_exhausted() {
            self.next_retry = None;
        } else {
            self.next_retry = Some(now + backoff_delay(self.retry_count, delays));
        }
        self.state(now)
    }

    /// Give an item a fresh set of attempts, ready immediately
    pub fn reset(&mut self) {
        self.retry_count = 0;
        self.next_retry = None;
        self.last_error = None;
    }
}

impl Timestamped for QueueItem {
    fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

/// Delay after the `retry_count`-th failure. The index clamps at the last entry.
pub fn backoff_delay(retry_count: u32, delays: &[u64]) -> u64 {
    if delays.is_empty() {
        return 0;
    }
    let index = (retry_count.saturating_sub(1) as usize).min(delays.len() - 1);
    delays[index]
}
