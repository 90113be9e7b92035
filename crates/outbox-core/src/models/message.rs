use serde::{Deserialize, Serialize};

use super::{generate_id, Timestamped};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A chat message as the UI layer knows it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>, timestamp: u64) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Delivery state of a stored message.
///
/// Drafts are a separate entity ([`super::MessageDraft`]); older stores that wrote
/// `"draft"` here load as `Pending`, since such a message was never delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    #[serde(alias = "draft")]
    Pending,
    Synced,
    Failed,
}

/// A chat message plus the metadata needed to deliver it later
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineMessage {
    pub local_id: String,
    #[serde(flatten)]
    pub message: ChatMessage,
    /// Created while disconnected and not yet confirmed delivered
    pub sent_offline: bool,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_retry: Option<u64>,
    pub sync_status: DeliveryStatus,
}

impl OfflineMessage {
    /// Wrap a message with a fresh local id. Messages created offline start as
    /// `Pending`, everything else is already `Synced`.
    pub fn new(message: ChatMessage, sent_offline: bool) -> Self {
        Self {
            local_id: generate_id("offline"),
            message,
            sent_offline,
            retry_count: 0,
            last_retry: None,
            sync_status: if sent_offline {
                DeliveryStatus::Pending
            } else {
                DeliveryStatus::Synced
            },
        }
    }

    /// Apply a status transition. Reaching `Synced` clears `sent_offline`.
    pub fn set_status(&mut self, status: DeliveryStatus) {
        self.sync_status = status;
        if status == DeliveryStatus::Synced {
            self.sent_offline = false;
        }
    }

    pub fn record_retry(&mut self, now: u64) {
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_retry = Some(now);
    }

    pub fn is_pending(&self) -> bool {
        self.sync_status == DeliveryStatus::Pending
    }
}

impl Timestamped for OfflineMessage {
    fn timestamp(&self) -> u64 {
        self.message.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_message_status_follows_connectivity() {
        let msg = ChatMessage::new(Role::User, "hi", 10);
        let offline = OfflineMessage::new(msg.clone(), true);
        assert_eq!(offline.sync_status, DeliveryStatus::Pending);
        assert!(offline.local_id.starts_with("offline-"));

        let online = OfflineMessage::new(msg, false);
        assert_eq!(online.sync_status, DeliveryStatus::Synced);
        assert_ne!(offline.local_id, online.local_id);
    }

    #[test]
    fn test_synced_clears_sent_offline() {
        let mut msg = OfflineMessage::new(ChatMessage::new(Role::User, "hi", 10), true);
        msg.set_status(DeliveryStatus::Failed);
        assert!(msg.sent_offline);
        msg.set_status(DeliveryStatus::Synced);
        assert!(!msg.sent_offline);
    }

    #[test]
    fn test_json_layout_is_flat_camel_case() {
        let mut msg = OfflineMessage::new(
            ChatMessage::new(Role::Assistant, "answer", 99).with_model("gpt-4o"),
            true,
        );
        msg.local_id = "offline-1".into();
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["localId"], "offline-1");
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["model"], "gpt-4o");
        assert_eq!(value["sentOffline"], true);
        assert_eq!(value["syncStatus"], "pending");
        assert!(value.get("lastRetry").is_none());
    }

    #[test]
    fn test_legacy_draft_status_loads_as_pending() {
        let json = r#"{
            "localId": "offline_1",
            "role": "user",
            "content": "hello",
            "timestamp": 5,
            "sentOffline": true,
            "retryCount": 0,
            "syncStatus": "draft"
        }"#;
        let msg: OfflineMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.sync_status, DeliveryStatus::Pending);
    }
}
