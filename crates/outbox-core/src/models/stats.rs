use serde::{Deserialize, Serialize};

/// Aggregate view over everything the engine stores. Derived on demand, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub total_messages: usize,
    pub pending_sync: usize,
    pub failed_sync: usize,
    pub drafts: usize,
    pub queue_size: usize,
    /// Queue items that hit their retry ceiling and are waiting to be discarded or requeued
    #[serde(default)]
    pub exhausted_actions: usize,
    /// Bytes used by the engine's own keys
    pub storage_used: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Offline,
    Syncing,
    Processing,
    Online,
}

/// Connectivity indicator for the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineStatus {
    pub status: StatusKind,
    pub message: String,
    /// Exhausted queue items the user has not dealt with yet
    pub failed_actions: usize,
}

impl OfflineStatus {
    /// Derive the indicator. Priority: offline, then pending messages, then an active
    /// drain, then online.
    pub fn derive(
        offline: bool,
        pending_sync: usize,
        processing: bool,
        failed_actions: usize,
    ) -> Self {
        let (status, message) = if offline {
            (
                StatusKind::Offline,
                "You're offline. Messages will be saved locally.".to_string(),
            )
        } else if pending_sync > 0 {
            (StatusKind::Syncing, format!("Syncing {} messages...", pending_sync))
        } else if processing {
            (StatusKind::Processing, "Processing offline queue...".to_string())
        } else if failed_actions > 0 {
            (
                StatusKind::Online,
                format!("Connected. {} queued actions failed to sync.", failed_actions),
            )
        } else {
            (StatusKind::Online, "Connected".to_string())
        };

        Self {
            status,
            message,
            failed_actions,
        }
    }
}
