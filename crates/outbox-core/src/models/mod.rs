pub mod draft;
pub mod message;
pub mod queue;
pub mod stats;

pub use draft::MessageDraft;
pub use message::{ChatMessage, DeliveryStatus, OfflineMessage, Role};
pub use queue::{
    backoff_delay, ActionKind, ConversationSavePayload, QueueItem, QueueItemState, QueuedAction,
    RegeneratePayload, SendMessagePayload,
};
pub use stats::{OfflineStatus, StatusKind, StorageStats};

use uuid::Uuid;

/// Generate a unique, never-reused id such as `queue-3f0c...`
pub(crate) fn generate_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

/// Anything kept in a bounded collection; the timestamp drives recency eviction
pub trait Timestamped {
    fn timestamp(&self) -> u64;
}
