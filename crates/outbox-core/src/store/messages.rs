use std::sync::Arc;

use super::collection::BoundedCollection;
use super::persistence::Persistence;
use crate::clock::SharedClock;
use crate::models::{ChatMessage, DeliveryStatus, OfflineMessage};

/// Messages kept locally, with their delivery state
pub struct MessageStore {
    collection: BoundedCollection<OfflineMessage>,
    clock: SharedClock,
}

impl MessageStore {
    pub fn new(persistence: Arc<Persistence>, key: &str, max: usize, clock: SharedClock) -> Self {
        Self {
            collection: BoundedCollection::new(persistence, key, max),
            clock,
        }
    }

    pub(crate) fn collection(&self) -> &BoundedCollection<OfflineMessage> {
        &self.collection
    }

    /// Store a message; returns its local id, or `None` if it couldn't be persisted
    pub fn save(&self, message: ChatMessage, sent_offline: bool) -> Option<String> {
        let offline = OfflineMessage::new(message, sent_offline);
        let local_id = offline.local_id.clone();
        if self.collection.append(offline) {
            Some(local_id)
        } else {
            None
        }
    }

    pub fn all(&self) -> Vec<OfflineMessage> {
        self.collection.list()
    }

    pub fn get(&self, local_id: &str) -> Option<OfflineMessage> {
        self.collection.find(|m| m.local_id == local_id)
    }

    /// Returns false when the message is unknown or the write failed
    pub fn update_status(&self, local_id: &str, status: DeliveryStatus) -> bool {
        self.collection
            .update(|m| m.local_id == local_id, |m| m.set_status(status))
    }

    /// Count a delivery attempt that didn't go through
    pub fn record_retry(&self, local_id: &str) -> bool {
        let now = self.clock.now_millis();
        self.collection
            .update(|m| m.local_id == local_id, |m| m.record_retry(now))
    }

    /// Messages still waiting for delivery
    pub fn pending(&self) -> Vec<OfflineMessage> {
        self.all().into_iter().filter(|m| m.is_pending()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::Role;
    use crate::store::kv::MemoryStore;

    fn store(max: usize) -> MessageStore {
        let persistence = Arc::new(Persistence::new(Arc::new(MemoryStore::new())));
        MessageStore::new(persistence, "t:messages", max, Arc::new(ManualClock::new(500)))
    }

    #[test]
    fn test_save_and_reconcile() {
        let store = store(10);
        let id = store
            .save(ChatMessage::new(Role::User, "hello", 1), true)
            .unwrap();
        assert_eq!(store.pending().len(), 1);

        assert!(store.record_retry(&id));
        let msg = store.get(&id).unwrap();
        assert_eq!(msg.retry_count, 1);
        assert_eq!(msg.last_retry, Some(500));

        assert!(store.update_status(&id, DeliveryStatus::Synced));
        let msg = store.get(&id).unwrap();
        assert_eq!(msg.sync_status, DeliveryStatus::Synced);
        assert!(!msg.sent_offline);
        assert!(store.pending().is_empty());
    }

    #[test]
    fn test_update_unknown_message() {
        let store = store(10);
        assert!(!store.update_status("offline-nope", DeliveryStatus::Failed));
    }

    #[test]
    fn test_pending_excludes_failed_and_synced() {
        let store = store(10);
        let a = store.save(ChatMessage::new(Role::User, "a", 1), true).unwrap();
        let b = store.save(ChatMessage::new(Role::User, "b", 2), true).unwrap();
        store.save(ChatMessage::new(Role::Assistant, "c", 3), false).unwrap();
        store.update_status(&a, DeliveryStatus::Failed);

        let pending = store.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].local_id, b);
    }
}
