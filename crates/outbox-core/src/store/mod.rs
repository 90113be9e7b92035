pub mod collection;
pub mod drafts;
pub mod file_store;
pub mod kv;
pub mod messages;
pub mod persistence;
pub mod queue;
pub mod quota;
pub mod transfer;

pub use collection::BoundedCollection;
pub use drafts::DraftStore;
pub use file_store::FileStore;
pub use kv::{KeyValueStore, MemoryStore, StorageEstimate, StoreError};
pub use messages::MessageStore;
pub use persistence::Persistence;
pub use queue::{AppliedOutcome, SyncQueue};
pub use quota::{QuotaCheck, QuotaGuard};
pub use transfer::{ExportBundle, ImportResult};

use std::sync::Arc;

use serde::Serialize;

use crate::clock::{SharedClock, SystemClock};
use crate::config::{CoreConfig, EngineConfig};
use crate::constants;
use crate::models::{DeliveryStatus, StorageStats};

/// Fully qualified keys for one engine namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub messages: String,
    pub drafts: String,
    pub queue: String,
    pub last_sync: String,
}

impl StorageKeys {
    pub fn new(prefix: &str) -> Self {
        let key = |suffix: &str| format!("{}:{}", prefix, suffix);
        Self {
            messages: key(constants::MESSAGES_KEY),
            drafts: key(constants::DRAFTS_KEY),
            queue: key(constants::QUEUE_KEY),
            last_sync: key(constants::LAST_SYNC_KEY),
        }
    }

    pub fn all(&self) -> Vec<String> {
        vec![
            self.messages.clone(),
            self.drafts.clone(),
            self.queue.clone(),
            self.last_sync.clone(),
        ]
    }
}

/// What a cleanup pass removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub messages_evicted: usize,
    pub drafts_evicted: usize,
    pub queue_items_purged: usize,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.messages_evicted + self.drafts_evicted + self.queue_items_purged
    }
}

/// Every collection the engine owns, on top of one key-value backend.
///
/// This is the only writer of the engine's keys. It is shared (`Arc`) between the
/// controller and the draft autosaver.
pub struct Storage {
    config: EngineConfig,
    clock: SharedClock,
    persistence: Arc<Persistence>,
    keys: StorageKeys,
    messages: MessageStore,
    drafts: DraftStore,
    queue: SyncQueue,
    guard: QuotaGuard,
}

impl Storage {
    pub fn new(backend: Arc<dyn KeyValueStore>, config: EngineConfig, clock: SharedClock) -> Self {
        let persistence = Arc::new(Persistence::new(backend));
        let keys = StorageKeys::new(&config.key_prefix);

        let messages = MessageStore::new(
            persistence.clone(),
            &keys.messages,
            config.max_messages,
            clock.clone(),
        );
        let drafts = DraftStore::new(
            persistence.clone(),
            &keys.drafts,
            config.max_drafts,
            clock.clone(),
        );
        let queue = SyncQueue::new(
            persistence.clone(),
            &keys.queue,
            config.max_queue_size,
            clock.clone(),
            config.retry_delays_ms.clone(),
            config.default_max_retries,
        );
        let guard = QuotaGuard::new(persistence.clone(), keys.all(), config.quota_warning_ratio);

        Self {
            config,
            clock,
            persistence,
            keys,
            messages,
            drafts,
            queue,
            guard,
        }
    }

    /// Ephemeral storage, handy for tests and hosts without a disk
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(Arc::new(MemoryStore::new()), config, Arc::new(SystemClock))
    }

    /// File-backed storage under `core.data_dir`, optionally capped at `quota` bytes
    pub fn open(
        core: &CoreConfig,
        config: EngineConfig,
        quota: Option<u64>,
    ) -> Result<Self, StoreError> {
        let mut backend = FileStore::open(&core.data_dir)?;
        if let Some(quota) = quota {
            backend = backend.with_quota(quota);
        }
        Ok(Self::new(Arc::new(backend), config, Arc::new(SystemClock)))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    pub fn persistence(&self) -> &Arc<Persistence> {
        &self.persistence
    }

    pub fn messages(&self) -> &MessageStore {
        &self.messages
    }

    pub fn drafts(&self) -> &DraftStore {
        &self.drafts
    }

    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    pub fn guard(&self) -> &QuotaGuard {
        &self.guard
    }

    /// Run cleanup if the backend reports quota pressure. Call before writes.
    pub fn ensure_headroom(&self) -> Option<CleanupReport> {
        if self.guard.check().needs_cleanup() {
            Some(self.cleanup())
        } else {
            None
        }
    }

    /// Trim messages and drafts to their limits and purge expired exhausted queue items
    pub fn cleanup(&self) -> CleanupReport {
        let report = CleanupReport {
            messages_evicted: self.messages.collection().enforce_bound(),
            drafts_evicted: self.drafts.collection().enforce_bound(),
            queue_items_purged: self.queue.purge_expired(self.config.exhausted_retention_ms),
        };
        if report.total() > 0 {
            tracing::info!(
                messages = report.messages_evicted,
                drafts = report.drafts_evicted,
                queue = report.queue_items_purged,
                "cleanup freed storage"
            );
        }
        report
    }

    /// Give a queue item a fresh set of retries. A linked message goes back to
    /// `pending` along with it. Returns false for an unknown id.
    pub fn requeue(&self, id: &str) -> bool {
        if !self.queue.requeue(id) {
            return false;
        }
        let local_id = self
            .queue
            .get(id)
            .and_then(|item| item.action.message_local_id().map(String::from));
        if let Some(local_id) = local_id {
            if !self.messages.update_status(&local_id, DeliveryStatus::Pending) {
                tracing::debug!(%local_id, "requeued message no longer stored");
            }
        }
        true
    }

    pub fn last_sync(&self) -> Option<u64> {
        self.persistence.read(&self.keys.last_sync)
    }

    /// Record a completed sync at the current time
    pub fn touch_last_sync(&self) -> bool {
        self.persistence
            .write(&self.keys.last_sync, &self.clock.now_millis())
    }

    pub fn stats(&self) -> StorageStats {
        let messages = self.messages.all();
        let queue = self.queue.items();

        StorageStats {
            total_messages: messages.len(),
            pending_sync: messages
                .iter()
                .filter(|m| m.sync_status == DeliveryStatus::Pending)
                .count(),
            failed_sync: messages
                .iter()
                .filter(|m| m.sync_status == DeliveryStatus::Failed)
                .count(),
            drafts: self.drafts.all().len(),
            queue_size: queue.len(),
            exhausted_actions: queue.iter().filter(|item| item.is_exhausted()).count(),
            storage_used: self.guard.estimate_usage(),
            last_sync: self.last_sync(),
        }
    }

    /// Remove every key this engine owns
    pub fn clear_all(&self) -> bool {
        let mut ok = true;
        for key in self.keys.all() {
            ok &= self.persistence.remove(&key);
        }
        tracing::info!("cleared all offline data");
        ok
    }
}
