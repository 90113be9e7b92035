use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;

use crate::autosave::DraftAutosaver;
use crate::events::{DrainReport, SyncEvent};
use crate::executor::{dispatch, ActionExecutor};
use crate::models::{
    ChatMessage, DeliveryStatus, MessageDraft, OfflineMessage, OfflineStatus, QueueItem,
    QueuedAction, SendMessagePayload, StorageStats,
};
use crate::store::{AppliedOutcome, ExportBundle, ImportResult, Storage};

const EVENT_CAPACITY: usize = 64;

/// Clears the processing flag when a drain ends, including on early return
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Entry point for the UI layer.
///
/// Tracks connectivity, runs at most one queue drain at a time, and hands out the
/// aggregate views the status indicator needs.
pub struct OfflineController {
    storage: Arc<Storage>,
    autosaver: DraftAutosaver,
    executor: Arc<dyn ActionExecutor>,
    offline: AtomicBool,
    processing: AtomicBool,
    events: broadcast::Sender<SyncEvent>,
}

impl OfflineController {
    pub fn new(storage: Arc<Storage>, executor: Arc<dyn ActionExecutor>, online: bool) -> Self {
        let autosaver = DraftAutosaver::new(storage.clone(), storage.config().auto_save_delay());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            storage,
            autosaver,
            executor,
            offline: AtomicBool::new(!online),
            processing: AtomicBool::new(false),
            events,
        }
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    // ===== Connectivity =====

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Record a connectivity change. Coming back online drains the queue; the
    /// report of that drain is returned.
    pub async fn set_online(&self, online: bool) -> Option<DrainReport> {
        let was_offline = self.offline.swap(!online, Ordering::SeqCst);
        if was_offline == !online {
            return None;
        }

        tracing::info!(online, "connectivity changed");
        self.emit(SyncEvent::ConnectivityChanged { online });

        if online {
            self.drain().await
        } else {
            None
        }
    }

    /// Manual "retry now". Does nothing while offline.
    pub async fn retry_sync_now(&self) -> Option<DrainReport> {
        if self.is_offline() {
            tracing::debug!("retry requested while offline, ignoring");
            return None;
        }
        self.drain().await
    }

    /// Run every ready queue item through the executor, one at a time in enqueue
    /// order. Returns `None` when offline or when another drain is already running.
    pub async fn drain(&self) -> Option<DrainReport> {
        if self.is_offline() {
            return None;
        }
        if self
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("drain already in progress");
            return None;
        }
        let _guard = ProcessingGuard(&self.processing);

        let ready = self.storage.queue().ready_items();
        self.emit(SyncEvent::DrainStarted { ready: ready.len() });
        if !ready.is_empty() {
            tracing::info!(ready = ready.len(), "processing offline queue");
        }

        let mut report = DrainReport::default();
        for item in ready {
            if self.is_offline() {
                tracing::info!(
                    attempted = report.attempted,
                    "went offline during drain, stopping"
                );
                report.interrupted = true;
                break;
            }
            // Discarded or requeued by the user since selection
            if self.storage.queue().get(&item.id).is_none() {
                continue;
            }

            report.attempted += 1;
            let outcome = dispatch(self.executor.as_ref(), &item.action).await;
            if let Err(Some(error)) = &outcome {
                tracing::warn!(id = %item.id, kind = %item.kind(), %error, "queued action failed");
            }

            match self.storage.queue().apply_outcome(&item.id, outcome) {
                Some(AppliedOutcome::Completed(done)) => {
                    report.succeeded += 1;
                    self.reconcile_message(&done.action, DeliveryStatus::Synced);
                }
                Some(AppliedOutcome::Retrying(retrying)) => {
                    report.retrying += 1;
                    if let Some(local_id) = retrying.action.message_local_id() {
                        self.storage.messages().record_retry(local_id);
                    }
                }
                Some(AppliedOutcome::Exhausted(dead)) => {
                    report.exhausted += 1;
                    if let Some(local_id) = dead.action.message_local_id() {
                        self.storage.messages().record_retry(local_id);
                    }
                    self.reconcile_message(&dead.action, DeliveryStatus::Failed);
                    self.emit(SyncEvent::ActionExhausted {
                        id: dead.id.clone(),
                        kind: dead.kind(),
                        last_error: dead.last_error.clone(),
                    });
                }
                None => {
                    tracing::error!(id = %item.id, "could not record outcome for queued action");
                }
            }
        }

        if !report.interrupted {
            self.storage.touch_last_sync();
        }
        tracing::info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            retrying = report.retrying,
            exhausted = report.exhausted,
            "drain finished"
        );
        self.emit(SyncEvent::DrainFinished(report));
        Some(report)
    }

    fn reconcile_message(&self, action: &QueuedAction, status: DeliveryStatus) {
        if let Some(local_id) = action.message_local_id() {
            if !self.storage.messages().update_status(local_id, status) {
                tracing::debug!(%local_id, "queued message no longer stored");
            }
        }
    }

    // ===== Messages =====

    pub fn save_message(&self, message: ChatMessage, sent_offline: bool) -> Option<String> {
        self.storage.ensure_headroom();
        self.storage.messages().save(message, sent_offline)
    }

    /// Store a message written while offline and queue its delivery. The two stay
    /// linked so the message status follows the queue outcome. Returns the message's
    /// local id.
    pub fn queue_message(
        &self,
        message: ChatMessage,
        conversation_id: Option<&str>,
    ) -> Option<String> {
        let local_id = self.save_message(message.clone(), true)?;
        let action = QueuedAction::SendMessage(SendMessagePayload {
            local_id: Some(local_id.clone()),
            conversation_id: conversation_id.map(String::from),
            message,
        });
        if self.storage.queue().enqueue(action, None).is_none() {
            self.storage
                .messages()
                .update_status(&local_id, DeliveryStatus::Failed);
            return None;
        }
        Some(local_id)
    }

    pub fn update_message_status(&self, local_id: &str, status: DeliveryStatus) -> bool {
        self.storage.messages().update_status(local_id, status)
    }

    pub fn pending_sync_messages(&self) -> Vec<OfflineMessage> {
        self.storage.messages().pending()
    }

    // ===== Drafts =====

    /// Debounced; see [`DraftAutosaver::schedule`]
    pub fn autosave_draft(&self, content: &str, conversation_id: Option<&str>) {
        self.autosaver.schedule(content, conversation_id);
    }

    pub fn save_draft_explicit(
        &self,
        content: &str,
        conversation_id: Option<&str>,
    ) -> Option<String> {
        self.storage.ensure_headroom();
        self.storage.drafts().save(content, conversation_id, false)
    }

    pub fn delete_draft(&self, id: &str) -> bool {
        self.storage.drafts().delete(id)
    }

    /// Write pending autosaves now. Call before shutting down.
    pub fn flush_drafts(&self) -> usize {
        self.autosaver.flush()
    }

    pub fn cancel_autosave(&self, conversation_id: Option<&str>) -> bool {
        self.autosaver.cancel(conversation_id)
    }

    pub fn all_drafts(&self) -> Vec<MessageDraft> {
        self.storage.drafts().all()
    }

    pub fn draft_for_conversation(&self, conversation_id: Option<&str>) -> Option<MessageDraft> {
        self.storage.drafts().for_conversation(conversation_id)
    }

    // ===== Queue =====

    pub fn enqueue_action(&self, action: QueuedAction, max_retries: Option<u32>) -> Option<String> {
        self.storage.ensure_headroom();
        self.storage.queue().enqueue(action, max_retries)
    }

    pub fn requeue(&self, id: &str) -> bool {
        self.storage.requeue(id)
    }

    pub fn discard_exhausted(&self) -> usize {
        self.storage.queue().discard_exhausted()
    }

    pub fn queue_items(&self) -> Vec<QueueItem> {
        self.storage.queue().items()
    }

    pub fn exhausted_items(&self) -> Vec<QueueItem> {
        self.storage.queue().exhausted_items()
    }

    // ===== Status & maintenance =====

    pub fn offline_status(&self) -> OfflineStatus {
        let stats = self.storage.stats();
        OfflineStatus::derive(
            self.is_offline(),
            stats.pending_sync,
            self.is_processing(),
            stats.exhausted_actions,
        )
    }

    pub fn stats(&self) -> StorageStats {
        self.storage.stats()
    }

    /// Heavy features (model switching, regeneration) should be disabled while offline
    pub fn should_limit_features(&self) -> bool {
        self.is_offline()
    }

    pub fn export_data(&self) -> ExportBundle {
        self.storage.export_data()
    }

    pub fn import_data(&self, data: &Value) -> ImportResult {
        self.storage.import_data(data)
    }

    /// Drop pending autosaves and every stored key
    pub fn clear_all(&self) -> bool {
        self.autosaver.cancel_all();
        self.storage.clear_all()
    }
}
