//! Debounced draft autosave.
//!
//! Every conversation (plus the "no conversation" composer) gets its own timer.
//! Rescheduling aborts the previous timer, so a burst of edits produces a single
//! write holding the last content, `delay` after the last edit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::store::Storage;

type Slot = Option<String>;

struct PendingAutosave {
    content: String,
    generation: u64,
    handle: JoinHandle<()>,
}

pub struct DraftAutosaver {
    storage: Arc<Storage>,
    delay: Duration,
    pending: Arc<Mutex<HashMap<Slot, PendingAutosave>>>,
    generation: AtomicU64,
}

impl DraftAutosaver {
    pub fn new(storage: Arc<Storage>, delay: Duration) -> Self {
        Self {
            storage,
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    /// (Re)start the timer for `conversation_id`. Blank content cancels any pending
    /// write for the slot and persists nothing.
    ///
    /// Outside a tokio runtime there is nothing to drive the timer, so the draft is
    /// written right away.
    pub fn schedule(&self, content: &str, conversation_id: Option<&str>) {
        let slot: Slot = conversation_id.map(String::from);

        if content.trim().is_empty() {
            self.cancel(conversation_id);
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            tracing::debug!("no async runtime, autosaving draft immediately");
            self.cancel(conversation_id);
            persist(&self.storage, content, conversation_id);
            return;
        };

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;

        // Hold the lock across spawn + insert so the timer can't fire before its
        // entry exists.
        let mut pending = self.pending.lock();
        let handle = runtime.spawn({
            let storage = self.storage.clone();
            let pending = self.pending.clone();
            let slot = slot.clone();
            let delay = self.delay;
            async move {
                tokio::time::sleep(delay).await;
                let entry = {
                    let mut pending = pending.lock();
                    let current = pending.get(&slot).map(|e| e.generation) == Some(generation);
                    if current {
                        pending.remove(&slot)
                    } else {
                        None
                    }
                };
                if let Some(entry) = entry {
                    persist(&storage, &entry.content, slot.as_deref());
                }
            }
        });

        if let Some(previous) = pending.insert(
            slot,
            PendingAutosave {
                content: content.to_string(),
                generation,
                handle,
            },
        ) {
            previous.handle.abort();
        }
    }

    /// Write every pending autosave now; returns how many drafts were written
    pub fn flush(&self) -> usize {
        let drained: Vec<(Slot, PendingAutosave)> = self.pending.lock().drain().collect();
        let mut written = 0;
        for (slot, entry) in drained {
            entry.handle.abort();
            if persist(&self.storage, &entry.content, slot.as_deref()) {
                written += 1;
            }
        }
        if written > 0 {
            tracing::debug!(written, "flushed pending autosaves");
        }
        written
    }

    /// Drop the pending autosave for a conversation. Returns false if none was pending.
    pub fn cancel(&self, conversation_id: Option<&str>) -> bool {
        let slot: Slot = conversation_id.map(String::from);
        match self.pending.lock().remove(&slot) {
            Some(entry) => {
                entry.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Drop every pending autosave; returns how many were dropped
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<PendingAutosave> = self.pending.lock().drain().map(|(_, e)| e).collect();
        for entry in &drained {
            entry.handle.abort();
        }
        drained.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Drop for DraftAutosaver {
    fn drop(&mut self) {
        let dropped = self.cancel_all();
        if dropped > 0 {
            tracing::debug!(dropped, "autosaver dropped with pending drafts");
        }
    }
}

fn persist(storage: &Storage, content: &str, conversation_id: Option<&str>) -> bool {
    storage.ensure_headroom();
    storage.drafts().save(content, conversation_id, true).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    const DELAY: Duration = Duration::from_millis(3_000);

    fn autosaver() -> (DraftAutosaver, Arc<Storage>) {
        let storage = Arc::new(Storage::in_memory(EngineConfig::default()));
        (DraftAutosaver::new(storage.clone(), DELAY), storage)
    }

    async fn settle(duration: Duration) {
        tokio::time::sleep(duration).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_writes_once_with_last_content() {
        let (autosaver, storage) = autosaver();
        for content in ["x1", "x2", "x3", "x4", "x5"] {
            autosaver.schedule(content, Some("conv1"));
            settle(Duration::from_millis(500)).await;
        }
        assert!(storage.drafts().all().is_empty());
        assert_eq!(autosaver.pending_count(), 1);

        settle(DELAY).await;
        let drafts = storage.drafts().all();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].content, "x5");
        assert!(drafts[0].auto_saved);
        assert_eq!(autosaver.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_window_replaces_draft() {
        let (autosaver, storage) = autosaver();
        autosaver.schedule("first", Some("conv1"));
        settle(DELAY + Duration::from_millis(100)).await;
        autosaver.schedule("second", Some("conv1"));
        settle(DELAY + Duration::from_millis(100)).await;

        let drafts = storage.drafts().all();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].content, "second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_conversations_debounce_independently() {
        let (autosaver, storage) = autosaver();
        autosaver.schedule("a", Some("conv1"));
        autosaver.schedule("b", Some("conv2"));
        autosaver.schedule("c", None);
        assert_eq!(autosaver.pending_count(), 3);

        settle(DELAY + Duration::from_millis(100)).await;
        assert_eq!(storage.drafts().all().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_content_cancels_pending() {
        let (autosaver, storage) = autosaver();
        autosaver.schedule("typed", Some("conv1"));
        autosaver.schedule("   ", Some("conv1"));
        assert_eq!(autosaver.pending_count(), 0);

        settle(DELAY + Duration::from_millis(100)).await;
        assert!(storage.drafts().all().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_immediately() {
        let (autosaver, storage) = autosaver();
        autosaver.schedule("one", Some("conv1"));
        autosaver.schedule("two", Some("conv2"));
        assert_eq!(autosaver.flush(), 2);
        assert_eq!(storage.drafts().all().len(), 2);

        // The aborted timers must not write again
        settle(DELAY + Duration::from_millis(100)).await;
        assert_eq!(storage.drafts().all().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let (autosaver, storage) = autosaver();
        autosaver.schedule("draft", None);
        assert!(autosaver.cancel(None));
        assert!(!autosaver.cancel(None));
        settle(DELAY + Duration::from_millis(100)).await;
        assert!(storage.drafts().all().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_autosaver_stops_timers() {
        let (autosaver, storage) = autosaver();
        autosaver.schedule("abandoned", Some("conv1"));
        drop(autosaver);

        settle(DELAY + Duration::from_millis(100)).await;
        assert!(storage.drafts().all().is_empty());
    }

    #[test]
    fn test_without_runtime_writes_immediately() {
        let (autosaver, storage) = autosaver();
        autosaver.schedule("sync path", Some("conv1"));
        assert_eq!(autosaver.pending_count(), 0);
        assert_eq!(storage.drafts().all()[0].content, "sync path");
    }
}
