//! Durable retry queue for deferred actions.
//!
//! Items are selected in enqueue order once their backoff has elapsed. A failure
//! bumps `retryCount` and schedules the next attempt from a fixed backoff table; at
//! the retry ceiling the item is *exhausted*: it stays stored (and visible through
//! [`SyncQueue::exhausted_items`]) but is never selected again unless requeued.
//! Processing is driven from outside; the queue runs no timers of its own.

use std::sync::Arc;

use super::collection::BoundedCollection;
use super::persistence::Persistence;
use crate::clock::SharedClock;
use crate::models::{QueueItem, QueueItemState, QueuedAction};

/// What happened to an item after an outcome was reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppliedOutcome {
    /// Succeeded and was removed
    Completed(QueueItem),
    /// Failed, will be ready again at `next_retry`
    Retrying(QueueItem),
    /// Failed for the last time
    Exhausted(QueueItem),
}

pub struct SyncQueue {
    collection: BoundedCollection<QueueItem>,
    clock: SharedClock,
    retry_delays: Vec<u64>,
    default_max_retries: u32,
}

impl SyncQueue {
    pub fn new(
        persistence: Arc<Persistence>,
        key: &str,
        max: usize,
        clock: SharedClock,
        retry_delays: Vec<u64>,
        default_max_retries: u32,
    ) -> Self {
        Self {
            collection: BoundedCollection::new(persistence, key, max),
            clock,
            retry_delays,
            default_max_retries,
        }
    }

    pub(crate) fn collection(&self) -> &BoundedCollection<QueueItem> {
        &self.collection
    }

    /// Add an action; returns the queue item id, or `None` if it couldn't be persisted
    pub fn enqueue(&self, action: QueuedAction, max_retries: Option<u32>) -> Option<String> {
        let max_retries = match max_retries {
            Some(0) => {
                tracing::warn!("maxRetries must be positive, using 1");
                1
            }
            Some(n) => n,
            None => self.default_max_retries,
        };
        let item = QueueItem::new(action, max_retries, self.clock.now_millis());
        let id = item.id.clone();
        let kind = item.kind();

        if self.collection.append(item) {
            tracing::debug!(%id, %kind, max_retries, "queued action");
            Some(id)
        } else {
            None
        }
    }

    /// Every stored item, in enqueue order
    pub fn items(&self) -> Vec<QueueItem> {
        self.collection.list()
    }

    pub fn get(&self, id: &str) -> Option<QueueItem> {
        self.collection.find(|item| item.id == id)
    }

    pub fn len(&self) -> usize {
        self.collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items eligible for an attempt right now, in enqueue order
    pub fn ready_items(&self) -> Vec<QueueItem> {
        let now = self.clock.now_millis();
        self.items()
            .into_iter()
            .filter(|item| item.is_ready(now))
            .collect()
    }

    /// Items that hit their retry ceiling
    pub fn exhausted_items(&self) -> Vec<QueueItem> {
        self.items()
            .into_iter()
            .filter(QueueItem::is_exhausted)
            .collect()
    }

    /// Report the result of an attempt. Returns false for an unknown id.
    pub fn report_outcome(&self, id: &str, success: bool) -> bool {
        let outcome = if success { Ok(()) } else { Err(None) };
        self.apply_outcome(id, outcome).is_some()
    }

    /// Report a result with the failure reason, if any.
    ///
    /// Returns `None` when the id is unknown or the update couldn't be persisted.
    pub fn apply_outcome(
        &self,
        id: &str,
        outcome: Result<(), Option<String>>,
    ) -> Option<AppliedOutcome> {
        let now = self.clock.now_millis();
        let delays = &self.retry_delays;

        self.collection.mutate(|items| {
            let index = items.iter().position(|item| item.id == id)?;
            match outcome {
                Ok(()) => Some(AppliedOutcome::Completed(items.remove(index))),
                Err(error) => {
                    let item = &mut items[index];
                    match item.record_failure(now, delays, error) {
                        QueueItemState::Exhausted => {
                            tracing::warn!(
                                id = %item.id,
                                kind = %item.kind(),
                                retries = item.retry_count,
                                "action exhausted its retries"
                            );
                            Some(AppliedOutcome::Exhausted(item.clone()))
                        }
                        _ => Some(AppliedOutcome::Retrying(item.clone())),
                    }
                }
            }
        })
    }

    /// Give an item a fresh set of attempts. Returns false for an unknown id.
    pub fn requeue(&self, id: &str) -> bool {
        self.collection.update(|item| item.id == id, QueueItem::reset)
    }

    /// Drop every exhausted item; returns how many were removed
    pub fn discard_exhausted(&self) -> usize {
        self.collection.remove_where(QueueItem::is_exhausted)
    }

    /// Drop exhausted items enqueued more than `retention_ms` ago
    pub fn purge_expired(&self, retention_ms: u64) -> usize {
        let now = self.clock.now_millis();
        self.collection.remove_where(|item| {
            item.is_exhausted() && now.saturating_sub(item.timestamp) >= retention_ms
        })
    }
}
