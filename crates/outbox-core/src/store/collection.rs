use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::persistence::Persistence;
use crate::models::Timestamped;

/// An ordered collection stored as one JSON array under one key, capped at `max`
/// entries.
///
/// When an insertion pushes the collection past `max`, only the `max` most recent
/// entries (by timestamp, later insertion wins ties) are kept. Retained entries keep
/// their stored order. This is lossy on purpose: under pressure the oldest data goes.
///
/// Read-modify-write cycles are serialized per collection. Every mutation is
/// all-or-nothing: if the write fails, the stored array is left as it was.
pub struct BoundedCollection<T> {
    persistence: Arc<Persistence>,
    key: String,
    max: usize,
    write_lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> BoundedCollection<T>
where
    T: Serialize + DeserializeOwned + Timestamped,
{
    pub fn new(persistence: Arc<Persistence>, key: impl Into<String>, max: usize) -> Self {
        Self {
            persistence,
            key: key.into(),
            max,
            write_lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn list(&self) -> Vec<T> {
        self.persistence.read(&self.key)
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find(&self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        self.list().into_iter().find(|item| predicate(item))
    }

    /// Append one entry, evicting the oldest if the cap is exceeded
    pub fn append(&self, item: T) -> bool {
        self.mutate(|items| {
            items.push(item);
            Some(())
        })
        .is_some()
    }

    /// Run `f` over the stored entries and persist the result.
    ///
    /// `f` returns `None` to signal "nothing changed", in which case nothing is
    /// written. Returns `None` as well when the write fails.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut Vec<T>) -> Option<R>) -> Option<R> {
        let _guard = self.write_lock.lock();
        let mut items = self.list();
        let result = f(&mut items)?;

        let evicted = retain_newest(&mut items, self.max);
        if evicted > 0 {
            tracing::warn!(
                key = %self.key,
                evicted,
                max = self.max,
                "collection full, dropped oldest entries"
            );
        }

        if self.persistence.write(&self.key, &items) {
            Some(result)
        } else {
            None
        }
    }

    /// Apply `f` to the first entry matching `predicate`
    pub fn update(&self, predicate: impl Fn(&T) -> bool, f: impl FnOnce(&mut T)) -> bool {
        self.mutate(|items| {
            let item = items.iter_mut().find(|item| predicate(item))?;
            f(item);
            Some(())
        })
        .is_some()
    }

    /// Remove every entry matching `predicate`; returns how many were removed
    pub fn remove_where(&self, predicate: impl Fn(&T) -> bool) -> usize {
        self.mutate(|items| {
            let before = items.len();
            items.retain(|item| !predicate(item));
            let removed = before - items.len();
            if removed == 0 {
                None
            } else {
                Some(removed)
            }
        })
        .unwrap_or(0)
    }

    /// Replace the stored array wholesale, without applying the cap
    pub fn replace_all(&self, items: &[T]) -> bool {
        let _guard = self.write_lock.lock();
        self.persistence.write(&self.key, items)
    }

    /// Trim the stored array down to the cap; returns how many entries were dropped
    pub fn enforce_bound(&self) -> usize {
        let _guard = self.write_lock.lock();
        let mut items = self.list();
        let evicted = retain_newest(&mut items, self.max);
        if evicted == 0 {
            return 0;
        }
        if self.persistence.write(&self.key, &items) {
            tracing::info!(key = %self.key, evicted, "trimmed collection to its limit");
            evicted
        } else {
            0
        }
    }

    pub fn clear(&self) -> bool {
        let _guard = self.write_lock.lock();
        self.persistence.remove(&self.key)
    }
}

/// Keep the `max` most recent entries in their existing order; returns the number dropped
pub(crate) fn retain_newest<T: Timestamped>(items: &mut Vec<T>, max: usize) -> usize {
    if items.len() <= max {
        return 0;
    }

    // Newest first: higher timestamp, then later position
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| {
        items[b]
            .timestamp()
            .cmp(&items[a].timestamp())
            .then_with(|| b.cmp(&a))
    });

    let mut keep = vec![false; items.len()];
    for &index in order.iter().take(max) {
        keep[index] = true;
    }

    let before = items.len();
    let mut index = 0;
    items.retain(|_| {
        let kept = keep[index];
        index += 1;
        kept
    });
    before - items.len()
}
