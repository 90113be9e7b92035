use std::sync::Arc;

use super::persistence::Persistence;

/// Outcome of a quota check
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuotaCheck {
    /// Backend can't report usage; assume there is room
    Unknown,
    WithinLimit { ratio: f64 },
    /// Over the warning ratio, cleanup should run before the next write
    Pressure { ratio: f64 },
}

impl QuotaCheck {
    pub fn needs_cleanup(&self) -> bool {
        matches!(self, QuotaCheck::Pressure { .. })
    }
}

/// Estimates how much space the engine's keys take and whether the backend is
/// close to full. Purely advisory: it never blocks a write.
pub struct QuotaGuard {
    persistence: Arc<Persistence>,
    keys: Vec<String>,
    warning_ratio: f64,
}

impl QuotaGuard {
    pub fn new(persistence: Arc<Persistence>, keys: Vec<String>, warning_ratio: f64) -> Self {
        Self {
            persistence,
            keys,
            warning_ratio,
        }
    }

    /// Bytes used by the serialized values of every managed key
    pub fn estimate_usage(&self) -> u64 {
        self.keys.iter().map(|key| self.persistence.raw_len(key)).sum()
    }

    pub fn check(&self) -> QuotaCheck {
        let Some(ratio) = self.persistence.estimate().and_then(|e| e.ratio()) else {
            return QuotaCheck::Unknown;
        };

        if ratio > self.warning_ratio {
            tracing::warn!(
                "Storage usage high: {}% (threshold {}%)",
                (ratio * 100.0).round(),
                (self.warning_ratio * 100.0).round()
            );
            QuotaCheck::Pressure { ratio }
        } else {
            QuotaCheck::WithinLimit { ratio }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::kv::{KeyValueStore, MemoryStore};

    #[test]
    fn test_usage_counts_only_managed_keys() {
        let backend = Arc::new(MemoryStore::new());
        backend.set_item("ns:a", "12345").unwrap();
        backend.set_item("ns:b", "123").unwrap();
        backend.set_item("other", "1234567890").unwrap();

        let guard = QuotaGuard::new(
            Arc::new(Persistence::new(backend)),
            vec!["ns:a".into(), "ns:b".into(), "ns:missing".into()],
            0.8,
        );
        assert_eq!(guard.estimate_usage(), 8);
        assert_eq!(guard.check(), QuotaCheck::Unknown);
        assert!(!guard.check().needs_cleanup());
    }

    #[test]
    fn test_pressure_above_ratio() {
        let backend = Arc::new(MemoryStore::with_quota(100));
        backend.set_item("k", &"x".repeat(89)).unwrap();
        let guard = QuotaGuard::new(
            Arc::new(Persistence::new(backend.clone())),
            vec!["k".into()],
            0.8,
        );
        assert_eq!(guard.check(), QuotaCheck::Pressure { ratio: 0.9 });

        backend.set_item("k", "x").unwrap();
        assert!(matches!(guard.check(), QuotaCheck::WithinLimit { .. }));
    }
}
