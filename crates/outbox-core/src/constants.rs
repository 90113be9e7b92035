//! Engine-wide constants
//!
//! Centralized location for storage keys, collection limits and timing values
//! that are used across multiple modules. Most of these are only defaults; the
//! live values come from [`crate::config::EngineConfig`].

/// Namespace prepended to every persisted key
pub const DEFAULT_KEY_PREFIX: &str = "outbox";

// Key suffixes, joined to the prefix with ':'
pub const MESSAGES_KEY: &str = "offline-messages";
pub const DRAFTS_KEY: &str = "message-drafts";
pub const QUEUE_KEY: &str = "offline-queue";
pub const LAST_SYNC_KEY: &str = "last-sync";

// Collection limits
pub const MAX_MESSAGES: usize = 1000;
pub const MAX_DRAFTS: usize = 50;
pub const MAX_QUEUE_SIZE: usize = 100;

/// Backoff schedule in milliseconds, indexed by `retry_count - 1` and clamped at the end
pub const RETRY_DELAYS_MS: [u64; 5] = [1_000, 5_000, 15_000, 60_000, 300_000];

/// Retry ceiling used when an action is enqueued without an explicit one
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Quiet period before an autosaved draft is written
pub const AUTO_SAVE_DELAY_MS: u64 = 3_000;

/// usage/quota ratio above which cleanup runs before the next write
pub const STORAGE_QUOTA_WARNING: f64 = 0.8;

/// Exhausted queue items older than this (measured from enqueue time) are purged
pub const EXHAUSTED_RETENTION_MS: u64 = 24 * 60 * 60 * 1000;

/// Format version written into export bundles
pub const EXPORT_VERSION: &str = "1.0";
