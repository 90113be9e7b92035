//! Offline persistence and sync queue engine for chat clients.
//!
//! Keeps outbound work (message sends, regenerations, conversation saves) durable
//! while the network is unavailable, and replays it through a caller-supplied
//! [`ActionExecutor`] once connectivity returns.

pub mod autosave;
pub mod clock;
pub mod config;
pub mod constants;
pub mod controller;
pub mod events;
pub mod executor;
pub mod models;
pub mod store;

pub use autosave::DraftAutosaver;
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{ConfigError, CoreConfig, EngineConfig};
pub use controller::OfflineController;
pub use events::{DrainReport, SyncEvent};
pub use executor::ActionExecutor;
pub use models::{
    ActionKind, ChatMessage, ConversationSavePayload, DeliveryStatus, MessageDraft,
    OfflineMessage, OfflineStatus, QueueItem, QueueItemState, QueuedAction, RegeneratePayload,
    Role, SendMessagePayload, StatusKind, StorageStats,
};
pub use store::{
    ExportBundle, FileStore, ImportResult, KeyValueStore, MemoryStore, Storage, StoreError,
};
