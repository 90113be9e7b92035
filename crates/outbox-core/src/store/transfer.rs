//! Export and import of the engine's collections as one JSON document.
//!
//! Import is all-or-nothing: every present collection is validated first, and
//! nothing is written unless the whole document checks out. If a write fails
//! half way, the collections already replaced are restored.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Storage;
use crate::constants::EXPORT_VERSION;
use crate::models::{DeliveryStatus, MessageDraft, OfflineMessage, QueueItem, StorageStats};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub version: String,
    /// Milliseconds since the epoch
    pub export_date: u64,
    pub messages: Vec<OfflineMessage>,
    pub drafts: Vec<MessageDraft>,
    pub queue: Vec<QueueItem>,
    pub stats: StorageStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: bool,
    pub errors: Vec<String>,
}

impl ImportResult {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            success: errors.is_empty(),
            errors,
        }
    }
}

/// Collections that passed validation; `None` means "absent, leave as is"
#[derive(Default)]
struct ValidatedImport {
    messages: Option<Vec<OfflineMessage>>,
    drafts: Option<Vec<MessageDraft>>,
    queue: Option<Vec<QueueItem>>,
}

impl Storage {
    pub fn export_data(&self) -> ExportBundle {
        ExportBundle {
            version: EXPORT_VERSION.to_string(),
            export_date: self.clock().now_millis(),
            messages: self.messages().all(),
            drafts: self.drafts().all(),
            queue: self.queue().items(),
            stats: self.stats(),
        }
    }

    /// Import from a JSON string. A document that doesn't parse is reported, not fatal.
    pub fn import_json(&self, json: &str) -> ImportResult {
        match serde_json::from_str::<Value>(json) {
            Ok(value) => self.import_data(&value),
            Err(e) => ImportResult::from_errors(vec![format!("invalid JSON: {}", e)]),
        }
    }

    pub fn import_data(&self, data: &Value) -> ImportResult {
        let (validated, errors) = validate(data);
        if !errors.is_empty() {
            tracing::warn!(errors = errors.len(), "import rejected");
            return ImportResult::from_errors(errors);
        }

        if let Err(error) = self.apply_import(validated) {
            return ImportResult::from_errors(vec![error]);
        }

        self.ensure_headroom();
        tracing::info!("import applied");
        ImportResult::from_errors(Vec::new())
    }

    fn apply_import(&self, import: ValidatedImport) -> Result<(), String> {
        let previous_messages = self.messages().all();
        let previous_drafts = self.drafts().all();
        let previous_queue = self.queue().items();

        let mut written: Vec<&str> = Vec::new();
        let mut failed: Option<&str> = None;

        if let Some(messages) = &import.messages {
            if self.messages().collection().replace_all(messages) {
                written.push("messages");
            } else {
                failed = Some("messages");
            }
        }
        if failed.is_none() {
            if let Some(drafts) = &import.drafts {
                if self.drafts().collection().replace_all(drafts) {
                    written.push("drafts");
                } else {
                    failed = Some("drafts");
                }
            }
        }
        if failed.is_none() {
            if let Some(queue) = &import.queue {
                if self.queue().collection().replace_all(queue) {
                    written.push("queue");
                } else {
                    failed = Some("queue");
                }
            }
        }

        let Some(failed) = failed else {
            return Ok(());
        };

        // Put back whatever was already replaced
        for name in &written {
            let restored = match *name {
                "messages" => self.messages().collection().replace_all(&previous_messages),
                "drafts" => self.drafts().collection().replace_all(&previous_drafts),
                _ => self.queue().collection().replace_all(&previous_queue),
            };
            if !restored {
                tracing::error!(collection = *name, "failed to roll back import");
            }
        }
        Err(format!("{}: failed to write imported data", failed))
    }
}

fn validate(data: &Value) -> (ValidatedImport, Vec<String>) {
    let mut errors = Vec::new();
    let mut validated = ValidatedImport::default();

    let Some(object) = data.as_object() else {
        errors.push("import data must be a JSON object".to_string());
        return (validated, errors);
    };

    match object.get("version") {
        None | Some(Value::Null) => {}
        Some(Value::String(version)) => {
            let major = version.split('.').next().unwrap_or_default();
            let expected = EXPORT_VERSION.split('.').next().unwrap_or_default();
            if major != expected {
                errors.push(format!("version: unsupported version {}", version));
            }
        }
        Some(_) => errors.push("version: must be a string".to_string()),
    }

    validated.messages = parse_collection(object.get("messages"), "messages", &mut errors)
        .map(|messages: Vec<OfflineMessage>| {
            check_messages(&messages, &mut errors);
            messages
        });
    validated.drafts = parse_collection(object.get("drafts"), "drafts", &mut errors).map(
        |drafts: Vec<MessageDraft>| {
            check_drafts(&drafts, &mut errors);
            drafts
        },
    );
    validated.queue = parse_collection(object.get("queue"), "queue", &mut errors).map(
        |queue: Vec<QueueItem>| {
            check_queue(&queue, &mut errors);
            queue
        },
    );

    (validated, errors)
}

/// Parse a present collection element by element so each bad entry gets its own error
fn parse_collection<T: DeserializeOwned>(
    value: Option<&Value>,
    name: &str,
    errors: &mut Vec<String>,
) -> Option<Vec<T>> {
    let value = match value {
        None | Some(Value::Null) => return None,
        Some(value) => value,
    };
    let Some(elements) = value.as_array() else {
        errors.push(format!("{}: must be an array", name));
        return None;
    };

    let mut parsed = Vec::with_capacity(elements.len());
    for (index, element) in elements.iter().enumerate() {
        match T::deserialize(element) {
            Ok(item) => parsed.push(item),
            Err(e) => errors.push(format!("{}[{}]: {}", name, index, e)),
        }
    }
    Some(parsed)
}

fn check_unique<'a>(
    ids: impl Iterator<Item = &'a str>,
    name: &str,
    errors: &mut Vec<String>,
) {
    let mut seen = HashSet::new();
    for (index, id) in ids.enumerate() {
        if !seen.insert(id) {
            errors.push(format!("{}[{}]: duplicate id {}", name, index, id));
        }
    }
}

fn check_messages(messages: &[OfflineMessage], errors: &mut Vec<String>) {
    for (index, message) in messages.iter().enumerate() {
        if message.sync_status == DeliveryStatus::Synced && message.sent_offline {
            errors.push(format!(
                "messages[{}]: synced message cannot be marked sentOffline",
                index
            ));
        }
    }
    check_unique(messages.iter().map(|m| m.local_id.as_str()), "messages", errors);
}

fn check_drafts(drafts: &[MessageDraft], errors: &mut Vec<String>) {
    for (index, draft) in drafts.iter().enumerate() {
        if draft.content.trim().is_empty() {
            errors.push(format!("drafts[{}]: content is empty", index));
        }
    }
    check_unique(drafts.iter().map(|d| d.id.as_str()), "drafts", errors);
}

fn check_queue(queue: &[QueueItem], errors: &mut Vec<String>) {
    for (index, item) in queue.iter().enumerate() {
        if item.max_retries == 0 {
            errors.push(format!("queue[{}]: maxRetries must be positive", index));
        } else if item.retry_count > item.max_retries {
            errors.push(format!(
                "queue[{}]: retryCount {} exceeds maxRetries {}",
                index, item.retry_count, item.max_retries
            ));
        }
    }
    check_unique(queue.iter().map(|q| q.id.as_str()), "queue", errors);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::clock::ManualClock;
    use crate::config::EngineConfig;
    use crate::models::{ChatMessage, QueuedAction, RegeneratePayload, Role};
    use crate::store::kv::{KeyValueStore, MemoryStore, StoreError};

    fn storage() -> Storage {
        Storage::new(
            Arc::new(MemoryStore::new()),
            EngineConfig::default(),
            Arc::new(ManualClock::new(5_000)),
        )
    }

    fn populate(storage: &Storage) {
        storage
            .messages()
            .save(ChatMessage::new(Role::User, "hello", 1), true)
            .unwrap();
        storage.drafts().save("half written", Some("c1"), true).unwrap();
        storage
            .queue()
            .enqueue(
                QueuedAction::Regenerate(RegeneratePayload {
                    conversation_id: "c1".into(),
                    message_index: None,
                    model: Some("gpt".into()),
                }),
                None,
            )
            .unwrap();
    }

    #[test]
    fn test_export_import_round_trip() {
        let source = storage();
        populate(&source);
        let bundle = source.export_data();
        assert_eq!(bundle.version, "1.0");
        assert_eq!(bundle.export_date, 5_000);
        assert_eq!(bundle.stats.total_messages, 1);

        let json = serde_json::to_string(&bundle).unwrap();
        let target = storage();
        let result = target.import_json(&json);
        assert!(result.success, "{:?}", result.errors);

        assert_eq!(target.messages().all(), source.messages().all());
        assert_eq!(target.drafts().all(), source.drafts().all());
        assert_eq!(target.queue().items(), source.queue().items());
    }

    #[test]
    fn test_invalid_import_applies_nothing() {
        let target = storage();
        populate(&target);
        let before = target.export_data();

        let result = target.import_data(&json!({
            "version": "1.0",
            "drafts": [],
            "messages": [{ "localId": "x", "role": "user" }],
            "queue": "nope"
        }));

        assert!(!result.success);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].starts_with("messages[0]:"));
        assert_eq!(result.errors[1], "queue: must be an array");
        assert_eq!(target.drafts().all(), before.drafts);
        assert_eq!(target.messages().all(), before.messages);
    }

    #[test]
    fn test_import_rejects_broken_invariants() {
        let target = storage();
        let result = target.import_data(&json!({
            "messages": [
                { "localId": "m1", "role": "user", "content": "a", "timestamp": 1,
                  "sentOffline": true, "retryCount": 0, "syncStatus": "synced" }
            ],
            "drafts": [
                { "id": "d1", "content": "  ", "timestamp": 1, "autoSaved": false }
            ],
            "queue": [
                { "id": "q1", "type": "regenerate", "payload": { "conversationId": "c" },
                  "timestamp": 1, "retryCount": 4, "maxRetries": 3 },
                { "id": "q1", "type": "regenerate", "payload": { "conversationId": "c" },
                  "timestamp": 2, "retryCount": 0, "maxRetries": 0 }
            ]
        }));

        assert!(!result.success);
        assert_eq!(result.errors.len(), 5);
        assert_eq!(target.stats().queue_size, 0);
    }

    #[test]
    fn test_absent_collections_are_kept() {
        let target = storage();
        populate(&target);
        let result = target.import_data(&json!({ "drafts": [] }));
        assert!(result.success);
        assert!(target.drafts().all().is_empty());
        assert_eq!(target.messages().all().len(), 1);
        assert_eq!(target.queue().len(), 1);
    }

    #[test]
    fn test_rejects_wrong_shape_and_version() {
        let target = storage();
        assert!(!target.import_data(&json!([1, 2])).success);
        assert!(!target.import_json("{not json").success);

        let result = target.import_data(&json!({ "version": "2.0" }));
        assert_eq!(result.errors, vec!["version: unsupported version 2.0".to_string()]);
    }

    /// Fails every write to one key
    struct FailingKeyStore {
        inner: MemoryStore,
        fail_key: parking_lot::Mutex<Option<String>>,
    }

    impl KeyValueStore for FailingKeyStore {
        fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
            if self.fail_key.lock().as_deref() == Some(key) {
                return Err(StoreError::Unavailable("disk detached".into()));
            }
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> Result<(), StoreError> {
            self.inner.remove_item(key)
        }
    }

    #[test]
    fn test_partial_write_failure_rolls_back() {
        let backend = Arc::new(FailingKeyStore {
            inner: MemoryStore::new(),
            fail_key: parking_lot::Mutex::new(None),
        });
        let target = Storage::new(
            backend.clone(),
            EngineConfig::default(),
            Arc::new(ManualClock::new(5_000)),
        );
        populate(&target);
        let before = target.export_data();

        *backend.fail_key.lock() = Some(target.keys().drafts.clone());
        let result = target.import_data(&json!({ "messages": [], "drafts": [] }));

        assert!(!result.success);
        assert_eq!(
            result.errors,
            vec!["drafts: failed to write imported data".to_string()]
        );
        assert_eq!(target.messages().all(), before.messages);
        assert_eq!(target.drafts().all(), before.drafts);
    }
}
