use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use outbox_core::Storage;
use serde_json::{json, Value};

/// One maintenance operation against a data directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    Stats,
    Messages { pending: bool },
    Drafts { conversation: Option<String> },
    Queue { exhausted: bool },
    Export { out: Option<PathBuf> },
    Import { file: PathBuf },
    Cleanup,
    Requeue { id: String },
    DiscardExhausted,
    Clear { yes: bool },
}

fn format_millis(millis: u64) -> Option<String> {
    let millis = i64::try_from(millis).ok()?;
    DateTime::<Utc>::from_timestamp_millis(millis).map(|d| d.to_rfc3339())
}

/// Execute a command; the returned JSON is what gets printed
pub fn run(storage: &Storage, command: Command) -> Result<Value> {
    tracing::debug!(?command, "running command");

    let output = match command {
        Command::Status => {
            let stats = storage.stats();
            let quota = storage.guard().check();
            json!({
                "keyPrefix": storage.config().key_prefix,
                "stats": stats,
                "lastSyncAt": stats.last_sync.and_then(format_millis),
                "needsCleanup": quota.needs_cleanup(),
            })
        }
        Command::Stats => serde_json::to_value(storage.stats())?,
        Command::Messages { pending } => {
            let messages = if pending {
                storage.messages().pending()
            } else {
                storage.messages().all()
            };
            serde_json::to_value(messages)?
        }
        Command::Drafts { conversation } => {
            let drafts = storage.drafts().all();
            let drafts: Vec<Value> = drafts
                .iter()
                .filter(|d| conversation.is_none() || d.conversation_id == conversation)
                .map(|d| {
                    json!({
                        "id": d.id,
                        "conversationId": d.conversation_id,
                        "autoSaved": d.auto_saved,
                        "savedAt": format_millis(d.timestamp),
                        "preview": d.preview(),
                    })
                })
                .collect();
            Value::Array(drafts)
        }
        Command::Queue { exhausted } => {
            let items = if exhausted {
                storage.queue().exhausted_items()
            } else {
                storage.queue().items()
            };
            serde_json::to_value(items)?
        }
        Command::Export { out } => {
            let bundle = storage.export_data();
            match out {
                Some(path) => {
                    let json = serde_json::to_string_pretty(&bundle)?;
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write export: {}", path.display()))?;
                    json!({
                        "exported": path.display().to_string(),
                        "messages": bundle.messages.len(),
                        "drafts": bundle.drafts.len(),
                        "queue": bundle.queue.len(),
                    })
                }
                None => serde_json::to_value(bundle)?,
            }
        }
        Command::Import { file } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read import file: {}", file.display()))?;
            let result = storage.import_json(&json);
            if !result.success {
                bail!("Import rejected: {}", result.errors.join("; "));
            }
            serde_json::to_value(result)?
        }
        Command::Cleanup => serde_json::to_value(storage.cleanup())?,
        Command::Requeue { id } => {
            if !storage.requeue(&id) {
                bail!("No queue item with id {}", id);
            }
            json!({ "requeued": id })
        }
        Command::DiscardExhausted => json!({ "discarded": storage.queue().discard_exhausted() }),
        Command::Clear { yes } => {
            if !yes {
                bail!("Refusing to clear all offline data without --yes");
            }
            json!({ "cleared": storage.clear_all() })
        }
    };

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use outbox_core::{
        ChatMessage, DeliveryStatus, EngineConfig, QueuedAction, RegeneratePayload, Role,
        SendMessagePayload,
    };

    fn storage() -> Storage {
        Storage::in_memory(EngineConfig::default())
    }

    fn regenerate() -> QueuedAction {
        QueuedAction::Regenerate(RegeneratePayload {
            conversation_id: "c1".into(),
            message_index: None,
            model: None,
        })
    }

    #[test]
    fn test_status_reports_stats() {
        let storage = storage();
        storage
            .messages()
            .save(ChatMessage::new(Role::User, "hi", 1), true)
            .unwrap();
        let output = run(&storage, Command::Status).unwrap();
        assert_eq!(output["keyPrefix"], "outbox");
        assert_eq!(output["stats"]["pendingSync"], 1);
        assert!(output["lastSyncAt"].is_null());
    }

    #[test]
    fn test_drafts_filtered_by_conversation() {
        let storage = storage();
        storage.drafts().save("one", Some("c1"), false).unwrap();
        storage.drafts().save("two\nlines", Some("c2"), false).unwrap();

        let output = run(
            &storage,
            Command::Drafts {
                conversation: Some("c2".into()),
            },
        )
        .unwrap();
        let drafts = output.as_array().unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0]["preview"], "two lines");
    }

    #[test]
    fn test_queue_requeue_and_discard() {
        let storage = storage();
        let id = storage.queue().enqueue(regenerate(), Some(1)).unwrap();
        storage.queue().report_outcome(&id, false);

        let output = run(&storage, Command::Queue { exhausted: true }).unwrap();
        assert_eq!(output.as_array().unwrap().len(), 1);
        assert_eq!(output[0]["type"], "regenerate");

        run(&storage, Command::Requeue { id: id.clone() }).unwrap();
        assert!(storage.queue().exhausted_items().is_empty());
        assert!(run(&storage, Command::Requeue { id: "queue-missing".into() }).is_err());

        storage.queue().report_outcome(&id, false);
        let output = run(&storage, Command::DiscardExhausted).unwrap();
        assert_eq!(output["discarded"], 1);
    }

    #[test]
    fn test_requeue_revives_linked_message() {
        let storage = storage();
        let message = ChatMessage::new(Role::User, "never arrived", 1);
        let local_id = storage.messages().save(message.clone(), true).unwrap();
        let action = QueuedAction::SendMessage(SendMessagePayload {
            local_id: Some(local_id.clone()),
            conversation_id: Some("c1".into()),
            message,
        });
        let id = storage.queue().enqueue(action, Some(1)).unwrap();
        storage.queue().report_outcome(&id, false);
        storage.messages().update_status(&local_id, DeliveryStatus::Failed);

        run(&storage, Command::Requeue { id }).unwrap();
        assert_eq!(
            storage.messages().get(&local_id).unwrap().sync_status,
            DeliveryStatus::Pending
        );
        let output = run(&storage, Command::Stats).unwrap();
        assert_eq!(output["pendingSync"], 1);
        assert_eq!(output["failedSync"], 0);
    }

    #[test]
    fn test_export_then_import_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        let source = storage();
        source.drafts().save("carry me over", None, false).unwrap();
        let output = run(
            &source,
            Command::Export {
                out: Some(path.clone()),
            },
        )
        .unwrap();
        assert_eq!(output["drafts"], 1);

        let target = storage();
        let output = run(&target, Command::Import { file: path }).unwrap();
        assert_eq!(output["success"], true);
        assert_eq!(target.drafts().all()[0].content, "carry me over");
    }

    #[test]
    fn test_import_rejects_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"queue": 5}"#).unwrap();
        let err = run(&storage(), Command::Import { file: path }).unwrap_err();
        assert!(err.to_string().contains("queue: must be an array"));
    }

    #[test]
    fn test_clear_requires_confirmation() {
        let storage = storage();
        storage.drafts().save("draft", None, false).unwrap();
        assert!(run(&storage, Command::Clear { yes: false }).is_err());
        assert_eq!(storage.drafts().all().len(), 1);

        run(&storage, Command::Clear { yes: true }).unwrap();
        assert!(storage.drafts().all().is_empty());
    }
}
