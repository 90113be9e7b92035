use async_trait::async_trait;

use crate::models::{
    ConversationSavePayload, QueuedAction, RegeneratePayload, SendMessagePayload,
};

/// Performs queued actions against the remote side once connectivity is back.
///
/// `Ok(true)` means the action went through, `Ok(false)` a soft failure (worth
/// retrying), and `Err` a failure whose message is kept as the item's `lastError`.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn send_message(&self, payload: &SendMessagePayload) -> anyhow::Result<bool>;

    async fn regenerate(&self, payload: &RegeneratePayload) -> anyhow::Result<bool>;

    async fn save_conversation(&self, payload: &ConversationSavePayload) -> anyhow::Result<bool>;
}

/// Run one action; `Err` carries the failure reason when the executor gave one
pub(crate) async fn dispatch(
    executor: &dyn ActionExecutor,
    action: &QueuedAction,
) -> Result<(), Option<String>> {
    let result = match action {
        QueuedAction::SendMessage(payload) => executor.send_message(payload).await,
        QueuedAction::Regenerate(payload) => executor.regenerate(payload).await,
        QueuedAction::ConversationSave(payload) => executor.save_conversation(payload).await,
    };

    match result {
        Ok(true) => Ok(()),
        Ok(false) => Err(None),
        Err(e) => Err(Some(format!("{:#}", e))),
    }
}
