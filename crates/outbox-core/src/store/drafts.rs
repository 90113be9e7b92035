use std::sync::Arc;

use super::collection::BoundedCollection;
use super::persistence::Persistence;
use crate::clock::SharedClock;
use crate::models::MessageDraft;

/// Persisted drafts.
///
/// Each conversation (including "no conversation") has at most one autosave slot;
/// saving an autosave replaces the slot. Explicit drafts are appended and live
/// until deleted or evicted.
pub struct DraftStore {
    collection: BoundedCollection<MessageDraft>,
    clock: SharedClock,
}

impl DraftStore {
    pub fn new(persistence: Arc<Persistence>, key: &str, max: usize, clock: SharedClock) -> Self {
        Self {
            collection: BoundedCollection::new(persistence, key, max),
            clock,
        }
    }

    pub(crate) fn collection(&self) -> &BoundedCollection<MessageDraft> {
        &self.collection
    }

    /// Save a draft immediately. Returns the new draft id, or `None` when the content
    /// is blank or the write failed.
    pub fn save(
        &self,
        content: &str,
        conversation_id: Option<&str>,
        auto_saved: bool,
    ) -> Option<String> {
        let Some(draft) =
            MessageDraft::new(content, conversation_id, auto_saved, self.clock.now_millis())
        else {
            tracing::debug!(?conversation_id, "ignoring blank draft");
            return None;
        };
        let id = draft.id.clone();

        self.collection.mutate(|drafts| {
            if auto_saved {
                drafts.retain(|d| !d.is_autosave_for(conversation_id));
            }
            drafts.push(draft);
            Some(())
        })?;

        Some(id)
    }

    pub fn all(&self) -> Vec<MessageDraft> {
        self.collection.list()
    }

    /// The autosaved draft for a conversation, if there is one
    pub fn for_conversation(&self, conversation_id: Option<&str>) -> Option<MessageDraft> {
        self.collection.find(|d| d.is_autosave_for(conversation_id))
    }

    /// Returns false when no draft has this id
    pub fn delete(&self, id: &str) -> bool {
        self.collection.remove_where(|d| d.id == id) > 0
    }
}
