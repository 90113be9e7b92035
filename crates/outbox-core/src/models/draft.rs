use serde::{Deserialize, Serialize};

use super::{generate_id, Timestamped};

/// Unsent composer content, either autosaved or saved on request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDraft {
    pub id: String,
    /// Always trimmed and non-empty
    pub content: String,
    /// Last write time
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub auto_saved: bool,
}

impl MessageDraft {
    /// Build a draft, or `None` when the content is only whitespace
    pub fn new(
        content: &str,
        conversation_id: Option<&str>,
        auto_saved: bool,
        now: u64,
    ) -> Option<Self> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        Some(Self {
            id: generate_id("draft"),
            content: content.to_string(),
            timestamp: now,
            conversation_id: conversation_id.map(str::to_string),
            auto_saved,
        })
    }

    /// True for the autosave slot of the given conversation
    pub fn is_autosave_for(&self, conversation_id: Option<&str>) -> bool {
        self.auto_saved && self.conversation_id.as_deref() == conversation_id
    }

    /// First 100 chars on a single line
    pub fn preview(&self) -> String {
        self.content
            .chars()
            .take(100)
            .collect::<String>()
            .replace('\n', " ")
    }
}

impl Timestamped for MessageDraft {
    fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_is_not_a_draft() {
        assert!(MessageDraft::new("   \n\t", Some("conv1"), true, 1).is_none());
    }

    #[test]
    fn test_content_is_trimmed() {
        let draft = MessageDraft::new("  hello \n", None, false, 1).unwrap();
        assert_eq!(draft.content, "hello");
        assert!(draft.id.starts_with("draft-"));
    }

    #[test]
    fn test_autosave_slot_matching() {
        let draft = MessageDraft::new("x", Some("conv1"), true, 1).unwrap();
        assert!(draft.is_autosave_for(Some("conv1")));
        assert!(!draft.is_autosave_for(Some("conv2")));
        assert!(!draft.is_autosave_for(None));

        let explicit = MessageDraft::new("x", Some("conv1"), false, 1).unwrap();
        assert!(!explicit.is_autosave_for(Some("conv1")));
    }

    #[test]
    fn test_preview_is_single_line() {
        let long = format!("line one\nline two {}", "z".repeat(200));
        let draft = MessageDraft::new(&long, None, false, 1).unwrap();
        let preview = draft.preview();
        assert_eq!(preview.chars().count(), 100);
        assert!(!preview.contains('\n'));
    }
}
