//! Conversation identifiers and records.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::project::project_slug;

/// Stable identifier for a conversation (a hex event id in practice).
///
/// Plain string newtype: ids come from the store as opaque strings and are
/// compared, hashed, and ordered as such. Serializes transparently.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ConversationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One conversation as the data store reports it. Read-only from the
/// core's perspective; the store may hand back stale or partial records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    /// Stored parent link from the conversation's own parent tag.
    #[serde(default)]
    pub parent_id: Option<ConversationId>,
    /// Author pubkey.
    pub author: String,
    /// Recipient pubkeys (p-tags), in tag order.
    #[serde(default)]
    pub recipients: Vec<String>,
    /// Owning project tag, colon-delimited (`kind:pubkey:slug`).
    #[serde(default)]
    pub project: Option<String>,
    /// Unix seconds of the most recent activity.
    #[serde(default)]
    pub last_activity: u64,
    #[serde(default)]
    pub message_count: usize,
    /// Status label from conversation metadata (e.g. "In Progress").
    #[serde(default)]
    pub status_label: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    /// Whether an agent is currently working in this conversation.
    #[serde(default)]
    pub is_active: bool,
}

impl Conversation {
    /// Trailing slug segment of the project tag, if the record carries one.
    pub fn project_slug(&self) -> Option<&str> {
        self.project.as_deref().map(project_slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_orders_and_displays_as_plain_string() {
        let a = ConversationId::new("aaa");
        let b = ConversationId::new("bbb");
        assert!(a < b);
        assert_eq!(a.to_string(), "aaa");
        assert_eq!(a.as_str(), "aaa");
    }

    #[test]
    fn id_serializes_transparently() {
        let id = ConversationId::new("deadbeef");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"deadbeef\"");
        let back: ConversationId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn conversation_deserializes_with_defaults() {
        let json = r#"{"id":"c1","author":"pk1"}"#;
        let conv: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(conv.id, ConversationId::new("c1"));
        assert!(conv.parent_id.is_none());
        assert!(conv.recipients.is_empty());
        assert_eq!(conv.last_activity, 0);
        assert!(!conv.is_active);
    }

    #[test]
    fn project_slug_comes_from_trailing_segment() {
        let conv = Conversation {
            id: ConversationId::new("c1"),
            parent_id: None,
            author: "pk1".to_string(),
            recipients: vec![],
            project: Some("31933:abcdef:tenex".to_string()),
            last_activity: 0,
            message_count: 0,
            status_label: None,
            summary: None,
            is_active: false,
        };
        assert_eq!(conv.project_slug(), Some("tenex"));
    }
}
