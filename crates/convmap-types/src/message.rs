//! Message records and the delegation tool-name heuristic.

use serde::{Deserialize, Serialize};

use crate::conversation::ConversationId;

/// One message inside a conversation, reduced to the fields the
/// delegation map cares about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Display identity of the author (agent slug or user name).
    pub author: String,
    /// Author pubkey.
    pub pubkey: String,
    /// Tool name when this message is a tool call.
    #[serde(default)]
    pub tool_name: Option<String>,
    /// Conversation ids referenced by q-tags. On a delegation tool call
    /// these point at the child conversations that were spawned.
    #[serde(default)]
    pub q_tags: Vec<ConversationId>,
    /// Conversation id asserted by a delegation tag as this
    /// conversation's true parent.
    #[serde(default)]
    pub delegation_tag: Option<ConversationId>,
    /// Whether this is a reasoning/thinking message.
    #[serde(default)]
    pub is_reasoning: bool,
    #[serde(default)]
    pub content: String,
}

impl Message {
    pub fn is_tool_call(&self) -> bool {
        self.tool_name.is_some()
    }

    /// Whether this message is a delegation tool call.
    pub fn is_delegation(&self) -> bool {
        self.tool_name
            .as_deref()
            .is_some_and(is_delegation_tool_name)
    }
}

/// Delegation tool-name heuristic, case-sensitive.
///
/// Matches the bare `delegate` tool plus qualified forms such as
/// `delegate_external` and `mcp__tenex__delegate`. Substring matching is
/// approximate by design; callers treat a match as a hint, and a q-tag
/// that does not resolve to a real conversation is dropped downstream.
pub fn is_delegation_tool_name(name: &str) -> bool {
    name == "delegate"
        || name.contains("__delegate")
        || name.starts_with("delegate_")
        || name.ends_with("_delegate")
}
