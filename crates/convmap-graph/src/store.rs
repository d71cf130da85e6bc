//! The data-store boundary: the sole interface between this core and
//! whatever supplies conversation data.
//!
//! The core never reaches past this trait: no database handles, no
//! network clients. Each read is independently fallible so a flaky
//! backend degrades one branch of the graph, not the whole load.

use std::collections::HashMap;

use async_trait::async_trait;
use convmap_types::{Conversation, ConversationId, Message};
use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors a store implementation may report per call.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backend could not be reached at all.
    #[error("store backend unavailable: {reason}")]
    Unavailable { reason: String },

    /// A lookup for a specific conversation failed.
    #[error("lookup failed for {id}: {reason}")]
    Lookup {
        id: ConversationId,
        reason: String,
    },
}

/// Read operations the resolver consumes.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Fetch whichever of `ids` resolve. Missing ids are simply absent
    /// from the result, not an error.
    async fn conversations_by_ids(
        &self,
        ids: &[ConversationId],
    ) -> StoreResult<Vec<Conversation>>;

    /// Best-effort descendant ids for a root, from the hierarchy index.
    /// May be empty or incomplete.
    async fn descendant_hints(&self, root: &ConversationId)
        -> StoreResult<Vec<ConversationId>>;

    /// Ordered messages for one conversation. May be empty.
    async fn messages_for(&self, id: &ConversationId) -> StoreResult<Vec<Message>>;
}

/// In-process store over plain maps, for tests and demos.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    conversations: HashMap<ConversationId, Conversation>,
    messages: HashMap<ConversationId, Vec<Message>>,
    hints: HashMap<ConversationId, Vec<ConversationId>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conversation(mut self, conversation: Conversation) -> Self {
        self.conversations
            .insert(conversation.id.clone(), conversation);
        self
    }

    pub fn with_messages(
        mut self,
        id: impl Into<ConversationId>,
        messages: Vec<Message>,
    ) -> Self {
        self.messages.insert(id.into(), messages);
        self
    }

    pub fn with_hints(
        mut self,
        root: impl Into<ConversationId>,
        hints: Vec<ConversationId>,
    ) -> Self {
        self.hints.insert(root.into(), hints);
        self
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn conversations_by_ids(
        &self,
        ids: &[ConversationId],
    ) -> StoreResult<Vec<Conversation>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.conversations.get(id).cloned())
            .collect())
    }

    async fn descendant_hints(
        &self,
        root: &ConversationId,
    ) -> StoreResult<Vec<ConversationId>> {
        Ok(self.hints.get(root).cloned().unwrap_or_default())
    }

    async fn messages_for(&self, id: &ConversationId) -> StoreResult<Vec<Message>> {
        Ok(self.messages.get(id).cloned().unwrap_or_default())
    }
}
