//! Load pipeline error types.

use convmap_types::ConversationId;
use thiserror::Error;

/// Failures surfaced to the caller of `load_tree`.
///
/// Only a missing root is fatal. Fetch gaps on non-root vertices degrade
/// to an absent branch, and cancellation is expressed by dropping the
/// future; neither produces an error value.
#[derive(Debug, Clone, Error)]
pub enum TreeLoadError {
    /// The root conversation could not be fetched at all.
    #[error("root conversation not found: {id}")]
    RootNotFound {
        /// The requested root id.
        id: ConversationId,
    },
}

impl TreeLoadError {
    /// Stable error code for callers that map errors across a boundary.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RootNotFound { .. } => "ROOT_NOT_FOUND",
        }
    }
}
