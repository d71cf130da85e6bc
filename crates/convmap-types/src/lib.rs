//! Shared record types for the conversation delegation map.
//!
//! This crate is the single source of truth for data that crosses the
//! store and renderer boundaries:
//! - `ConversationId` - stable string identifiers for conversations
//! - `Conversation` - one conversation record as the store reports it
//! - `Message` - one message record, including delegation signals
//! - project-tag slug extraction
//! - the delegation tool-name heuristic
//!
//! Everything here is plain serde-derived data; no async, no I/O.

mod conversation;
mod message;
mod project;

pub use conversation::{Conversation, ConversationId};
pub use message::{is_delegation_tool_name, Message};
pub use project::project_slug;
