//! Delegation graph core: discover the delegation graph rooted at a
//! conversation, resolve it into a loop-free tree, and compute stable
//! 2-D node positions for a node-link diagram.
//!
//! # Architecture
//!
//! ```text
//! ConversationStore (async, read-only, per-call fallible)
//!        │
//!        ▼
//! resolve  (batched discovery + ranked parent resolution)
//!        │
//!        ▼
//! DelegationGraph (flat id-keyed maps, parent -> ordered children)
//!        │
//!        ▼
//! tree     (RootAuthor + Recipient nodes, visited-set recursion)
//!        │
//!        ├──► edges  (one merged edge per (parent, child) pair)
//!        │
//!        └──► layout (seed + 4x relax/compact, deterministic)
//! ```
//!
//! Data flows strictly downward; every stage after discovery is a pure,
//! synchronous function over already-fetched data. Each `load_tree` call
//! builds everything from scratch and publishes the result atomically;
//! dropping the future discards in-flight work wholesale, so a superseded
//! load never shows a partial tree.
//!
//! # Usage
//!
//! ```
//! use convmap_graph::{load_tree, MemoryStore};
//! use convmap_types::{Conversation, ConversationId};
//!
//! # async fn demo() -> Result<(), convmap_graph::TreeLoadError> {
//! let root = ConversationId::new("root");
//! let store = MemoryStore::new().with_conversation(Conversation {
//!     id: root.clone(),
//!     parent_id: None,
//!     author: "pk-user".to_string(),
//!     recipients: vec!["pk-agent".to_string()],
//!     project: None,
//!     last_activity: 1,
//!     message_count: 0,
//!     status_label: None,
//!     summary: None,
//!     is_active: false,
//! });
//! let view = load_tree(&store, &root).await?;
//! assert_eq!(view.edges.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod edges;
pub mod error;
pub mod layout;
pub mod pipeline;
pub mod resolve;
pub mod store;
pub mod tree;

pub use edges::{collect_edges, merge_edges, Edge};
pub use error::TreeLoadError;
pub use layout::{compute_layout, CanvasSize, Layout, LayoutConfig, Point};
pub use pipeline::{load_tree, load_tree_with_config, DelegationTreeView};
pub use resolve::{resolve_graph, DelegationGraph};
pub use store::{ConversationStore, MemoryStore, StoreError, StoreResult};
pub use tree::{build_tree, NodeId, NodeRole, TreeNode};
