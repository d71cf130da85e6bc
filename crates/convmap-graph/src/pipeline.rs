//! The `load_tree` entry point: resolve -> build -> edges -> layout.
//!
//! One call produces one immutable view. There is no incremental state
//! and no mid-pipeline cancellation point; a caller that supersedes a
//! load with a newer root simply drops this future, which discards any
//! in-flight batch wholesale. Nothing partial is ever published.

use std::collections::HashMap;

use convmap_types::ConversationId;
use tracing::debug;

use crate::edges::{collect_edges, Edge};
use crate::error::TreeLoadError;
use crate::layout::{compute_layout, CanvasSize, LayoutConfig, Point};
use crate::resolve::resolve_graph;
use crate::store::ConversationStore;
use crate::tree::{build_tree, NodeId, TreeNode};

/// Everything the renderer needs for one root, published atomically.
#[derive(Debug, Clone)]
pub struct DelegationTreeView {
    pub root: TreeNode,
    pub edges: Vec<Edge>,
    pub positions: HashMap<NodeId, Point>,
    pub canvas: CanvasSize,
}

/// Load the delegation tree for `root_id` with default layout metrics.
pub async fn load_tree(
    store: &dyn ConversationStore,
    root_id: &ConversationId,
) -> Result<DelegationTreeView, TreeLoadError> {
    load_tree_with_config(store, root_id, &LayoutConfig::default()).await
}

/// Load the delegation tree for `root_id`.
///
/// Fails only with `RootNotFound`; every other fetch gap degrades to a
/// missing branch. Retries are the caller's concern on the next trigger.
pub async fn load_tree_with_config(
    store: &dyn ConversationStore,
    root_id: &ConversationId,
    config: &LayoutConfig,
) -> Result<DelegationTreeView, TreeLoadError> {
    // Hints are best-effort: an empty or failing hierarchy index just
    // means discovery leans on q-tags and stored links alone.
    let hints = store.descendant_hints(root_id).await.unwrap_or_default();

    let graph = resolve_graph(store, root_id, &hints).await?;
    let root = build_tree(&graph).ok_or_else(|| TreeLoadError::RootNotFound {
        id: root_id.clone(),
    })?;
    let edges = collect_edges(&root);
    let layout = compute_layout(&root, config);

    debug!(
        nodes = root.node_count(),
        edges = edges.len(),
        "delegation tree resolved"
    );
    Ok(DelegationTreeView {
        root,
        edges,
        positions: layout.positions,
        canvas: layout.canvas,
    })
}
