//! Edge enumeration over the built tree.
//!
//! One walk emits an edge per (parent, child) pair it observes; edges are
//! then grouped by that key and merged so the output carries at most one
//! edge per ordered pair. Boolean fields OR together, label fields keep
//! the first non-empty value.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::tree::{NodeId, NodeRole, TreeNode};

/// One rendered link between two tree nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub parent: NodeId,
    pub child: NodeId,
    /// The delegation produced a final answer (or this is the root's own
    /// author -> recipient link, which is always drawn complete).
    pub complete: bool,
    /// `to <slug>` when the child lives in a different project.
    pub cross_project: Option<String>,
    /// Status label of the child conversation.
    pub status: Option<String>,
    /// Whether the child conversation is currently active.
    pub active: bool,
}

/// Walk the tree and emit the merged edge list.
pub fn collect_edges(root: &TreeNode) -> Vec<Edge> {
    let mut raw = Vec::new();
    walk(root, &mut raw);
    merge_edges(raw)
}

fn walk(node: &TreeNode, out: &mut Vec<Edge>) {
    for child in &node.children {
        out.push(edge_between(node, child));
        walk(child, out);
    }
}

fn edge_between(parent: &TreeNode, child: &TreeNode) -> Edge {
    let is_root_link = parent.role == NodeRole::RootAuthor;
    let cross_project = if is_root_link {
        None
    } else {
        let parent_slug = parent.conversation.project_slug();
        match child.conversation.project_slug() {
            Some(child_slug) if parent_slug != Some(child_slug) => {
                Some(format!("to {child_slug}"))
            }
            _ => None,
        }
    };
    Edge {
        parent: parent.id.clone(),
        child: child.id.clone(),
        complete: is_root_link || child.return_message.is_some(),
        cross_project,
        status: child.conversation.status_label.clone(),
        active: child.conversation.is_active,
    }
}

/// Merge duplicate (parent, child) edges, preserving first-seen order.
pub fn merge_edges(edges: Vec<Edge>) -> Vec<Edge> {
    let mut order: Vec<(NodeId, NodeId)> = Vec::new();
    let mut merged: HashMap<(NodeId, NodeId), Edge> = HashMap::new();

    for edge in edges {
        let key = (edge.parent.clone(), edge.child.clone());
        match merged.entry(key) {
            Entry::Vacant(slot) => {
                order.push((edge.parent.clone(), edge.child.clone()));
                slot.insert(edge);
            }
            Entry::Occupied(mut slot) => {
                let kept = slot.get_mut();
                kept.complete |= edge.complete;
                kept.active |= edge.active;
                if kept.cross_project.is_none() {
                    kept.cross_project = edge.cross_project;
                }
                if kept.status.is_none() {
                    kept.status = edge.status;
                }
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| merged.remove(&key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use convmap_types::ConversationId;

    fn edge(parent: &str, child: &str, complete: bool, label: Option<&str>) -> Edge {
        Edge {
            parent: NodeId::recipient(ConversationId::new(parent)),
            child: NodeId::recipient(ConversationId::new(child)),
            complete,
            cross_project: label.map(|l| l.to_string()),
            status: None,
            active: false,
        }
    }

    #[test]
    fn merge_ors_completion_and_keeps_first_label() {
        let merged = merge_edges(vec![
            edge("a", "b", false, None),
            edge("a", "b", true, Some("to x")),
        ]);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].complete);
        assert_eq!(merged[0].cross_project.as_deref(), Some("to x"));
    }

    #[test]
    fn merging_identical_copies_is_a_noop() {
        let e = edge("a", "b", true, Some("to x"));
        let merged = merge_edges(vec![e.clone(), e.clone()]);
        assert_eq!(merged, vec![e]);
    }

    #[test]
    fn distinct_pairs_stay_separate_in_first_seen_order() {
        let merged = merge_edges(vec![
            edge("a", "b", false, None),
            edge("a", "c", true, None),
            edge("a", "b", true, None),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].child.conversation.as_str(), "b");
        assert!(merged[0].complete);
        assert_eq!(merged[1].child.conversation.as_str(), "c");
    }

    #[test]
    fn first_non_null_status_wins() {
        let mut first = edge("a", "b", false, None);
        first.status = Some("In Progress".to_string());
        let mut second = edge("a", "b", false, None);
        second.status = Some("Done".to_string());
        let merged = merge_edges(vec![first, second]);
        assert_eq!(merged[0].status.as_deref(), Some("In Progress"));
    }
}
