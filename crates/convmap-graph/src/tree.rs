//! Typed tree construction over the resolved adjacency.
//!
//! The tree always starts with a RootAuthor node whose single child is
//! the Recipient node for the same conversation: "who sent" above "who
//! received". Every further level is a Recipient node per delegated
//! conversation. Recursion carries a mutable visited set keyed by
//! conversation id; a revisit returns a terminal childless node, which is
//! the sole cycle-safety mechanism and bounds the tree by the number of
//! distinct ids in the adjacency map.

use std::collections::HashSet;
use std::fmt;

use convmap_types::{Conversation, ConversationId, Message};
use serde::{Deserialize, Serialize};

use crate::resolve::DelegationGraph;

/// Which side of a delegation a node shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeRole {
    RootAuthor,
    Recipient,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::RootAuthor => "author",
            NodeRole::Recipient => "recipient",
        }
    }
}

/// Stable node identifier: conversation id plus role, so the same
/// conversation can appear once as author and once as recipient.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    pub conversation: ConversationId,
    pub role: NodeRole,
}

impl NodeId {
    pub fn author(conversation: ConversationId) -> Self {
        Self {
            conversation,
            role: NodeRole::RootAuthor,
        }
    }

    pub fn recipient(conversation: ConversationId) -> Self {
        Self {
            conversation,
            role: NodeRole::Recipient,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role.as_str(), self.conversation)
    }
}

/// One node of the delegation tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub id: NodeId,
    pub conversation: Conversation,
    /// Participant identity displayed on the node.
    pub identity: String,
    pub role: NodeRole,
    /// Last message authored by the conversation's own author that is not
    /// a tool call, meaning the delegation produced a final answer.
    pub return_message: Option<Message>,
    /// Last message that is neither a tool call nor reasoning-only; used
    /// for preview text regardless of authorship.
    pub last_visible_message: Option<Message>,
    pub children: Vec<TreeNode>,
    /// Distance from the root, assigned in a second pass (root = 0).
    pub depth: usize,
}

impl TreeNode {
    /// Preorder traversal of this subtree.
    pub fn dfs(&self) -> Vec<&TreeNode> {
        let mut out = Vec::new();
        self.collect_dfs(&mut out);
        out
    }

    fn collect_dfs<'a>(&'a self, out: &mut Vec<&'a TreeNode>) {
        out.push(self);
        for child in &self.children {
            child.collect_dfs(out);
        }
    }

    /// Total node count of this subtree.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(TreeNode::node_count).sum::<usize>()
    }
}

/// Build the delegation tree for the graph's root. Returns `None` when
/// the root conversation is absent from the graph.
pub fn build_tree(graph: &DelegationGraph) -> Option<TreeNode> {
    let root = graph.conversations.get(&graph.root)?;
    let mut visited = HashSet::new();
    let recipient = build_subtree(graph, root, &mut visited);

    let messages = graph
        .messages
        .get(&root.id)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let mut author = TreeNode {
        id: NodeId::author(root.id.clone()),
        conversation: root.clone(),
        identity: root.author.clone(),
        role: NodeRole::RootAuthor,
        return_message: find_return_message(root, messages).cloned(),
        last_visible_message: find_last_visible(messages).cloned(),
        children: vec![recipient],
        depth: 0,
    };
    assign_depths(&mut author, 0);
    Some(author)
}

fn build_subtree(
    graph: &DelegationGraph,
    conversation: &Conversation,
    visited: &mut HashSet<ConversationId>,
) -> TreeNode {
    let messages = graph
        .messages
        .get(&conversation.id)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let mut node = TreeNode {
        id: NodeId::recipient(conversation.id.clone()),
        conversation: conversation.clone(),
        identity: recipient_identity(conversation),
        role: NodeRole::Recipient,
        return_message: find_return_message(conversation, messages).cloned(),
        last_visible_message: find_last_visible(messages).cloned(),
        children: Vec::new(),
        depth: 0,
    };

    // Revisit: terminal node, no expansion. Guarantees termination on
    // malformed or cyclic adjacency data.
    if !visited.insert(conversation.id.clone()) {
        return node;
    }

    for child_id in graph.children_of(&conversation.id) {
        if let Some(child) = graph.conversations.get(child_id) {
            node.children.push(build_subtree(graph, child, visited));
        }
    }
    node
}

fn assign_depths(node: &mut TreeNode, depth: usize) {
    node.depth = depth;
    for child in &mut node.children {
        assign_depths(child, depth + 1);
    }
}

fn recipient_identity(conversation: &Conversation) -> String {
    conversation
        .recipients
        .first()
        .cloned()
        .unwrap_or_else(|| conversation.author.clone())
}

fn find_return_message<'a>(
    conversation: &Conversation,
    messages: &'a [Message],
) -> Option<&'a Message> {
    messages
        .iter()
        .rev()
        .find(|m| m.pubkey == conversation.author && !m.is_tool_call())
}

fn find_last_visible(messages: &[Message]) -> Option<&Message> {
    messages
        .iter()
        .rev()
        .find(|m| !m.is_tool_call() && !m.is_reasoning)
}
