//! Graph discovery and parent resolution.
//!
//! Discovery is a fixed-point expansion from the root plus any hinted
//! descendants. Each round fetches every not-yet-attempted id in one
//! batch, then recomputes the frontier from three candidate sources:
//! 1. stored parent links on fetched conversations,
//! 2. q-tags of messages whose tool name passes the delegation heuristic,
//! 3. delegation tags asserting a parent on fetched messages.
//!
//! The attempted set grows monotonically and is bounded by the set of
//! ids ever referenced, so the loop terminates.
//!
//! Parent resolution turns the raw edge sources into a single parent per
//! child via an explicit ranked candidate list: a stored link ranks
//! lowest, a q-tag edge from a delegation message on the parent ranks
//! above it, and a delegation tag on the child's own messages overrides
//! both. Priority ties go to the lexicographically smaller parent id, so
//! the outcome never depends on map iteration order.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

use convmap_types::{Conversation, ConversationId, Message};
use futures::future::join_all;
use tracing::{debug, warn};

use crate::error::TreeLoadError;
use crate::store::ConversationStore;

/// Fully resolved delegation graph for one root.
#[derive(Debug, Clone)]
pub struct DelegationGraph {
    pub root: ConversationId,
    /// Every conversation the discovery loop could fetch.
    pub conversations: HashMap<ConversationId, Conversation>,
    /// Messages per fetched conversation (may be empty).
    pub messages: HashMap<ConversationId, Vec<Message>>,
    /// Resolved parent -> children adjacency, children ordered by
    /// ascending last activity, then id.
    pub children: HashMap<ConversationId, Vec<ConversationId>>,
}

impl DelegationGraph {
    pub fn children_of(&self, id: &ConversationId) -> &[ConversationId] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All descendant ids of `id` in the resolved adjacency, preorder.
    /// Cycle-guarded: each vertex appears at most once.
    pub fn descendants(&self, id: &ConversationId) -> Vec<ConversationId> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(id.clone());
        self.collect_descendants(id, &mut out, &mut visited);
        out
    }

    fn collect_descendants(
        &self,
        id: &ConversationId,
        out: &mut Vec<ConversationId>,
        visited: &mut HashSet<ConversationId>,
    ) {
        for child in self.children_of(id) {
            if visited.insert(child.clone()) {
                out.push(child.clone());
                self.collect_descendants(child, out, visited);
            }
        }
    }

    /// Max of a vertex's own last activity and all its descendants'.
    /// Used for hierarchical sorting in conversation lists.
    pub fn effective_last_activity(&self, id: &ConversationId) -> u64 {
        let mut visited = HashSet::new();
        self.effective_last_activity_inner(id, &mut visited)
    }

    fn effective_last_activity_inner(
        &self,
        id: &ConversationId,
        visited: &mut HashSet<ConversationId>,
    ) -> u64 {
        if !visited.insert(id.clone()) {
            return 0;
        }
        let mut max = self
            .conversations
            .get(id)
            .map(|c| c.last_activity)
            .unwrap_or(0);
        for child in self.children_of(id) {
            max = max.max(self.effective_last_activity_inner(child, visited));
        }
        max
    }
}

/// Discover and resolve the delegation graph rooted at `root`.
///
/// `hints` is a best-effort set of known descendant ids; it seeds the
/// first fetch batch alongside the root. Fails only when the root itself
/// cannot be fetched.
pub async fn resolve_graph(
    store: &dyn ConversationStore,
    root: &ConversationId,
    hints: &[ConversationId],
) -> Result<DelegationGraph, TreeLoadError> {
    let (conversations, messages) = discover(store, root, hints).await?;
    let children = resolve_children(&conversations, &messages);
    Ok(DelegationGraph {
        root: root.clone(),
        conversations,
        messages,
        children,
    })
}

type KnownSet = (
    HashMap<ConversationId, Conversation>,
    HashMap<ConversationId, Vec<Message>>,
);

/// Fixed-point fetch loop. Batches are strictly sequential; fetches
/// within a batch run concurrently and are joined before any merge.
async fn discover(
    store: &dyn ConversationStore,
    root: &ConversationId,
    hints: &[ConversationId],
) -> Result<KnownSet, TreeLoadError> {
    let mut conversations: HashMap<ConversationId, Conversation> = HashMap::new();
    let mut messages: HashMap<ConversationId, Vec<Message>> = HashMap::new();
    let mut attempted: HashSet<ConversationId> = HashSet::new();

    let mut frontier: Vec<ConversationId> = std::iter::once(root.clone())
        .chain(hints.iter().cloned())
        .filter(|id| !id.is_empty())
        .collect();
    let mut first_batch = true;

    while !frontier.is_empty() {
        let batch: Vec<ConversationId> = frontier
            .drain(..)
            .filter(|id| attempted.insert(id.clone()))
            .collect();
        if batch.is_empty() {
            break;
        }
        debug!(batch = batch.len(), known = conversations.len(), "discovery batch");

        let fetched = match store.conversations_by_ids(&batch).await {
            Ok(found) => found,
            Err(err) if first_batch => {
                warn!(%root, %err, "root fetch failed");
                return Err(TreeLoadError::RootNotFound { id: root.clone() });
            }
            Err(err) => {
                warn!(%err, lost = batch.len(), "batch fetch failed, dropping its vertices");
                Vec::new()
            }
        };

        let new_ids: Vec<ConversationId> = fetched.iter().map(|c| c.id.clone()).collect();
        for conversation in fetched {
            conversations.insert(conversation.id.clone(), conversation);
        }

        if first_batch {
            if !conversations.contains_key(root) {
                return Err(TreeLoadError::RootNotFound { id: root.clone() });
            }
            first_batch = false;
        }

        // Message lookups for everything that just arrived, joined as one
        // concurrent round. Each task returns an owned result; nothing is
        // merged until the whole round completes.
        let fetched_messages =
            join_all(new_ids.iter().map(|id| store.messages_for(id))).await;
        for (id, result) in new_ids.iter().zip(fetched_messages) {
            match result {
                Ok(list) => {
                    messages.insert(id.clone(), list);
                }
                Err(err) if id == root => {
                    // A root with unreadable messages still anchors the
                    // tree; only a missing root conversation is fatal.
                    warn!(%id, %err, "root messages unavailable");
                    messages.insert(id.clone(), Vec::new());
                }
                Err(err) => {
                    warn!(%id, %err, "dropping vertex after failed message fetch");
                    conversations.remove(id);
                }
            }
        }

        frontier = candidate_ids(&conversations, &messages)
            .into_iter()
            .filter(|id| !attempted.contains(id))
            .collect();
    }

    Ok((conversations, messages))
}

/// Recompute the candidate vertex set from both expansion sources.
/// BTreeSet keeps the frontier order deterministic.
fn candidate_ids(
    conversations: &HashMap<ConversationId, Conversation>,
    messages: &HashMap<ConversationId, Vec<Message>>,
) -> BTreeSet<ConversationId> {
    let mut candidates = BTreeSet::new();
    for conversation in conversations.values() {
        if let Some(parent) = &conversation.parent_id {
            if !parent.is_empty() {
                candidates.insert(parent.clone());
            }
        }
    }
    for list in messages.values() {
        for message in list {
            if message.is_delegation() {
                for q_tag in &message.q_tags {
                    if !q_tag.is_empty() {
                        candidates.insert(q_tag.clone());
                    }
                }
            }
            if let Some(tag) = &message.delegation_tag {
                if !tag.is_empty() {
                    candidates.insert(tag.clone());
                }
            }
        }
    }
    candidates
}

/// Candidate parent sources, ascending priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ParentSource {
    /// The conversation's own stored parent link.
    StoredLink,
    /// A delegation message on the parent q-tagged this child.
    QTagEdge,
    /// A delegation tag on the child's own messages named the parent.
    DelegationTag,
}

/// Pure comparator for ranked candidates: higher priority wins, then the
/// lexicographically smaller parent id.
fn prefer_candidate(
    a: &(ConversationId, ParentSource),
    b: &(ConversationId, ParentSource),
) -> Ordering {
    a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0))
}

/// Resolve one parent per child and produce the ordered adjacency map.
fn resolve_children(
    conversations: &HashMap<ConversationId, Conversation>,
    messages: &HashMap<ConversationId, Vec<Message>>,
) -> HashMap<ConversationId, Vec<ConversationId>> {
    let mut candidates: HashMap<ConversationId, Vec<(ConversationId, ParentSource)>> =
        HashMap::new();

    for conversation in conversations.values() {
        if let Some(parent) = &conversation.parent_id {
            candidates
                .entry(conversation.id.clone())
                .or_default()
                .push((parent.clone(), ParentSource::StoredLink));
        }
    }
    for (conversation_id, list) in messages {
        for message in list {
            if message.is_delegation() {
                for q_tag in &message.q_tags {
                    if !q_tag.is_empty() {
                        candidates
                            .entry(q_tag.clone())
                            .or_default()
                            .push((conversation_id.clone(), ParentSource::QTagEdge));
                    }
                }
            }
            if let Some(tag) = &message.delegation_tag {
                candidates
                    .entry(conversation_id.clone())
                    .or_default()
                    .push((tag.clone(), ParentSource::DelegationTag));
            }
        }
    }

    let mut children: HashMap<ConversationId, Vec<ConversationId>> = HashMap::new();
    for (child, ranked) in candidates {
        if !conversations.contains_key(&child) {
            continue;
        }
        let winner = ranked
            .into_iter()
            .filter(|(parent, _)| *parent != child && conversations.contains_key(parent))
            .max_by(prefer_candidate);
        if let Some((parent, _)) = winner {
            children.entry(parent).or_default().push(child);
        }
    }

    for list in children.values_mut() {
        list.sort_by(|a, b| {
            let activity_a = conversations.get(a).map(|c| c.last_activity).unwrap_or(0);
            let activity_b = conversations.get(b).map(|c| c.last_activity).unwrap_or(0);
            activity_a.cmp(&activity_b).then_with(|| a.cmp(b))
        });
    }
    children
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError, StoreResult};
    use async_trait::async_trait;

    fn conv(id: &str, parent: Option<&str>, last_activity: u64) -> Conversation {
        Conversation {
            id: ConversationId::new(id),
            parent_id: parent.map(ConversationId::new),
            author: format!("pk-{id}"),
            recipients: vec![format!("agent-{id}")],
            project: None,
            last_activity,
            message_count: 0,
            status_label: None,
            summary: None,
            is_active: false,
        }
    }

    fn delegation_msg(pubkey: &str, q_tags: &[&str]) -> Message {
        Message {
            author: pubkey.to_string(),
            pubkey: pubkey.to_string(),
            tool_name: Some("delegate".to_string()),
            q_tags: q_tags.iter().map(|q| ConversationId::new(*q)).collect(),
            delegation_tag: None,
            is_reasoning: false,
            content: String::new(),
        }
    }

    fn tagged_msg(pubkey: &str, delegation_tag: &str) -> Message {
        Message {
            author: pubkey.to_string(),
            pubkey: pubkey.to_string(),
            tool_name: None,
            q_tags: vec![],
            delegation_tag: Some(ConversationId::new(delegation_tag)),
            is_reasoning: false,
            content: String::new(),
        }
    }

    fn known(convs: &[Conversation]) -> HashMap<ConversationId, Conversation> {
        convs.iter().map(|c| (c.id.clone(), c.clone())).collect()
    }

    #[test]
    fn delegation_tag_overrides_stored_link_and_qtag() {
        let conversations = known(&[
            conv("child", Some("stored"), 0),
            conv("stored", None, 0),
            conv("qtag", None, 0),
            conv("tagged", None, 0),
        ]);
        let mut messages: HashMap<ConversationId, Vec<Message>> = HashMap::new();
        messages.insert(
            ConversationId::new("qtag"),
            vec![delegation_msg("pk-qtag", &["child"])],
        );
        messages.insert(
            ConversationId::new("child"),
            vec![tagged_msg("pk-child", "tagged")],
        );

        let children = resolve_children(&conversations, &messages);
        assert_eq!(
            children.get(&ConversationId::new("tagged")),
            Some(&vec![ConversationId::new("child")])
        );
        assert!(!children.contains_key(&ConversationId::new("stored")));
        assert!(!children.contains_key(&ConversationId::new("qtag")));
    }

    #[test]
    fn qtag_edge_beats_stored_link() {
        let conversations = known(&[
            conv("child", Some("stored"), 0),
            conv("stored", None, 0),
            conv("qtag", None, 0),
        ]);
        let mut messages: HashMap<ConversationId, Vec<Message>> = HashMap::new();
        messages.insert(
            ConversationId::new("qtag"),
            vec![delegation_msg("pk-qtag", &["child"])],
        );

        let children = resolve_children(&conversations, &messages);
        assert_eq!(
            children.get(&ConversationId::new("qtag")),
            Some(&vec![ConversationId::new("child")])
        );
    }

    #[test]
    fn priority_tie_goes_to_smaller_parent_id() {
        let conversations = known(&[
            conv("child", None, 0),
            conv("pb", None, 0),
            conv("pa", None, 0),
        ]);
        let mut messages: HashMap<ConversationId, Vec<Message>> = HashMap::new();
        // Two q-tag edges at the same priority, inserted in either order.
        messages.insert(
            ConversationId::new("pb"),
            vec![delegation_msg("pk-pb", &["child"])],
        );
        messages.insert(
            ConversationId::new("pa"),
            vec![delegation_msg("pk-pa", &["child"])],
        );

        let children = resolve_children(&conversations, &messages);
        assert_eq!(
            children.get(&ConversationId::new("pa")),
            Some(&vec![ConversationId::new("child")])
        );
        assert!(!children.contains_key(&ConversationId::new("pb")));
    }

    #[test]
    fn self_parent_and_unknown_endpoints_are_discarded() {
        let conversations = known(&[conv("child", Some("child"), 0)]);
        let mut messages: HashMap<ConversationId, Vec<Message>> = HashMap::new();
        messages.insert(
            ConversationId::new("child"),
            vec![tagged_msg("pk-child", "missing-parent")],
        );

        let children = resolve_children(&conversations, &messages);
        assert!(children.is_empty());
    }

    #[test]
    fn children_sorted_by_activity_then_id() {
        let conversations = known(&[
            conv("root", None, 0),
            conv("late", Some("root"), 30),
            conv("early", Some("root"), 10),
            conv("b-same", Some("root"), 20),
            conv("a-same", Some("root"), 20),
        ]);
        let children = resolve_children(&conversations, &HashMap::new());
        assert_eq!(
            children.get(&ConversationId::new("root")),
            Some(&vec![
                ConversationId::new("early"),
                ConversationId::new("a-same"),
                ConversationId::new("b-same"),
                ConversationId::new("late"),
            ])
        );
    }

    #[tokio::test]
    async fn discovery_follows_delegation_qtags() {
        let root = ConversationId::new("root");
        let store = MemoryStore::new()
            .with_conversation(conv("root", None, 1))
            .with_conversation(conv("c1", None, 2))
            .with_messages(
                "root",
                vec![delegation_msg("pk-root", &["c1"])],
            );

        let graph = resolve_graph(&store, &root, &[]).await.unwrap();
        assert!(graph.conversations.contains_key(&ConversationId::new("c1")));
        assert_eq!(
            graph.children_of(&root),
            &[ConversationId::new("c1")]
        );
    }

    #[tokio::test]
    async fn discovery_uses_hints_and_stored_links() {
        // grandchild is hinted; its stored link pulls in the middle
        // vertex that no hint or q-tag mentioned.
        let root = ConversationId::new("root");
        let store = MemoryStore::new()
            .with_conversation(conv("root", None, 1))
            .with_conversation(conv("mid", Some("root"), 2))
            .with_conversation(conv("leaf", Some("mid"), 3))
            .with_hints("root", vec![ConversationId::new("leaf")]);

        let graph = resolve_graph(&store, &root, &[ConversationId::new("leaf")])
            .await
            .unwrap();
        assert!(graph.conversations.contains_key(&ConversationId::new("mid")));
        assert_eq!(graph.children_of(&root), &[ConversationId::new("mid")]);
        assert_eq!(
            graph.children_of(&ConversationId::new("mid")),
            &[ConversationId::new("leaf")]
        );
    }

    #[tokio::test]
    async fn missing_root_is_fatal() {
        let store = MemoryStore::new();
        let err = resolve_graph(&store, &ConversationId::new("nope"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, TreeLoadError::RootNotFound { .. }));
        assert_eq!(err.code(), "ROOT_NOT_FOUND");
    }

    /// Store whose message lookups fail for one conversation.
    struct FlakyMessages {
        inner: MemoryStore,
        failing: ConversationId,
    }

    #[async_trait]
    impl ConversationStore for FlakyMessages {
        async fn conversations_by_ids(
            &self,
            ids: &[ConversationId],
        ) -> StoreResult<Vec<Conversation>> {
            self.inner.conversations_by_ids(ids).await
        }

        async fn descendant_hints(
            &self,
            root: &ConversationId,
        ) -> StoreResult<Vec<ConversationId>> {
            self.inner.descendant_hints(root).await
        }

        async fn messages_for(&self, id: &ConversationId) -> StoreResult<Vec<Message>> {
            if *id == self.failing {
                return Err(StoreError::Lookup {
                    id: id.clone(),
                    reason: "simulated outage".to_string(),
                });
            }
            self.inner.messages_for(id).await
        }
    }

    #[tokio::test]
    async fn failed_non_root_message_fetch_drops_the_vertex() {
        let root = ConversationId::new("root");
        let store = FlakyMessages {
            inner: MemoryStore::new()
                .with_conversation(conv("root", None, 1))
                .with_conversation(conv("c1", Some("root"), 2))
                .with_messages("root", vec![delegation_msg("pk-root", &["c1"])]),
            failing: ConversationId::new("c1"),
        };

        let graph = resolve_graph(&store, &root, &[]).await.unwrap();
        assert!(!graph.conversations.contains_key(&ConversationId::new("c1")));
        assert!(graph.children_of(&root).is_empty());
    }

    #[tokio::test]
    async fn failed_root_message_fetch_is_tolerated() {
        let root = ConversationId::new("root");
        let store = FlakyMessages {
            inner: MemoryStore::new().with_conversation(conv("root", None, 1)),
            failing: root.clone(),
        };

        let graph = resolve_graph(&store, &root, &[]).await.unwrap();
        assert!(graph.conversations.contains_key(&root));
        assert!(graph.messages.get(&root).is_some_and(|m| m.is_empty()));
    }

    #[test]
    fn effective_last_activity_rolls_up_descendants() {
        let conversations = known(&[
            conv("root", None, 10),
            conv("mid", Some("root"), 20),
            conv("leaf", Some("mid"), 90),
        ]);
        let children = resolve_children(&conversations, &HashMap::new());
        let graph = DelegationGraph {
            root: ConversationId::new("root"),
            conversations,
            messages: HashMap::new(),
            children,
        };
        assert_eq!(graph.effective_last_activity(&ConversationId::new("root")), 90);
        assert_eq!(graph.effective_last_activity(&ConversationId::new("mid")), 90);
        assert_eq!(graph.effective_last_activity(&ConversationId::new("leaf")), 90);
        assert_eq!(
            graph.descendants(&ConversationId::new("root")),
            vec![ConversationId::new("mid"), ConversationId::new("leaf")]
        );
    }

    #[test]
    fn effective_last_activity_survives_cycles() {
        let conversations = known(&[conv("a", None, 5), conv("b", None, 7)]);
        let mut children = HashMap::new();
        children.insert(
            ConversationId::new("a"),
            vec![ConversationId::new("b")],
        );
        children.insert(
            ConversationId::new("b"),
            vec![ConversationId::new("a")],
        );
        let graph = DelegationGraph {
            root: ConversationId::new("a"),
            conversations,
            messages: HashMap::new(),
            children,
        };
        assert_eq!(graph.effective_last_activity(&ConversationId::new("a")), 7);
    }
}
