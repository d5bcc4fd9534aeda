//! Thread graph construction.
//!
//! Pure snapshot transform: [`EventStore`] contents in, [`ThreadGraph`] out.
//! Deterministic and idempotent, so the session re-runs it on every
//! mutation (fetch response, live update, collapse toggle).

use std::collections::{HashMap, HashSet, VecDeque};

use nostr::EventId;
use serde::Serialize;
use tracing::debug;

use crate::constants::MAX_THREAD_DEPTH;
use crate::store::EventStore;

/// Per-session wrapper around one event, holding its tree relationships.
///
/// Identity is the event id, which persists across rebuilds; collapse state
/// lives in the session's per-id set and is re-applied on every build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadNode {
    pub id: EventId,
    pub created_at: u64,
    /// Resolved direct parent; `None` for roots and unresolved references.
    pub parent_id: Option<EventId>,
    /// Children ordered by `created_at` ascending (id tiebreak).
    pub child_ids: Vec<EventId>,
    /// Distance from root, clamped to [`MAX_THREAD_DEPTH`] for rendering.
    pub depth: u32,
    /// On the path from the focus event up to the root.
    pub is_on_focus_path: bool,
    pub is_collapsed: bool,
    /// Total descendants, memoized in one post-order pass per root.
    pub descendant_count: usize,
}

/// Complete reply tree for one session snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ThreadGraph {
    pub nodes: HashMap<EventId, ThreadNode>,
    /// Elected root: pinned > focus's declared root > earliest orphan.
    pub root_id: Option<EventId>,
    pub focus_id: Option<EventId>,
    /// Forest pre-order; collapsed off-focus-path subtrees are excluded
    /// while their nodes stay in `nodes`, so re-expanding needs no re-fetch.
    pub render_order: Vec<EventId>,
    /// Count of nodes whose parent/root reference is absent from the store.
    /// Non-zero after cap exhaustion means the thread renders incomplete.
    pub missing_ancestors: usize,
}

impl ThreadGraph {
    pub fn build(
        store: &EventStore,
        focus_id: Option<EventId>,
        pinned_root: Option<EventId>,
        collapsed: &HashSet<EventId>,
    ) -> Self {
        let mut nodes: HashMap<EventId, ThreadNode> = HashMap::with_capacity(store.len());
        let mut missing_ancestors = 0usize;

        for record in store.iter() {
            // Linkage requires a resolved, distinct parent; a tag referencing
            // the event itself is dropped here.
            let parent_id = record.refs.parent_id.filter(|pid| *pid != record.id);

            let parent_missing = parent_id.is_some_and(|pid| !store.contains(&pid));
            let root_missing = record
                .refs
                .root_id
                .is_some_and(|rid| rid != record.id && !store.contains(&rid));
            if parent_missing || root_missing {
                missing_ancestors += 1;
            }

            let node = ThreadNode {
                id: record.id,
                created_at: record.created_at,
                parent_id,
                child_ids: Vec::new(),
                depth: 0,
                is_on_focus_path: false,
                is_collapsed: collapsed.contains(&record.id),
                descendant_count: 0,
            };
            debug_assert!(node.parent_id != Some(node.id));
            nodes.insert(record.id, node);
        }

        // Link each node as a child of its resolved parent
        let links: Vec<(EventId, EventId)> = nodes
            .values()
            .filter_map(|node| {
                let pid = node.parent_id?;
                nodes.contains_key(&pid).then_some((pid, node.id))
            })
            .collect();
        for (pid, cid) in links {
            if let Some(parent) = nodes.get_mut(&pid) {
                parent.child_ids.push(cid);
            }
        }

        let created: HashMap<EventId, u64> =
            nodes.values().map(|n| (n.id, n.created_at)).collect();
        let time_key = |id: &EventId| (created.get(id).copied().unwrap_or(u64::MAX), *id);

        for node in nodes.values_mut() {
            node.child_ids.sort_by_key(time_key);
        }

        // Root candidates: no parent reference, or parent not in our set
        let mut root_candidates: Vec<EventId> = nodes
            .values()
            .filter(|n| n.parent_id.is_none_or(|pid| !nodes.contains_key(&pid)))
            .map(|n| n.id)
            .collect();

        let declared_root = focus_id
            .and_then(|f| store.get(&f))
            .and_then(|r| r.refs.root_id);
        let earliest = root_candidates.iter().copied().min_by_key(time_key);
        let root_id = pinned_root.or(declared_root).or(earliest);

        // Elected root renders first, then the focus event, then orphan
        // roots oldest-first
        root_candidates.sort_by_key(|id| {
            let class: u8 = if Some(*id) == root_id {
                0
            } else if Some(*id) == focus_id {
                1
            } else {
                2
            };
            (class, time_key(id))
        });

        // BFS depth assignment from each root
        for rid in &root_candidates {
            let mut queue: VecDeque<(EventId, u32)> = VecDeque::from([(*rid, 0)]);
            while let Some((id, depth)) = queue.pop_front() {
                let Some(node) = nodes.get_mut(&id) else {
                    continue;
                };
                node.depth = depth.min(MAX_THREAD_DEPTH);
                for child in node.child_ids.clone() {
                    queue.push_back((child, depth + 1));
                }
            }
        }

        // Mark the focus -> root path
        if let Some(focus) = focus_id {
            let mut visited: HashSet<EventId> = HashSet::new();
            let mut current = Some(focus);
            while let Some(id) = current {
                if !visited.insert(id) {
                    break;
                }
                let Some(node) = nodes.get_mut(&id) else {
                    break;
                };
                node.is_on_focus_path = true;
                current = node.parent_id;
            }
        }

        fn count_descendants(nodes: &mut HashMap<EventId, ThreadNode>, id: EventId) -> usize {
            let children = match nodes.get(&id) {
                Some(node) => node.child_ids.clone(),
                None => return 0,
            };
            let mut count = children.len();
            for child in &children {
                count += count_descendants(nodes, *child);
            }
            if let Some(node) = nodes.get_mut(&id) {
                node.descendant_count = count;
            }
            count
        }
        for rid in &root_candidates {
            count_descendants(&mut nodes, *rid);
        }

        // DFS pre-order; a collapsed node off the focus path contributes
        // itself but not its subtree
        fn add_subtree(nodes: &HashMap<EventId, ThreadNode>, id: EventId, out: &mut Vec<EventId>) {
            let Some(node) = nodes.get(&id) else {
                return;
            };
            out.push(id);
            if node.is_collapsed && !node.is_on_focus_path {
                return;
            }
            for child in &node.child_ids {
                add_subtree(nodes, *child, out);
            }
        }
        let mut render_order = Vec::with_capacity(nodes.len());
        for rid in &root_candidates {
            add_subtree(&nodes, *rid, &mut render_order);
        }

        debug!(
            nodes = nodes.len(),
            roots = root_candidates.len(),
            rendered = render_order.len(),
            missing_ancestors,
            "built thread graph"
        );

        Self {
            nodes,
            root_id,
            focus_id,
            render_order,
            missing_ancestors,
        }
    }

    pub fn node(&self, id: &EventId) -> Option<&ThreadNode> {
        self.nodes.get(id)
    }
}
