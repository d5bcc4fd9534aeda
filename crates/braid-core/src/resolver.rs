//! Round planning for the two network-resolution loops.
//!
//! Each resolver owns a per-session ledger guaranteeing at most one
//! attempted request per id per resolution dimension, plus a monotonic,
//! capped round counter. Ids are ledgered here, before any fetch is issued,
//! so a concurrent round can never re-request them before the first
//! response lands. The session drives the actual fetch/insert/rebuild
//! cycle around these plans.

use std::collections::HashSet;

use nostr::{EventId, PublicKey, RelayUrl};
use tracing::debug;

use crate::store::EventStore;

/// One round of ancestor resolution: the missing ids to request and the
/// relay hints carried by the records referencing them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestorRound {
    pub ids: Vec<EventId>,
    pub relay_hints: Vec<RelayUrl>,
}

/// Ledger and round counter for ancestor (parent/root) discovery.
#[derive(Debug)]
pub struct AncestorResolver {
    attempted: HashSet<EventId>,
    relay_list_queried: HashSet<PublicKey>,
    discovered_relays: Vec<RelayUrl>,
    rounds: u32,
    max_rounds: u32,
}

impl AncestorResolver {
    pub fn new(max_rounds: u32) -> Self {
        Self {
            attempted: HashSet::new(),
            relay_list_queried: HashSet::new(),
            discovered_relays: Vec::new(),
            rounds: 0,
            max_rounds,
        }
    }

    /// Plan the next round: every distinct parent/root id that is non-null,
    /// absent from the store and not yet attempted. Returns `None` when the
    /// chain is complete or the round cap is reached; the cap is permanent
    /// for the session.
    pub fn next_round(&mut self, store: &EventStore) -> Option<AncestorRound> {
        if self.rounds >= self.max_rounds {
            debug!(
                max_rounds = self.max_rounds,
                "ancestor round cap reached, stopping chain traversal"
            );
            return None;
        }

        let mut ids: Vec<EventId> = Vec::new();
        let mut relay_hints: Vec<RelayUrl> = Vec::new();
        for record in store.iter() {
            let wanted = [
                (record.refs.parent_id, &record.refs.parent_relay_hint),
                (record.refs.root_id, &record.refs.root_relay_hint),
            ];
            for (id, hint) in wanted {
                let Some(id) = id else { continue };
                if store.contains(&id) || !self.attempted.insert(id) {
                    continue;
                }
                ids.push(id);
                if let Some(hint) = hint {
                    if !relay_hints.contains(hint) {
                        relay_hints.push(hint.clone());
                    }
                }
            }
        }

        if ids.is_empty() {
            debug!(
                events = store.len(),
                attempted = self.attempted.len(),
                "no missing ancestors to fetch"
            );
            return None;
        }

        // Deterministic request payloads regardless of store iteration order
        ids.sort_unstable();
        relay_hints.sort_unstable_by(|a, b| a.as_str().cmp(b.as_str()));

        self.rounds += 1;
        debug!(
            missing = ids.len(),
            round = self.rounds,
            hints = relay_hints.len(),
            "planned ancestor fetch round"
        );
        Some(AncestorRound { ids, relay_hints })
    }

    /// Authors to query for NIP-65 relay lists: the mentioned pubkeys of
    /// every record that still references a missing parent or root, minus
    /// those already queried this session. Targets are ledgered before the
    /// request goes out.
    pub fn relay_discovery_targets(&mut self, store: &EventStore) -> Vec<PublicKey> {
        let mut targets: Vec<PublicKey> = Vec::new();
        for record in store.iter() {
            let missing_parent = record
                .refs
                .parent_id
                .is_some_and(|id| !store.contains(&id));
            let missing_root = record
                .refs
                .root_id
                .is_some_and(|id| record.refs.parent_id != Some(id) && !store.contains(&id));
            if !missing_parent && !missing_root {
                continue;
            }
            for pk in &record.mentioned_pubkeys {
                if self.relay_list_queried.insert(*pk) {
                    targets.push(*pk);
                }
            }
        }
        targets.sort_unstable();
        targets
    }

    /// Remember write relays learned from NIP-65 lists; they join every
    /// subsequent ancestor fetch.
    pub fn add_discovered_relays(&mut self, relays: impl IntoIterator<Item = RelayUrl>) {
        for relay in relays {
            if !self.discovered_relays.contains(&relay) {
                self.discovered_relays.push(relay);
            }
        }
    }

    pub fn discovered_relays(&self) -> &[RelayUrl] {
        &self.discovered_relays
    }

    /// Ids that were ledgered but are still absent from the store, i.e. the
    /// retry set after relay discovery.
    pub fn unresolved(&self, store: &EventStore) -> Vec<EventId> {
        let mut ids: Vec<EventId> = self
            .attempted
            .iter()
            .copied()
            .filter(|id| !store.contains(id))
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn reset(&mut self) {
        self.attempted.clear();
        self.relay_list_queried.clear();
        self.discovered_relays.clear();
        self.rounds = 0;
    }
}

/// Ledger and round counter for breadth-first child (reply) discovery.
///
/// The cap is much smaller than the ancestor cap: completeness is traded
/// for bounded request volume, and live updates surface later replies.
#[derive(Debug)]
pub struct ChildResolver {
    attempted: HashSet<EventId>,
    rounds: u32,
    max_rounds: u32,
}

impl ChildResolver {
    pub fn new(max_rounds: u32) -> Self {
        Self {
            attempted: HashSet::new(),
            rounds: 0,
            max_rounds,
        }
    }

    /// Plan the next round: every known id we have not yet asked replies
    /// for. `None` when all known ids are covered or the cap is reached.
    pub fn next_round(&mut self, store: &EventStore) -> Option<Vec<EventId>> {
        if self.rounds >= self.max_rounds {
            debug!(
                max_rounds = self.max_rounds,
                "child discovery iteration cap reached, stopping"
            );
            return None;
        }

        let mut ids: Vec<EventId> = store
            .iter()
            .map(|record| record.id)
            .filter(|id| self.attempted.insert(*id))
            .collect();
        if ids.is_empty() {
            debug!("no more events to query for children, discovery complete");
            return None;
        }
        ids.sort_unstable();

        self.rounds += 1;
        debug!(
            events = ids.len(),
            round = self.rounds,
            "planned child discovery round"
        );
        Some(ids)
    }

    /// Pre-ledger an id whose replies are already covered by another query
    /// (the initial load fetches replies to root and focus directly).
    pub fn mark_attempted(&mut self, id: EventId) {
        self.attempted.insert(id);
    }

    pub fn reset(&mut self) {
        self.attempted.clear();
        self.rounds = 0;
    }
}
