//! Thread session: owns the per-thread state and drives the load,
//! resolution and live-update cycles against the injected sources.
//!
//! A session is bound to one focus event at a time. `set_focus` cancels any
//! in-flight work and discards all state, so records from two different
//! threads never mix.

use std::collections::HashSet;
use std::sync::Arc;

use futures::{stream, StreamExt};
use nostr::{Alphabet, Event, EventId, Filter, JsonUtil, Kind, RelayUrl, SingleLetterTag};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::constants::{kinds, MAX_THREAD_DEPTH};
use crate::error::FetchError;
use crate::graph::ThreadGraph;
use crate::models::write_relays;
use crate::resolver::{AncestorResolver, ChildResolver};
use crate::source::{EventSource, LocalStore};
use crate::store::EventStore;

pub struct ThreadSession<S, L> {
    source: Arc<S>,
    local: Arc<L>,
    config: SessionConfig,
    store: EventStore,
    ancestors: AncestorResolver,
    children: ChildResolver,
    collapsed: HashSet<EventId>,
    focus_id: Option<EventId>,
    /// Root declared by the focus event's tags, fixed for the session so a
    /// late-arriving earlier orphan cannot steal the root slot.
    pinned_root: Option<EventId>,
    graph: ThreadGraph,
    cancel: CancellationToken,
}

impl<S: EventSource, L: LocalStore> ThreadSession<S, L> {
    pub fn new(source: Arc<S>, local: Arc<L>, config: SessionConfig) -> Self {
        let ancestors = AncestorResolver::new(config.max_ancestor_rounds);
        let children = ChildResolver::new(config.max_child_rounds);
        Self {
            source,
            local,
            config,
            store: EventStore::new(),
            ancestors,
            children,
            collapsed: HashSet::new(),
            focus_id: None,
            pinned_root: None,
            graph: ThreadGraph::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Rebind the session to a new focus event. Cancels in-flight fetches
    /// and drops every record, ledger entry and collapse flag of the
    /// previous thread. A host that already knows the thread root can pin
    /// it here; otherwise it is derived from the focus event's tags.
    pub fn set_focus(&mut self, focus: EventId, pinned_root: Option<EventId>) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.store.clear();
        self.ancestors.reset();
        self.children.reset();
        self.collapsed.clear();
        self.pinned_root = pinned_root;
        self.focus_id = Some(focus);
        self.graph = ThreadGraph::default();
    }

    /// Load the thread around `focus`: local cache first so a partial tree
    /// renders immediately, then ancestor and descendant resolution over
    /// the network.
    pub async fn load(&mut self, focus: EventId) -> Result<(), FetchError> {
        self.set_focus(focus, None);
        info!(focus = %focus, "loading thread");

        let cached = self.local_query(Filter::new().ids([focus]).limit(1)).await?;
        self.store.insert_events(&cached);
        if self.pinned_root.is_none() {
            if let Some(record) = self.store.get(&focus) {
                self.pinned_root = record.refs.root_id;
            }
        }
        self.load_local_ancestors(focus).await?;

        let root = self.pinned_root.unwrap_or(focus);
        let mut targets = vec![root];
        if focus != root {
            targets.push(focus);
        }
        let (replies, comments) = self.reply_filters(&targets);
        let mut cached = self.local_query(replies).await?;
        cached.extend(self.local_query(comments).await?);
        self.store.insert_events(&cached);
        self.rebuild();

        // Network phase. Replies to root and focus are fetched directly, so
        // the breadth-first rounds only need to cover the rest.
        let added = self.fetch_children_of(&targets).await?;
        for id in &targets {
            self.children.mark_attempted(*id);
        }
        if added > 0 {
            self.rebuild();
        }

        self.resolve_ancestors().await?;
        self.resolve_descendants().await?;
        info!(
            events = self.store.len(),
            missing = self.graph.missing_ancestors,
            "thread load complete"
        );
        Ok(())
    }

    /// Walk the parent chain upward through the local cache only. Stops at
    /// the first cache miss; the network resolver takes over from there.
    async fn load_local_ancestors(&mut self, focus: EventId) -> Result<(), FetchError> {
        let mut cursor = self.store.get(&focus).and_then(|r| r.refs.parent_id);
        let mut hops = 0u32;
        while let Some(id) = cursor {
            if hops >= MAX_THREAD_DEPTH {
                break;
            }
            if !self.store.contains(&id) {
                let events = self.local_query(Filter::new().ids([id]).limit(1)).await?;
                if self.store.insert_events(&events) == 0 {
                    break;
                }
            }
            cursor = self.store.get(&id).and_then(|r| r.refs.parent_id);
            hops += 1;
        }
        Ok(())
    }

    /// Fetch missing parents and roots round by round until the chain is
    /// complete, the round cap is hit, or nothing new can be found. When the
    /// configured relays come up empty, falls back to NIP-65 relay
    /// discovery for the missing authors and retries there.
    pub async fn resolve_ancestors(&mut self) -> Result<(), FetchError> {
        while let Some(round) = self.ancestors.next_round(&self.store) {
            let relays = self.merged_relays(&round.relay_hints);
            let filter = Filter::new()
                .ids(round.ids.clone())
                .kinds([Kind::from(kinds::TEXT_NOTE), Kind::from(kinds::COMMENT)])
                .limit(self.config.fetch_limit);
            let events = self.fetch_events(filter, &relays).await?;
            if self.store.insert_events(&events) > 0 {
                self.rebuild();
                continue;
            }

            // Dead end on the current relay set. Learn the missing authors'
            // write relays and retry the still-unresolved ids there once.
            if !self.discover_relays().await? {
                break;
            }
            let pending = self.ancestors.unresolved(&self.store);
            if pending.is_empty() {
                break;
            }
            let relays = self.merged_relays(&[]);
            let filter = Filter::new()
                .ids(pending)
                .kinds([Kind::from(kinds::TEXT_NOTE), Kind::from(kinds::COMMENT)])
                .limit(self.config.fetch_limit);
            let events = self.fetch_events(filter, &relays).await?;
            if self.store.insert_events(&events) == 0 {
                break;
            }
            self.rebuild();
        }
        self.rebuild();
        Ok(())
    }

    /// Breadth-first reply discovery: each round asks for replies to every
    /// id the previous rounds brought in, within the configured round cap.
    pub async fn resolve_descendants(&mut self) -> Result<(), FetchError> {
        while let Some(ids) = self.children.next_round(&self.store) {
            if self.fetch_children_of(&ids).await? > 0 {
                self.rebuild();
            }
        }
        self.rebuild();
        Ok(())
    }

    /// Follow the local store's live feed of events referencing the thread
    /// root. Inserts arrive immediately; the graph rebuild is debounced so
    /// a burst of deliveries yields one rebuild and one ancestor pass.
    /// Returns when the feed ends or the session is cancelled.
    pub async fn run_live_updates(&mut self) -> Result<(), FetchError> {
        let Some(root) = self.graph.root_id.or(self.pinned_root).or(self.focus_id) else {
            return Ok(());
        };
        let replies = self.local.subscribe(
            Filter::new()
                .kinds([Kind::from(kinds::TEXT_NOTE), Kind::from(kinds::COMMENT)])
                .event(root)
                .limit(self.config.fetch_limit),
        );
        let comments = self.local.subscribe(
            Filter::new()
                .kinds([Kind::from(kinds::COMMENT)])
                .custom_tags(SingleLetterTag::uppercase(Alphabet::E), [root.to_hex()])
                .limit(self.config.fetch_limit),
        );
        let mut feed = stream::select(replies, comments);

        let cancel = self.cancel.clone();
        // The window is not restarted by further arrivals, so a steady
        // stream of events still rebuilds at the debounce cadence.
        let mut deadline: Option<Instant> = None;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                batch = feed.next() => match batch {
                    Some(events) => {
                        if self.store.insert_events(&events) > 0 && deadline.is_none() {
                            deadline = Some(Instant::now() + self.config.rebuild_debounce);
                        }
                    }
                    None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    self.rebuild();
                    self.resolve_ancestors().await?;
                }
            }
        }
        if deadline.is_some() {
            self.rebuild();
            self.resolve_ancestors().await?;
        }
        Ok(())
    }

    /// Re-run both resolution loops from scratch. Clears the attempt
    /// ledgers and round counters; fetched records are kept.
    pub async fn retry(&mut self) -> Result<(), FetchError> {
        info!("retrying thread resolution");
        self.ancestors.reset();
        self.children.reset();
        self.resolve_ancestors().await?;
        self.resolve_descendants().await
    }

    /// Toggle the collapse flag on a node and rebuild. Returns the new
    /// state. Collapsed subtrees stay in the store, so expanding is a pure
    /// recomputation.
    pub fn toggle_collapsed(&mut self, id: EventId) -> bool {
        let now_collapsed = if self.collapsed.remove(&id) {
            false
        } else {
            self.collapsed.insert(id);
            true
        };
        self.rebuild();
        now_collapsed
    }

    pub fn expand_all(&mut self) {
        self.collapsed.clear();
        self.rebuild();
    }

    /// Collapse every branch that is not on the focus path.
    pub fn collapse_others(&mut self) {
        let ids: Vec<EventId> = self
            .graph
            .nodes
            .values()
            .filter(|node| !node.is_on_focus_path && !node.child_ids.is_empty())
            .map(|node| node.id)
            .collect();
        self.collapsed.extend(ids);
        self.rebuild();
    }

    pub fn graph(&self) -> &ThreadGraph {
        &self.graph
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    pub fn focus_id(&self) -> Option<EventId> {
        self.focus_id
    }

    /// Handle the host can use to cancel this session's in-flight work.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn rebuild(&mut self) {
        self.graph = ThreadGraph::build(
            &self.store,
            self.focus_id,
            self.pinned_root,
            &self.collapsed,
        );
    }

    /// Query NIP-65 relay lists for authors mentioned near still-missing
    /// ancestors. Returns whether any new write relay was learned.
    async fn discover_relays(&mut self) -> Result<bool, FetchError> {
        let targets = self.ancestors.relay_discovery_targets(&self.store);
        if targets.is_empty() {
            return Ok(false);
        }
        info!(authors = targets.len(), "querying relay lists for missing ancestors");
        let relays = self.merged_relays(&[]);
        let filter = Filter::new()
            .kinds([Kind::from(kinds::RELAY_LIST)])
            .authors(targets)
            .limit(self.config.fetch_limit);
        let events = self.fetch_events(filter, &relays).await?;
        let before = self.ancestors.discovered_relays().len();
        for event in &events {
            self.ancestors.add_discovered_relays(write_relays(event));
        }
        Ok(self.ancestors.discovered_relays().len() > before)
    }

    async fn fetch_children_of(&mut self, ids: &[EventId]) -> Result<usize, FetchError> {
        let relays = self.merged_relays(&[]);
        let (replies, comments) = self.reply_filters(ids);
        let mut added = 0;
        let events = self.fetch_events(replies, &relays).await?;
        added += self.store.insert_events(&events);
        let events = self.fetch_events(comments, &relays).await?;
        added += self.store.insert_events(&events);
        Ok(added)
    }

    /// The two filters covering replies to `ids`: NIP-10 "e" references for
    /// notes and comments, plus NIP-22 uppercase "E" root references.
    fn reply_filters(&self, ids: &[EventId]) -> (Filter, Filter) {
        let replies = Filter::new()
            .kinds([Kind::from(kinds::TEXT_NOTE), Kind::from(kinds::COMMENT)])
            .events(ids.to_vec())
            .limit(self.config.fetch_limit);
        let comments = Filter::new()
            .kinds([Kind::from(kinds::COMMENT)])
            .custom_tags(
                SingleLetterTag::uppercase(Alphabet::E),
                ids.iter().map(|id| id.to_hex()),
            )
            .limit(self.config.fetch_limit);
        (replies, comments)
    }

    /// Relay hints first, then NIP-65 discoveries, then configured read
    /// relays, deduplicated in that priority order.
    fn merged_relays(&self, hints: &[RelayUrl]) -> Vec<RelayUrl> {
        let mut relays: Vec<RelayUrl> = Vec::new();
        for relay in hints
            .iter()
            .chain(self.ancestors.discovered_relays())
            .chain(&self.config.read_relays)
        {
            if !relays.contains(relay) {
                relays.push(relay.clone());
            }
        }
        relays
    }

    /// Fetch from the network source. Transport failures count as an empty
    /// result so one dead relay cannot stall resolution; only cancellation
    /// propagates.
    async fn fetch_events(
        &self,
        filter: Filter,
        relays: &[RelayUrl],
    ) -> Result<Vec<Event>, FetchError> {
        if self.cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        if relays.is_empty() {
            debug!("no relays available for fetch");
            return Ok(Vec::new());
        }
        debug!(filter = %filter.as_json(), relays = relays.len(), "fetching from relays");
        tokio::select! {
            _ = self.cancel.cancelled() => Err(FetchError::Cancelled),
            res = self.source.fetch(filter, relays) => match res {
                Ok(events) => Ok(events),
                Err(err) if err.is_cancelled() => Err(err),
                Err(err) => {
                    debug!(error = %err, "relay fetch failed, treating as empty");
                    Ok(Vec::new())
                }
            },
        }
    }

    async fn local_query(&self, filter: Filter) -> Result<Vec<Event>, FetchError> {
        if self.cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        match self.local.query(filter).await {
            Ok(events) => Ok(events),
            Err(err) if err.is_cancelled() => Err(err),
            Err(err) => {
                debug!(error = %err, "local query failed, treating as empty");
                Ok(Vec::new())
            }
        }
    }
}
