use std::time::Duration;

use nostr::RelayUrl;

use crate::constants::{
    MAX_ANCESTOR_ROUNDS, MAX_CHILD_DISCOVERY_ROUNDS, MAX_THREAD_EVENTS, REBUILD_DEBOUNCE_MS,
};

/// Session configuration, constructed by the host application and injected
/// into [`ThreadSession`](crate::session::ThreadSession).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Configured read relays; fallback targets for every fetch.
    pub read_relays: Vec<RelayUrl>,
    /// Debounce interval for live-update rebuilds.
    pub rebuild_debounce: Duration,
    /// Hard cap on ancestor resolution rounds.
    pub max_ancestor_rounds: u32,
    /// Hard cap on child discovery rounds.
    pub max_child_rounds: u32,
    /// Result limit per fetch.
    pub fetch_limit: usize,
}

impl SessionConfig {
    pub fn new(read_relays: Vec<RelayUrl>) -> Self {
        Self {
            read_relays,
            ..Self::default()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_relays: Vec::new(),
            rebuild_debounce: Duration::from_millis(REBUILD_DEBOUNCE_MS),
            max_ancestor_rounds: MAX_ANCESTOR_ROUNDS,
            max_child_rounds: MAX_CHILD_DISCOVERY_ROUNDS,
            fetch_limit: MAX_THREAD_EVENTS,
        }
    }
}
