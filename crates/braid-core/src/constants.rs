//! Engine-wide constants
//!
//! Centralized location for the bounds and defaults that are used
//! across multiple modules.

/// Maximum rendered depth; deeper replies are clamped for display only
pub const MAX_THREAD_DEPTH: u32 = 10;

/// Result limit per relay/local query
pub const MAX_THREAD_EVENTS: usize = 100;

/// Maximum rounds of ancestor chain traversal per session
pub const MAX_ANCESTOR_ROUNDS: u32 = 50;

/// Maximum rounds of iterative child discovery per session.
/// Intentionally small: live updates surface later replies anyway.
pub const MAX_CHILD_DISCOVERY_ROUNDS: u32 = 5;

/// Debounce interval for graph rebuild after live updates (ms)
pub const REBUILD_DEBOUNCE_MS: u64 = 150;

// Nostr event kinds the engine cares about
pub mod kinds {
    /// Text note (NIP-10 threading)
    pub const TEXT_NOTE: u16 = 1;
    /// Comment (NIP-22)
    pub const COMMENT: u16 = 1111;
    /// Relay list metadata (NIP-65)
    pub const RELAY_LIST: u16 = 10002;
}
