//! Data-source seams the thread session is written against.
//!
//! Network transport and local persistence live outside this crate; the
//! session only needs these two capabilities. Tests substitute in-memory
//! implementations.

use async_trait::async_trait;
use futures::stream::BoxStream;
use nostr::{Event, Filter, RelayUrl};

use crate::error::FetchError;

/// Fetches events matching a filter from a set of relays.
///
/// Implementations merge results across relays and deduplicate by event id.
/// A relay that fails or times out must not fail the whole fetch as long as
/// another relay answered.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch(&self, filter: Filter, relays: &[RelayUrl]) -> Result<Vec<Event>, FetchError>;
}

/// Local event cache: queried before the network on initial load, and the
/// source of the live subscription feed.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn query(&self, filter: Filter) -> Result<Vec<Event>, FetchError>;

    /// Stream of event batches matching the filter as they are ingested.
    /// The stream ends when the underlying store shuts down.
    fn subscribe(&self, filter: Filter) -> BoxStream<'static, Vec<Event>>;
}
