pub mod config;
pub mod constants;
pub mod error;
pub mod graph;
pub mod models;
pub mod resolver;
pub mod session;
pub mod source;
pub mod store;

// Re-export the main engine types at crate root for convenience
pub use config::SessionConfig;
pub use error::FetchError;
pub use graph::{ThreadGraph, ThreadNode};
pub use models::{EventRecord, ThreadRefs};
pub use session::ThreadSession;
pub use source::{EventSource, LocalStore};
pub use store::EventStore;
