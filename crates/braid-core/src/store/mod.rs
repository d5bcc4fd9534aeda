pub mod events;

pub use events::EventStore;
