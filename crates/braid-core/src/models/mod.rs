pub mod record;
pub mod refs;

pub use record::EventRecord;
pub use refs::{mentioned_pubkeys, write_relays, ThreadRefs};
