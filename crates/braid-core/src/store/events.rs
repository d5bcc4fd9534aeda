use std::collections::HashMap;

use nostr::{Event, EventId};

use crate::models::EventRecord;

/// Idempotent keyed map of event id -> parsed record for one thread session.
///
/// Created empty per session and discarded in full when the session's
/// focus/root changes. Duplicate inserts are no-ops that keep the original
/// record, which makes out-of-order or duplicate relay delivery harmless.
#[derive(Debug, Default)]
pub struct EventStore {
    records: HashMap<EventId, EventRecord>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning a reference to the stored one. If the id
    /// is already present the existing record is kept untouched.
    pub fn insert(&mut self, record: EventRecord) -> &EventRecord {
        self.records.entry(record.id).or_insert(record)
    }

    /// Parse and insert a batch of wire events. Returns how many were new.
    pub fn insert_events<'a>(&mut self, events: impl IntoIterator<Item = &'a Event>) -> usize {
        let mut added = 0;
        for event in events {
            let record = EventRecord::from_event(event);
            if !self.contains(&record.id) {
                self.records.insert(record.id, record);
                added += 1;
            }
        }
        added
    }

    pub fn get(&self, id: &EventId) -> Option<&EventRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &EventId) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventRecord> {
        self.records.values()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr::prelude::*;

    fn note(content: &str) -> Event {
        let keys = Keys::generate();
        EventBuilder::new(Kind::from(1), content)
            .sign_with_keys(&keys)
            .unwrap()
    }

    #[test]
    fn insert_is_idempotent_and_keeps_original_fields() {
        let mut store = EventStore::new();
        let event = note("original");
        let first = EventRecord::from_event(&event);
        let mut second = first.clone();
        second.content = "tampered".to_string();

        store.insert(first);
        assert_eq!(store.len(), 1);

        let kept = store.insert(second);
        assert_eq!(kept.content, "original");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn insert_events_counts_only_new_records() {
        let mut store = EventStore::new();
        let a = note("a");
        let b = note("b");

        assert_eq!(store.insert_events([&a, &b]), 2);
        assert_eq!(store.insert_events([&a, &b]), 0);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn get_and_contains() {
        let mut store = EventStore::new();
        let event = note("x");
        store.insert_events([&event]);
        assert!(store.contains(&event.id));
        assert_eq!(store.get(&event.id).unwrap().content, "x");
        assert!(!store.contains(&EventId::all_zeros()));
    }
}
