use nostr::{Event, EventId, JsonUtil, PublicKey};

use super::refs::{mentioned_pubkeys, ThreadRefs};

/// Parsed, immutable view of one event for the current thread session.
///
/// Owned exclusively by [`EventStore`](crate::store::EventStore), keyed by id.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub id: EventId,
    pub pubkey: PublicKey,
    pub created_at: u64,
    pub kind: u16,
    pub content: String,
    /// NIP-10 thread references with relay hints.
    pub refs: ThreadRefs,
    /// p-tag pubkeys, used for NIP-65 relay discovery of missing authors.
    pub mentioned_pubkeys: Vec<PublicKey>,
}

impl EventRecord {
    pub fn from_event(event: &Event) -> Self {
        Self {
            id: event.id,
            pubkey: event.pubkey,
            created_at: event.created_at.as_u64(),
            kind: event.kind.as_u16(),
            content: event.content.clone(),
            refs: ThreadRefs::from_event(event),
            mentioned_pubkeys: mentioned_pubkeys(event),
        }
    }

    /// Parse a raw wire-format event. Returns `None` on malformed input;
    /// callers skip the record and keep loading.
    pub fn from_json(json: &str) -> Option<Self> {
        Event::from_json(json).ok().map(|event| Self::from_event(&event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr::prelude::*;

    #[test]
    fn from_event_captures_refs_and_mentions() {
        let keys = Keys::generate();
        let parent_hex = format!("{:064x}", 42u8);
        // Build via UnsignedEvent: EventBuilder strips p-tags that reference
        // the signing key, which would drop the self-mention fixture here.
        let tags = Tags::from_list(vec![
            Tag::custom(
                TagKind::SingleLetter(SingleLetterTag::lowercase(Alphabet::E)),
                vec![parent_hex.clone()],
            ),
            Tag::custom(
                TagKind::SingleLetter(SingleLetterTag::lowercase(Alphabet::P)),
                vec![keys.public_key().to_hex()],
            ),
        ]);
        let event = UnsignedEvent::new(
            keys.public_key(),
            Timestamp::now(),
            Kind::from(1),
            tags,
            "hello",
        )
        .sign_with_keys(&keys)
        .unwrap();

        let record = EventRecord::from_event(&event);
        assert_eq!(record.id, event.id);
        assert_eq!(record.kind, 1);
        assert_eq!(record.content, "hello");
        assert_eq!(
            record.refs.parent_id,
            Some(EventId::from_hex(&parent_hex).unwrap())
        );
        assert_eq!(record.mentioned_pubkeys, vec![keys.public_key()]);
    }

    #[test]
    fn from_json_round_trips_wire_format() {
        let keys = Keys::generate();
        let event = EventBuilder::new(Kind::from(1111), "a comment")
            .sign_with_keys(&keys)
            .unwrap();
        let record = EventRecord::from_json(&event.as_json()).unwrap();
        assert_eq!(record.id, event.id);
        assert_eq!(record.kind, 1111);
    }

    #[test]
    fn from_json_rejects_malformed_input() {
        assert!(EventRecord::from_json("not json").is_none());
        assert!(EventRecord::from_json("{\"id\":\"nope\"}").is_none());
    }
}
