//! NIP-10 reference parsing.
//!
//! Extracts thread references (root/parent ids with relay hints) and
//! mentioned pubkeys from an event's tag list. Malformed tag entries are
//! skipped individually; parsing an event never fails wholesale.

use nostr::{Event, EventId, PublicKey, RelayUrl};

use crate::constants::kinds;

/// Thread references carried by one event's tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadRefs {
    /// Top of the thread this event belongs to.
    pub root_id: Option<EventId>,
    /// Direct reply target.
    pub parent_id: Option<EventId>,
    /// NIP-10 relay hint for the root event.
    pub root_relay_hint: Option<RelayUrl>,
    /// NIP-10 relay hint for the parent event.
    pub parent_relay_hint: Option<RelayUrl>,
}

impl ThreadRefs {
    /// Parse NIP-10 "e" tags.
    ///
    /// Preferred markers (4th element) are authoritative; on duplicates the
    /// last occurrence wins. Tags carrying any other non-empty marker
    /// (e.g. "mention") are consumed without positional effect. Unmarked
    /// tags fall back to positional interpretation: first "e" tag = root,
    /// last "e" tag = reply target. A single "e" tag resolves both to it,
    /// and a "root" marker with no "reply" marker means the event replies
    /// directly to the root.
    pub fn from_event(event: &Event) -> Self {
        let mut root_id: Option<EventId> = None;
        let mut parent_id: Option<EventId> = None;
        let mut root_relay_hint: Option<RelayUrl> = None;
        let mut parent_relay_hint: Option<RelayUrl> = None;

        let mut first_e: Option<(EventId, Option<RelayUrl>)> = None;
        let mut last_e: Option<(EventId, Option<RelayUrl>)> = None;

        for tag in event.tags.iter() {
            let parts = tag.as_slice();
            if parts.first().map(String::as_str) != Some("e") {
                continue;
            }
            let Some(id) = parts.get(1).and_then(|s| EventId::from_hex(s).ok()) else {
                continue;
            };
            let hint = parts.get(2).and_then(|s| parse_relay_hint(s));

            match parts.get(3).map(String::as_str) {
                Some("root") => {
                    root_id = Some(id);
                    root_relay_hint = hint;
                    continue;
                }
                Some("reply") => {
                    parent_id = Some(id);
                    parent_relay_hint = hint;
                    continue;
                }
                // Any other marker (e.g. "mention") consumes the tag
                Some(marker) if !marker.is_empty() => continue,
                _ => {}
            }

            // Positional fallback candidates
            if first_e.is_none() {
                first_e = Some((id, hint.clone()));
            }
            last_e = Some((id, hint));
        }

        if root_id.is_none() {
            if let Some((id, hint)) = first_e {
                root_id = Some(id);
                root_relay_hint = hint;
            }
        }
        if parent_id.is_none() {
            if let Some((id, hint)) = last_e {
                // Any e-tag (even if same as root) marks the event as a reply
                parent_id = Some(id);
                parent_relay_hint = hint;
            }
        }
        if parent_id.is_none() {
            // Root-only marker: the event replies directly to the root
            parent_id = root_id;
            parent_relay_hint = root_relay_hint.clone();
        }

        Self {
            root_id,
            parent_id,
            root_relay_hint,
            parent_relay_hint,
        }
    }
}

/// Extract mentioned pubkeys from "p" tags (64-hex only, deduplicated,
/// order preserved).
pub fn mentioned_pubkeys(event: &Event) -> Vec<PublicKey> {
    let mut pubkeys: Vec<PublicKey> = Vec::new();
    for tag in event.tags.iter() {
        let parts = tag.as_slice();
        let name = parts.first().map(String::as_str);
        if name != Some("p") && name != Some("P") {
            continue;
        }
        let Some(pk) = parts.get(1).and_then(|s| PublicKey::from_hex(s).ok()) else {
            continue;
        };
        if !pubkeys.contains(&pk) {
            pubkeys.push(pk);
        }
    }
    pubkeys
}

/// Extract the write relays from a NIP-65 relay list event (kind 10002).
///
/// "r" tag format: ["r", url] or ["r", url, "read"|"write"]. Entries with
/// no marker serve both directions.
pub fn write_relays(event: &Event) -> Vec<RelayUrl> {
    if event.kind.as_u16() != kinds::RELAY_LIST {
        return Vec::new();
    }
    let mut relays: Vec<RelayUrl> = Vec::new();
    for tag in event.tags.iter() {
        let parts = tag.as_slice();
        if parts.first().map(String::as_str) != Some("r") {
            continue;
        }
        match parts.get(2).map(String::as_str) {
            None | Some("write") | Some("") => {}
            Some(_) => continue,
        }
        if let Some(url) = parts.get(1).and_then(|s| parse_relay_hint(s)) {
            if !relays.contains(&url) {
                relays.push(url);
            }
        }
    }
    relays
}

/// Validate a relay hint: must be a ws:// or wss:// URL.
fn parse_relay_hint(s: &str) -> Option<RelayUrl> {
    if !s.starts_with("ws://") && !s.starts_with("wss://") {
        return None;
    }
    RelayUrl::parse(s).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr::prelude::*;

    fn hex_id(n: u8) -> String {
        format!("{n:064x}")
    }

    fn e_tag(id: &str, relay: Option<&str>, marker: Option<&str>) -> Tag {
        let mut values = vec![id.to_string()];
        if let Some(r) = relay {
            values.push(r.to_string());
        } else if marker.is_some() {
            values.push(String::new());
        }
        if let Some(m) = marker {
            values.push(m.to_string());
        }
        Tag::custom(
            TagKind::SingleLetter(SingleLetterTag::lowercase(Alphabet::E)),
            values,
        )
    }

    fn sign(tags: Vec<Tag>) -> Event {
        let keys = Keys::generate();
        let mut builder = EventBuilder::new(Kind::from(1), "reply text");
        for tag in tags {
            builder = builder.tag(tag);
        }
        builder.sign_with_keys(&keys).unwrap()
    }

    #[test]
    fn single_unmarked_e_tag_sets_root_and_parent() {
        let event = sign(vec![e_tag(&hex_id(1), None, None)]);
        let refs = ThreadRefs::from_event(&event);
        let expected = EventId::from_hex(&hex_id(1)).unwrap();
        assert_eq!(refs.root_id, Some(expected));
        assert_eq!(refs.parent_id, Some(expected));
    }

    #[test]
    fn positional_fallback_first_is_root_last_is_parent() {
        let event = sign(vec![
            e_tag(&hex_id(1), None, None),
            e_tag(&hex_id(2), None, None),
            e_tag(&hex_id(3), None, None),
        ]);
        let refs = ThreadRefs::from_event(&event);
        assert_eq!(refs.root_id, Some(EventId::from_hex(&hex_id(1)).unwrap()));
        assert_eq!(refs.parent_id, Some(EventId::from_hex(&hex_id(3)).unwrap()));
    }

    #[test]
    fn root_marker_without_reply_marker_defaults_parent_to_root() {
        let event = sign(vec![e_tag(&hex_id(7), Some("wss://relay.one"), Some("root"))]);
        let refs = ThreadRefs::from_event(&event);
        let expected = EventId::from_hex(&hex_id(7)).unwrap();
        assert_eq!(refs.root_id, Some(expected));
        assert_eq!(refs.parent_id, Some(expected));
        assert_eq!(
            refs.parent_relay_hint,
            Some(RelayUrl::parse("wss://relay.one").unwrap())
        );
    }

    #[test]
    fn markers_take_precedence_over_position() {
        let event = sign(vec![
            e_tag(&hex_id(9), None, None),
            e_tag(&hex_id(1), None, Some("root")),
            e_tag(&hex_id(2), None, Some("reply")),
        ]);
        let refs = ThreadRefs::from_event(&event);
        assert_eq!(refs.root_id, Some(EventId::from_hex(&hex_id(1)).unwrap()));
        assert_eq!(refs.parent_id, Some(EventId::from_hex(&hex_id(2)).unwrap()));
    }

    #[test]
    fn duplicate_marker_last_occurrence_wins() {
        let event = sign(vec![
            e_tag(&hex_id(1), None, Some("root")),
            e_tag(&hex_id(2), None, Some("root")),
        ]);
        let refs = ThreadRefs::from_event(&event);
        assert_eq!(refs.root_id, Some(EventId::from_hex(&hex_id(2)).unwrap()));
    }

    #[test]
    fn mention_marker_has_no_positional_effect() {
        let event = sign(vec![
            e_tag(&hex_id(5), None, Some("mention")),
            e_tag(&hex_id(1), None, None),
        ]);
        let refs = ThreadRefs::from_event(&event);
        let expected = EventId::from_hex(&hex_id(1)).unwrap();
        assert_eq!(refs.root_id, Some(expected));
        assert_eq!(refs.parent_id, Some(expected));
    }

    #[test]
    fn invalid_relay_hints_are_dropped() {
        let event = sign(vec![e_tag(&hex_id(1), Some("https://not-a-relay"), Some("root"))]);
        let refs = ThreadRefs::from_event(&event);
        assert_eq!(refs.root_id, Some(EventId::from_hex(&hex_id(1)).unwrap()));
        assert_eq!(refs.root_relay_hint, None);
    }

    #[test]
    fn malformed_e_tags_are_skipped_individually() {
        let event = sign(vec![
            e_tag("deadbeef", None, None), // too short
            e_tag(&hex_id(4), None, None),
        ]);
        let refs = ThreadRefs::from_event(&event);
        assert_eq!(refs.root_id, Some(EventId::from_hex(&hex_id(4)).unwrap()));
    }

    #[test]
    fn no_e_tags_yields_empty_refs() {
        let event = sign(vec![]);
        assert_eq!(ThreadRefs::from_event(&event), ThreadRefs::default());
    }

    #[test]
    fn mentioned_pubkeys_deduplicates_and_validates() {
        let alice = Keys::generate().public_key();
        let bob = Keys::generate().public_key();
        let p_tag = |hex: String| {
            Tag::custom(
                TagKind::SingleLetter(SingleLetterTag::lowercase(Alphabet::P)),
                vec![hex],
            )
        };
        let event = sign(vec![
            p_tag(alice.to_hex()),
            p_tag(bob.to_hex()),
            p_tag(alice.to_hex()),
            p_tag("nothex".to_string()),
        ]);
        assert_eq!(mentioned_pubkeys(&event), vec![alice, bob]);
    }

    #[test]
    fn write_relays_keeps_unmarked_and_write_entries() {
        let keys = Keys::generate();
        let r_tag = |url: &str, marker: Option<&str>| {
            let mut values = vec![url.to_string()];
            if let Some(m) = marker {
                values.push(m.to_string());
            }
            Tag::custom(TagKind::Custom("r".into()), values)
        };
        let event = EventBuilder::new(Kind::from(10002), "")
            .tag(r_tag("wss://write.example", Some("write")))
            .tag(r_tag("wss://both.example", None))
            .tag(r_tag("wss://read.example", Some("read")))
            .sign_with_keys(&keys)
            .unwrap();

        let relays = write_relays(&event);
        assert_eq!(
            relays,
            vec![
                RelayUrl::parse("wss://write.example").unwrap(),
                RelayUrl::parse("wss://both.example").unwrap(),
            ]
        );
    }

    #[test]
    fn write_relays_ignores_other_kinds() {
        let event = sign(vec![Tag::custom(
            TagKind::Custom("r".into()),
            vec!["wss://relay.example".to_string()],
        )]);
        assert!(write_relays(&event).is_empty());
    }
}
