use super::*;
use chrono::{DateTime, TimeZone, Utc};
use shared::{
    domain::{ChannelId, UserId},
    protocol::{Author, MessageReference},
};

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_714_000_000 + secs, 0).unwrap()
}

fn message(id: u64, secs: i64) -> Message {
    Message {
        id: MessageId(id),
        channel_id: ChannelId(1),
        guild_id: None,
        author: Author {
            id: UserId(42),
            username: "alice".into(),
            global_name: None,
            discriminator: "0".into(),
            bot: false,
        },
        content: format!("message {id}"),
        timestamp: at(secs),
        edited_timestamp: None,
        message_reference: None,
        attachments: Vec::new(),
        embeds: Vec::new(),
        mentions: Vec::new(),
        webhook_id: None,
    }
}

fn ids(set: &MessageSet) -> Vec<u64> {
    set.iter().map(|m| m.id.0).collect()
}

fn assert_newest_first(set: &MessageSet) {
    for pair in set.messages().windows(2) {
        assert!(
            pair[0].timestamp >= pair[1].timestamp,
            "{} is older than {}",
            pair[0].id,
            pair[1].id
        );
    }
    for (idx, message) in set.messages().iter().enumerate() {
        assert_eq!(set.get(message.id).map(|m| m.id), Some(message.id), "index {idx}");
    }
}

#[test]
fn duplicate_creates_keep_one_entry_per_id() {
    let mut set = MessageSet::new();
    assert!(set.apply_create(message(1, 10)));
    assert!(set.apply_create(message(2, 20)));
    assert!(!set.apply_create(message(1, 10)));
    assert!(!set.apply_create(message(2, 20)));
    assert!(!set.apply_create(message(1, 99)));

    assert_eq!(set.len(), 2);
    assert_eq!(ids(&set), vec![2, 1]);
}

#[test]
fn creates_are_kept_newest_first_regardless_of_arrival() {
    let mut set = MessageSet::new();
    for (id, secs) in [(3, 30), (1, 10), (5, 50), (2, 20), (4, 40)] {
        set.apply_create(message(id, secs));
    }

    assert_eq!(ids(&set), vec![5, 4, 3, 2, 1]);
    assert_eq!(set.newest().map(|m| m.id), Some(MessageId(5)));
    assert_eq!(set.oldest().map(|m| m.id), Some(MessageId(1)));
    assert_newest_first(&set);
}

#[test]
fn equal_timestamps_are_ordered_by_id() {
    let mut set = MessageSet::new();
    set.apply_create(message(7, 10));
    set.apply_create(message(9, 10));
    set.apply_create(message(8, 10));

    assert_eq!(ids(&set), vec![9, 8, 7]);
}

#[test]
fn update_for_unknown_id_leaves_set_unchanged() {
    let mut set = MessageSet::new();
    set.apply_create(message(1, 10));
    let before = set.messages().to_vec();

    let mut partial = PartialMessage::new(MessageId(404), ChannelId(1));
    partial.content = Some("ghost".into());

    assert!(!set.apply_update(&partial));
    assert_eq!(set.messages(), before.as_slice());
    assert!(set.cached(MessageId(404)).is_none());
}

#[test]
fn update_merges_fields_and_refreshes_cache() {
    let mut set = MessageSet::new();
    set.apply_create(message(1, 10));

    let mut partial = PartialMessage::new(MessageId(1), ChannelId(1));
    partial.content = Some("edited".into());
    partial.edited_timestamp = Some(at(15));

    assert!(set.apply_update(&partial));
    let stored = set.get(MessageId(1)).expect("message");
    assert_eq!(stored.content, "edited");
    assert_eq!(stored.author.username, "alice");
    assert_eq!(set.cached(MessageId(1)).map(|m| m.content.as_str()), Some("edited"));
}

#[test]
fn update_that_moves_timestamp_keeps_order() {
    let mut set = MessageSet::new();
    for (id, secs) in [(1, 10), (2, 20), (3, 30)] {
        set.apply_create(message(id, secs));
    }

    let mut partial = PartialMessage::new(MessageId(1), ChannelId(1));
    partial.timestamp = Some(at(40));
    set.apply_update(&partial);

    assert_eq!(ids(&set), vec![1, 3, 2]);
    assert_newest_first(&set);
}

#[test]
fn delete_removes_from_set_and_cache() {
    let mut set = MessageSet::new();
    set.apply_create(message(1, 10));
    set.apply_create(message(2, 20));

    assert!(set.apply_delete(MessageId(1)));
    assert!(!set.apply_delete(MessageId(1)));
    assert_eq!(ids(&set), vec![2]);
    assert!(set.cached(MessageId(1)).is_none());
    assert_newest_first(&set);
}

#[test]
fn delete_does_not_poison_later_create() {
    let mut set = MessageSet::new();
    set.apply_create(message(1, 10));
    set.apply_delete(MessageId(1));

    assert!(set.apply_create(message(1, 10)));
    assert!(set.contains(MessageId(1)));
    assert!(set.cached(MessageId(1)).is_some());
}

#[test]
fn bulk_delete_removes_all_known_ids_and_ignores_unknown() {
    let mut set = MessageSet::new();
    for id in 1..=6 {
        set.apply_create(message(id, id as i64 * 10));
    }

    let removed = set.apply_bulk_delete(&[MessageId(2), MessageId(4), MessageId(99)]);

    assert_eq!(removed, 2);
    assert_eq!(ids(&set), vec![6, 5, 3, 1]);
    assert!(!set.contains(MessageId(2)));
    assert!(set.cached(MessageId(4)).is_none());
    assert_newest_first(&set);
}

#[test]
fn merge_page_prefers_existing_entries() {
    let mut set = MessageSet::new();
    let mut live = message(2, 20);
    live.content = "live edit".into();
    set.apply_create(live);

    let mut stale = message(2, 20);
    stale.content = "stale copy".into();
    let inserted = set.merge_page(vec![message(1, 10), stale, message(3, 5), message(1, 10)]);

    assert_eq!(inserted, vec![MessageId(1), MessageId(3)]);
    assert_eq!(ids(&set), vec![2, 1, 3]);
    assert_eq!(set.get(MessageId(2)).map(|m| m.content.as_str()), Some("live edit"));
    assert_eq!(
        set.cached(MessageId(2)).map(|m| m.content.as_str()),
        Some("live edit")
    );
}

#[test]
fn ordering_holds_after_mixed_operations() {
    let mut set = MessageSet::new();
    set.apply_create(message(10, 100));
    set.merge_page(vec![message(4, 40), message(6, 60), message(5, 50)]);
    set.apply_create(message(11, 110));
    let mut partial = PartialMessage::new(MessageId(4), ChannelId(1));
    partial.timestamp = Some(at(105));
    set.apply_update(&partial);
    set.merge_page(vec![message(1, 10), message(2, 20)]);
    set.apply_bulk_delete(&[MessageId(6)]);
    set.apply_create(message(3, 30));

    assert_eq!(ids(&set), vec![11, 4, 10, 5, 3, 2, 1]);
    assert_newest_first(&set);
}

#[test]
fn quoted_lookup_uses_cache() {
    let mut set = MessageSet::new();
    set.apply_create(message(1, 10));
    let mut reply = message(2, 20);
    reply.message_reference = Some(MessageReference {
        message_id: Some(MessageId(1)),
        channel_id: Some(ChannelId(1)),
        guild_id: None,
    });
    set.apply_create(reply.clone());

    assert_eq!(set.quoted(&reply).map(|m| m.id), Some(MessageId(1)));
    assert!(set.quoted(&message(3, 30)).is_none());
}
