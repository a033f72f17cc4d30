//! Ordered, deduplicated message store for one channel.
//!
//! Realtime events and paginated history both land here. The sequence is kept
//! newest first; ties on timestamp fall back to the id so the order is total.

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
};

use shared::{
    domain::MessageId,
    protocol::{Message, PartialMessage},
};
use tracing::trace;

#[derive(Debug, Clone, Default)]
pub struct MessageSet {
    ordered: Vec<Message>,
    index: HashMap<MessageId, usize>,
    cache: HashMap<MessageId, Message>,
}

fn newest_first(a: &Message, b: &Message) -> Ordering {
    b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id))
}

impl MessageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Loaded messages, newest first.
    pub fn messages(&self) -> &[Message] {
        &self.ordered
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.ordered.iter()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.index.get(&id).map(|&idx| &self.ordered[idx])
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.index.contains_key(&id)
    }

    /// Content cache lookup, used for cross references such as quoted replies.
    pub fn cached(&self, id: MessageId) -> Option<&Message> {
        self.cache.get(&id)
    }

    pub fn newest(&self) -> Option<&Message> {
        self.ordered.first()
    }

    pub fn oldest(&self) -> Option<&Message> {
        self.ordered.last()
    }

    /// The message `message` replies to, if it is known.
    pub fn quoted(&self, message: &Message) -> Option<&Message> {
        self.cached(message.replied_message_id()?)
    }

    /// Insert a newly created message. Duplicate deliveries are ignored.
    pub fn apply_create(&mut self, message: Message) -> bool {
        if self.index.contains_key(&message.id) {
            trace!(message_id = message.id.0, "ignoring duplicate create");
            return false;
        }

        self.cache.insert(message.id, message.clone());
        let pos = self
            .ordered
            .partition_point(|existing| newest_first(existing, &message) == Ordering::Less);
        self.ordered.insert(pos, message);
        self.reindex_from(pos);
        true
    }

    /// Merge a sparse update into a loaded message. Unknown ids are dropped.
    pub fn apply_update(&mut self, partial: &PartialMessage) -> bool {
        let Some(&idx) = self.index.get(&partial.id) else {
            trace!(message_id = partial.id.0, "dropping update for unloaded message");
            return false;
        };

        let before = self.ordered[idx].timestamp;
        self.ordered[idx].merge_partial(partial);
        self.cache.insert(partial.id, self.ordered[idx].clone());

        if self.ordered[idx].timestamp != before {
            let message = self.ordered.remove(idx);
            let pos = self
                .ordered
                .partition_point(|existing| newest_first(existing, &message) == Ordering::Less);
            self.ordered.insert(pos, message);
            self.reindex_from(idx.min(pos));
        }
        true
    }

    pub fn apply_delete(&mut self, id: MessageId) -> bool {
        self.cache.remove(&id);
        let Some(idx) = self.index.remove(&id) else {
            return false;
        };
        self.ordered.remove(idx);
        self.reindex_from(idx);
        true
    }

    /// Remove every listed id in one pass. Returns how many were loaded.
    pub fn apply_bulk_delete(&mut self, ids: &[MessageId]) -> usize {
        let doomed: HashSet<MessageId> = ids.iter().copied().collect();
        for id in &doomed {
            self.cache.remove(id);
        }

        let before = self.ordered.len();
        self.ordered.retain(|message| !doomed.contains(&message.id));
        let removed = before - self.ordered.len();
        if removed > 0 {
            self.index.clear();
            self.reindex_from(0);
        }
        removed
    }

    /// Merge a history page. Entries already present win over the page copy,
    /// since they may carry newer realtime state. Returns the ids that were
    /// newly inserted.
    pub fn merge_page(&mut self, page: Vec<Message>) -> Vec<MessageId> {
        let mut inserted = Vec::new();
        for message in page {
            if self.index.contains_key(&message.id) || inserted.contains(&message.id) {
                continue;
            }
            self.cache.entry(message.id).or_insert_with(|| message.clone());
            inserted.push(message.id);
            self.ordered.push(message);
        }

        if !inserted.is_empty() {
            self.ordered.sort_by(newest_first);
            self.reindex_from(0);
        }
        inserted
    }

    fn reindex_from(&mut self, start: usize) {
        for (idx, message) in self.ordered.iter().enumerate().skip(start) {
            self.index.insert(message.id, idx);
        }
    }
}

#[cfg(test)]
#[path = "tests/message_set_tests.rs"]
mod tests;
