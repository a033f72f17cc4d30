use std::{collections::HashMap, time::Duration};

use shared::domain::{ChannelId, UserId};
use tokio::time::Instant;

pub const DEFAULT_TYPING_INTERVAL: Duration = Duration::from_secs(8);
pub const DEFAULT_TYPING_EXPIRY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypingSummary {
    Nobody,
    One(String),
    Two(String, String),
    Several,
}

impl TypingSummary {
    pub fn label(&self) -> Option<String> {
        match self {
            TypingSummary::Nobody => None,
            TypingSummary::One(name) => Some(format!("{name} is typing...")),
            TypingSummary::Two(first, second) => Some(format!("{first} and {second} are typing...")),
            TypingSummary::Several => Some("Several people are typing...".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
struct TypingEntry {
    user_id: UserId,
    display_name: String,
    started: Instant,
}

/// Who is typing where. Entries lapse after `expiry` unless refreshed.
#[derive(Debug, Clone)]
pub struct TypingTracker {
    expiry: Duration,
    channels: HashMap<ChannelId, Vec<TypingEntry>>,
}

impl Default for TypingTracker {
    fn default() -> Self {
        Self::new(DEFAULT_TYPING_EXPIRY)
    }
}

impl TypingTracker {
    pub fn new(expiry: Duration) -> Self {
        Self {
            expiry,
            channels: HashMap::new(),
        }
    }

    pub fn start(&mut self, channel_id: ChannelId, user_id: UserId, display_name: &str, now: Instant) {
        let entries = self.channels.entry(channel_id).or_default();
        entries.retain(|entry| entry.user_id != user_id);
        entries.push(TypingEntry {
            user_id,
            display_name: display_name.to_string(),
            started: now,
        });
    }

    pub fn stop(&mut self, channel_id: ChannelId, user_id: UserId) -> bool {
        let Some(entries) = self.channels.get_mut(&channel_id) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| entry.user_id != user_id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            self.channels.remove(&channel_id);
        }
        removed
    }

    /// Display names of users still typing in `channel_id`, oldest first.
    pub fn active(&self, channel_id: ChannelId, now: Instant) -> Vec<String> {
        self.channels
            .get(&channel_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| now.saturating_duration_since(entry.started) < self.expiry)
                    .map(|entry| entry.display_name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn summary(&self, channel_id: ChannelId, now: Instant) -> TypingSummary {
        let mut names = self.active(channel_id, now).into_iter();
        match (names.next(), names.next(), names.next()) {
            (None, _, _) => TypingSummary::Nobody,
            (Some(one), None, _) => TypingSummary::One(one),
            (Some(first), Some(second), None) => TypingSummary::Two(first, second),
            _ => TypingSummary::Several,
        }
    }

    /// Drop lapsed entries. Returns the channels whose typing set changed.
    pub fn prune(&mut self, now: Instant) -> Vec<ChannelId> {
        let expiry = self.expiry;
        let mut changed = Vec::new();
        self.channels.retain(|channel_id, entries| {
            let before = entries.len();
            entries.retain(|entry| now.saturating_duration_since(entry.started) < expiry);
            if entries.len() != before {
                changed.push(*channel_id);
            }
            !entries.is_empty()
        });
        changed
    }

    pub fn clear(&mut self) {
        self.channels.clear();
    }
}

/// Rate limit for outgoing typing indicators.
#[derive(Debug, Clone)]
pub struct TypingThrottle {
    interval: Duration,
    last_sent: Option<Instant>,
}

impl Default for TypingThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_TYPING_INTERVAL)
    }
}

impl TypingThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
        }
    }

    pub fn should_send(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_sent {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_sent = Some(now);
        true
    }

    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_wording() {
        assert_eq!(TypingSummary::Nobody.label(), None);
        assert_eq!(
            TypingSummary::One("alice".into()).label().as_deref(),
            Some("alice is typing...")
        );
        assert_eq!(
            TypingSummary::Two("alice".into(), "bob".into()).label().as_deref(),
            Some("alice and bob are typing...")
        );
        assert_eq!(
            TypingSummary::Several.label().as_deref(),
            Some("Several people are typing...")
        );
    }

    #[test]
    fn tracker_counts_and_expires_entries() {
        let now = Instant::now();
        let channel = ChannelId(3);
        let mut tracker = TypingTracker::default();

        tracker.start(channel, UserId(1), "alice", now);
        assert_eq!(tracker.summary(channel, now), TypingSummary::One("alice".into()));

        tracker.start(channel, UserId(2), "bob", now + Duration::from_secs(2));
        tracker.start(channel, UserId(1), "alice", now + Duration::from_secs(3));
        assert_eq!(
            tracker.summary(channel, now + Duration::from_secs(3)),
            TypingSummary::Two("bob".into(), "alice".into())
        );

        tracker.start(channel, UserId(3), "carol", now + Duration::from_secs(4));
        assert_eq!(tracker.summary(channel, now + Duration::from_secs(4)), TypingSummary::Several);

        let later = now + Duration::from_secs(12);
        assert_eq!(tracker.active(channel, later), vec!["alice", "carol"]);

        tracker.prune(now + Duration::from_secs(30));
        assert_eq!(tracker.summary(channel, now), TypingSummary::Nobody);
    }

    #[test]
    fn prune_drops_lapsed_channels() {
        let now = Instant::now();
        let mut tracker = TypingTracker::default();
        tracker.start(ChannelId(1), UserId(1), "alice", now);
        tracker.start(ChannelId(2), UserId(2), "bob", now);
        tracker.start(ChannelId(2), UserId(3), "carol", now + Duration::from_secs(5));

        let mut changed = tracker.prune(now + Duration::from_secs(11));
        changed.sort();
        assert_eq!(changed, vec![ChannelId(1), ChannelId(2)]);
        assert!(!tracker.channels.contains_key(&ChannelId(1)));
        assert_eq!(tracker.channels[&ChannelId(2)].len(), 1);

        assert!(tracker.prune(now + Duration::from_secs(11)).is_empty());
        tracker.prune(now + Duration::from_secs(20));
        assert!(tracker.channels.is_empty());
    }

    #[test]
    fn stop_removes_only_that_user() {
        let now = Instant::now();
        let mut tracker = TypingTracker::default();
        tracker.start(ChannelId(1), UserId(1), "alice", now);
        tracker.start(ChannelId(1), UserId(2), "bob", now);

        assert!(tracker.stop(ChannelId(1), UserId(1)));
        assert!(!tracker.stop(ChannelId(1), UserId(1)));
        assert!(!tracker.stop(ChannelId(9), UserId(2)));
        assert_eq!(tracker.active(ChannelId(1), now), vec!["bob"]);
    }

    #[test]
    fn throttle_sends_once_per_interval() {
        let now = Instant::now();
        let mut throttle = TypingThrottle::default();

        assert!(throttle.should_send(now));
        assert!(!throttle.should_send(now + Duration::from_secs(7)));
        assert!(throttle.should_send(now + Duration::from_secs(8)));

        throttle.reset();
        assert!(throttle.should_send(now + Duration::from_secs(9)));
    }
}
