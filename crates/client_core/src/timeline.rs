use shared::{domain::MessageId, protocol::Message};

/// Messages from the same author closer together than this are grouped.
pub const COMPACT_WINDOW_SECS: i64 = 7 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineRow {
    pub message_id: MessageId,
    /// Render without the author header.
    pub compact: bool,
    /// Render a date separator above this message.
    pub day_divider: bool,
}

/// Row layout for a newest-first message slice.
pub fn annotate(messages: &[Message], reached_top: bool) -> Vec<TimelineRow> {
    messages
        .iter()
        .enumerate()
        .map(|(idx, message)| {
            let older = messages.get(idx + 1);
            let day_divider = match older {
                Some(older) => older.timestamp.date_naive() != message.timestamp.date_naive(),
                None => reached_top,
            };
            let compact = !day_divider
                && message.message_reference.is_none()
                && older.is_some_and(|older| {
                    older.author.id == message.author.id
                        && (message.timestamp - older.timestamp).num_seconds() < COMPACT_WINDOW_SECS
                });
            TimelineRow {
                message_id: message.id,
                compact,
                day_divider,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use shared::{
        domain::{ChannelId, UserId},
        protocol::{Author, MessageReference},
    };

    use super::*;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, minute, 0).unwrap()
    }

    fn message(id: u64, author: u64, timestamp: DateTime<Utc>) -> Message {
        Message {
            id: MessageId(id),
            channel_id: ChannelId(1),
            guild_id: None,
            author: Author {
                id: UserId(author),
                username: format!("user{author}"),
                global_name: None,
                discriminator: "0".into(),
                bot: false,
            },
            content: String::new(),
            timestamp,
            edited_timestamp: None,
            message_reference: None,
            attachments: Vec::new(),
            embeds: Vec::new(),
            mentions: Vec::new(),
            webhook_id: None,
        }
    }

    fn flags(rows: &[TimelineRow]) -> Vec<(u64, bool, bool)> {
        rows.iter()
            .map(|row| (row.message_id.0, row.compact, row.day_divider))
            .collect()
    }

    #[test]
    fn groups_same_author_within_window() {
        let messages = vec![
            message(4, 1, at(2, 10, 20)),
            message(3, 1, at(2, 10, 5)),
            message(2, 1, at(2, 10, 1)),
            message(1, 2, at(2, 10, 0)),
        ];

        assert_eq!(
            flags(&annotate(&messages, false)),
            vec![(4, false, false), (3, true, false), (2, false, false), (1, false, false)]
        );
    }

    #[test]
    fn day_change_and_top_get_dividers() {
        let messages = vec![
            message(3, 1, at(3, 0, 2)),
            message(2, 1, at(2, 23, 59)),
            message(1, 1, at(2, 23, 58)),
        ];

        assert_eq!(
            flags(&annotate(&messages, true)),
            vec![(3, false, true), (2, true, false), (1, false, true)]
        );
        assert!(!annotate(&messages, false)[2].day_divider);
    }

    #[test]
    fn replies_are_never_compact() {
        let mut reply = message(2, 1, at(2, 10, 1));
        reply.message_reference = Some(MessageReference {
            message_id: Some(MessageId(1)),
            channel_id: Some(ChannelId(1)),
            guild_id: None,
        });
        let messages = vec![reply, message(1, 1, at(2, 10, 0))];

        assert!(!annotate(&messages, false)[0].compact);
    }
}
