//! In-memory `ChatApi` used by the unit tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Mutex,
    },
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use shared::{
    domain::{ChannelId, GuildId, MessageId, UserId},
    protocol::{Author, GuildDetail, GuildSummary, Message, MessageDetail, NewMessage},
};

use crate::api::ChatApi;

pub fn author(id: u64) -> Author {
    Author {
        id: UserId(id),
        username: format!("user{id}"),
        global_name: None,
        discriminator: "0".into(),
        bot: false,
    }
}

pub fn message(channel_id: u64, id: u64) -> Message {
    Message {
        id: MessageId(id),
        channel_id: ChannelId(channel_id),
        guild_id: None,
        author: author(1),
        content: format!("message {id}"),
        timestamp: Utc
            .timestamp_opt(1_700_000_000 + id as i64 * 60, 0)
            .single()
            .expect("timestamp"),
        edited_timestamp: None,
        message_reference: None,
        attachments: Vec::new(),
        embeds: Vec::new(),
        mentions: Vec::new(),
        webhook_id: None,
    }
}

pub fn guild(id: u64) -> GuildSummary {
    GuildSummary {
        id: GuildId(id),
        name: format!("guild {id}"),
        icon: None,
        joined_at: None,
    }
}

#[derive(Default)]
pub struct FakeApi {
    history: Mutex<HashMap<ChannelId, Vec<Message>>>,
    pub history_calls: AtomicUsize,
    pub fail_history: AtomicBool,
    pub fail_send: AtomicBool,
    pub sent: Mutex<Vec<(ChannelId, NewMessage)>>,
    pub acks: Mutex<Vec<(ChannelId, MessageId)>>,
    pub typing_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
    pub guild_calls: AtomicUsize,
    next_id: AtomicU64,
}

impl FakeApi {
    /// Seed `channel_id` with messages `1..=count`.
    pub fn with_history(self, channel_id: u64, count: u64) -> Self {
        self.history
            .lock()
            .expect("history lock")
            .insert(ChannelId(channel_id), (1..=count).map(|id| message(channel_id, id)).collect());
        self
    }
}

#[async_trait]
impl ChatApi for FakeApi {
    async fn fetch_history(
        &self,
        channel_id: ChannelId,
        before: Option<MessageId>,
        limit: u32,
    ) -> Result<Vec<Message>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(anyhow!("connection reset by peer"));
        }
        let history = self.history.lock().expect("history lock");
        let mut page: Vec<Message> = history
            .get(&channel_id)
            .map(|all| {
                all.iter()
                    .filter(|m| before.map_or(true, |before| m.id < before))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        page.sort_by(|a, b| b.id.cmp(&a.id));
        page.truncate(limit as usize);
        // Oldest first, the caller is expected to sort.
        page.reverse();
        Ok(page)
    }

    async fn send_message(&self, channel_id: ChannelId, request: NewMessage) -> Result<Message> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(anyhow!("service unavailable"));
        }
        let id = 10_000 + self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut sent = message(channel_id.0, id);
        sent.content = request.content.clone();
        sent.message_reference = request.message_reference.clone();
        self.sent.lock().expect("sent lock").push((channel_id, request));
        Ok(sent)
    }

    async fn ack_read(&self, channel_id: ChannelId, message_id: MessageId) -> Result<()> {
        self.acks.lock().expect("acks lock").push((channel_id, message_id));
        Ok(())
    }

    async fn trigger_typing(&self, _channel_id: ChannelId) -> Result<()> {
        self.typing_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_guild_detail(&self, guild_id: GuildId) -> Result<GuildDetail> {
        self.guild_calls.fetch_add(1, Ordering::SeqCst);
        Ok(GuildDetail {
            guild: guild(guild_id.0),
            owner_id: Some(UserId(1)),
            channels: Vec::new(),
            roles: Vec::new(),
            member_count: 3,
        })
    }

    async fn fetch_message_detail(
        &self,
        _channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<MessageDetail> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        Ok(MessageDetail {
            message_id,
            reactions: Vec::new(),
            thread_message_count: None,
        })
    }
}
