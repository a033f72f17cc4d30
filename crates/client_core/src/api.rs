use anyhow::Result;
use async_trait::async_trait;
use shared::{
    domain::{ChannelId, GuildId, MessageId},
    protocol::{GuildDetail, Message, MessageDetail, NewMessage},
};

/// REST surface of the chat service consumed by the sync layer.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// One page of history older than `before` (newest page when `None`).
    /// Results may arrive in any order.
    async fn fetch_history(
        &self,
        channel_id: ChannelId,
        before: Option<MessageId>,
        limit: u32,
    ) -> Result<Vec<Message>>;

    async fn send_message(&self, channel_id: ChannelId, message: NewMessage) -> Result<Message>;

    async fn ack_read(&self, channel_id: ChannelId, message_id: MessageId) -> Result<()>;

    async fn trigger_typing(&self, channel_id: ChannelId) -> Result<()>;

    async fn fetch_guild_detail(&self, guild_id: GuildId) -> Result<GuildDetail>;

    async fn fetch_message_detail(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<MessageDetail>;
}
