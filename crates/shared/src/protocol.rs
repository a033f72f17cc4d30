use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{AttachmentId, ChannelId, ChannelKind, GuildId, MessageId, RoleId, UserId, WebhookId},
    permissions::{PermissionOverwrite, Permissions},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: UserId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,
    #[serde(default = "default_discriminator")]
    pub discriminator: String,
    #[serde(default)]
    pub bot: bool,
}

fn default_discriminator() -> String {
    "0".to_string()
}

impl Author {
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.username)
    }

    /// Username with the legacy discriminator, omitted when it is "0".
    pub fn tag(&self) -> String {
        if self.discriminator == "0" {
            self.username.clone()
        } else {
            format!("{}#{}", self.username, self.discriminator)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub filename: String,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<ChannelId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<GuildId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<GuildId>,
    pub author: Author,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_reference: Option<MessageReference>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub embeds: Vec<Embed>,
    #[serde(default)]
    pub mentions: Vec<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<WebhookId>,
}

impl Message {
    /// Field-wise merge; fields absent from the partial are left untouched.
    pub fn merge_partial(&mut self, partial: &PartialMessage) {
        if let Some(author) = &partial.author {
            self.author = author.clone();
        }
        if let Some(content) = &partial.content {
            self.content = content.clone();
        }
        if let Some(timestamp) = partial.timestamp {
            self.timestamp = timestamp;
        }
        if let Some(edited) = partial.edited_timestamp {
            self.edited_timestamp = Some(edited);
        }
        if let Some(reference) = &partial.message_reference {
            self.message_reference = Some(reference.clone());
        }
        if let Some(attachments) = &partial.attachments {
            self.attachments = attachments.clone();
        }
        if let Some(embeds) = &partial.embeds {
            self.embeds = embeds.clone();
        }
        if let Some(mentions) = &partial.mentions {
            self.mentions = mentions.clone();
        }
    }

    pub fn replied_message_id(&self) -> Option<MessageId> {
        self.message_reference.as_ref()?.message_id
    }
}

/// Sparse update for an already known message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_reference: Option<MessageReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embeds: Option<Vec<Embed>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentions: Option<Vec<UserId>>,
}

impl PartialMessage {
    pub fn new(id: MessageId, channel_id: ChannelId) -> Self {
        Self {
            id,
            channel_id,
            author: None,
            content: None,
            timestamp: None,
            edited_timestamp: None,
            message_reference: None,
            attachments: None,
            embeds: None,
            mentions: None,
        }
    }
}

/// File queued for upload alongside an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentUpload {
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub content: String,
    pub nonce: String,
    pub message_reference: Option<MessageReference>,
    /// Whether a reply should notify the author of the referenced message.
    pub ping_replied_user: bool,
    pub attachments: Vec<AttachmentUpload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildSummary {
    pub id: GuildId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildFolder {
    /// Pseudo-folders holding a single guild have no id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub guild_ids: Vec<GuildId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub id: ChannelId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<GuildId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ChannelId>,
    pub kind: ChannelKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_id: Option<MessageId>,
    #[serde(default)]
    pub permission_overwrites: Vec<PermissionOverwrite>,
    #[serde(default)]
    pub recipients: Vec<Author>,
}

impl ChannelSummary {
    /// Channel name, or the recipients' display names for private channels.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self
                .recipients
                .iter()
                .map(Author::display_name)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSummary {
    pub id: RoleId,
    pub name: String,
    pub permissions: Permissions,
    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSummary {
    pub guild_id: GuildId,
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<RoleId>,
}

/// Supplementary guild data fetched lazily once a guild becomes visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildDetail {
    pub guild: GuildSummary,
    #[serde(default)]
    pub owner_id: Option<UserId>,
    #[serde(default)]
    pub channels: Vec<ChannelSummary>,
    #[serde(default)]
    pub roles: Vec<RoleSummary>,
    #[serde(default)]
    pub member_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCount {
    pub emoji: String,
    pub count: u32,
    #[serde(default)]
    pub me: bool,
}

/// Supplementary message data fetched lazily once a message becomes visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDetail {
    pub message_id: MessageId,
    #[serde(default)]
    pub reactions: Vec<ReactionCount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_message_count: Option<u32>,
}

/// Realtime events delivered by the gateway, in transmission order per channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum GatewayEvent {
    MessageCreate {
        message: Message,
    },
    MessageUpdate {
        message: PartialMessage,
    },
    MessageDelete {
        channel_id: ChannelId,
        id: MessageId,
    },
    MessageDeleteBulk {
        channel_id: ChannelId,
        ids: Vec<MessageId>,
    },
    TypingStart {
        channel_id: ChannelId,
        user_id: UserId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
    },
    GuildCreate {
        guild: GuildSummary,
    },
    GuildUpdate {
        guild: GuildSummary,
    },
    GuildDelete {
        guild_id: GuildId,
    },
}

impl GatewayEvent {
    pub const KINDS: [&'static str; 8] = [
        "message_create",
        "message_update",
        "message_delete",
        "message_delete_bulk",
        "typing_start",
        "guild_create",
        "guild_update",
        "guild_delete",
    ];

    /// Channel the event is scoped to, if any.
    pub fn channel_id(&self) -> Option<ChannelId> {
        match self {
            GatewayEvent::MessageCreate { message } => Some(message.channel_id),
            GatewayEvent::MessageUpdate { message } => Some(message.channel_id),
            GatewayEvent::MessageDelete { channel_id, .. }
            | GatewayEvent::MessageDeleteBulk { channel_id, .. }
            | GatewayEvent::TypingStart { channel_id, .. } => Some(*channel_id),
            GatewayEvent::GuildCreate { .. }
            | GatewayEvent::GuildUpdate { .. }
            | GatewayEvent::GuildDelete { .. } => None,
        }
    }
}
