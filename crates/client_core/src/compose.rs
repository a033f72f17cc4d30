//! Outgoing message drafts and send status.

use shared::{
    domain::{ChannelId, GuildId, MessageId},
    protocol::{AttachmentUpload, Message, MessageReference, NewMessage},
};
use thiserror::Error;

use crate::error::SyncError;

pub const MAX_ATTACHMENTS: usize = 10;
pub const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttachmentError {
    #[error("at most {limit} attachments can be sent with one message")]
    TooMany { limit: usize },
    #[error("{filename} is {size_bytes} bytes, the limit is {limit}")]
    TooLarge {
        filename: String,
        size_bytes: u64,
        limit: u64,
    },
}

/// The message a draft answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    /// `None` for direct messages.
    pub guild_id: Option<GuildId>,
    /// Notify the author of the replied message.
    pub ping: bool,
}

impl ReplyTarget {
    pub fn to(message: &Message, ping: bool) -> Self {
        Self {
            message_id: message.id,
            channel_id: message.channel_id,
            guild_id: message.guild_id,
            ping,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub content: String,
    pub attachments: Vec<AttachmentUpload>,
    pub reply_to: Option<ReplyTarget>,
}

impl Draft {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn replying_to(mut self, target: ReplyTarget) -> Self {
        self.reply_to = Some(target);
        self
    }

    pub fn attach(&mut self, upload: AttachmentUpload) -> Result<(), AttachmentError> {
        if self.attachments.len() >= MAX_ATTACHMENTS {
            return Err(AttachmentError::TooMany {
                limit: MAX_ATTACHMENTS,
            });
        }
        let size_bytes = upload.bytes.len() as u64;
        if size_bytes > MAX_ATTACHMENT_BYTES {
            return Err(AttachmentError::TooLarge {
                filename: upload.filename,
                size_bytes,
                limit: MAX_ATTACHMENT_BYTES,
            });
        }
        self.attachments.push(upload);
        Ok(())
    }

    pub fn remove_attachment(&mut self, index: usize) -> Option<AttachmentUpload> {
        (index < self.attachments.len()).then(|| self.attachments.remove(index))
    }

    /// Whitespace-only text with no files is not worth sending.
    pub fn is_sendable(&self) -> bool {
        !self.content.trim().is_empty() || !self.attachments.is_empty()
    }

    pub fn into_new_message(self, nonce: String) -> NewMessage {
        let ping_replied_user = self.reply_to.as_ref().is_some_and(|target| target.ping);
        let message_reference = self.reply_to.map(|target| MessageReference {
            message_id: Some(target.message_id),
            channel_id: Some(target.channel_id),
            guild_id: target.guild_id,
        });
        NewMessage {
            content: self.content.trim().to_string(),
            nonce,
            message_reference,
            ping_replied_user,
            attachments: self.attachments,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SendStatus {
    #[default]
    Idle,
    Sending,
    Failed {
        draft: Draft,
        error: SyncError,
    },
}

impl SendStatus {
    pub fn is_sending(&self) -> bool {
        matches!(self, SendStatus::Sending)
    }

    pub fn failed_draft(&self) -> Option<&Draft> {
        match self {
            SendStatus::Failed { draft, .. } => Some(draft),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, size: usize) -> AttachmentUpload {
        AttachmentUpload {
            filename: name.to_string(),
            mime_type: Some("application/octet-stream".into()),
            bytes: vec![0; size],
        }
    }

    #[test]
    fn attachment_limits_are_enforced() {
        let mut draft = Draft::text("files");
        for i in 0..MAX_ATTACHMENTS {
            draft.attach(upload(&format!("f{i}.bin"), 16)).expect("attach");
        }
        assert_eq!(
            draft.attach(upload("extra.bin", 16)),
            Err(AttachmentError::TooMany {
                limit: MAX_ATTACHMENTS
            })
        );

        let mut draft = Draft::default();
        let err = draft
            .attach(upload("huge.bin", MAX_ATTACHMENT_BYTES as usize + 1))
            .expect_err("too large");
        assert!(matches!(err, AttachmentError::TooLarge { ref filename, .. } if filename == "huge.bin"));
        assert!(draft.attachments.is_empty());
    }

    #[test]
    fn blank_drafts_are_not_sendable() {
        assert!(!Draft::text("   \n").is_sendable());
        assert!(Draft::text("hi").is_sendable());

        let mut draft = Draft::text(" ");
        draft.attach(upload("a.png", 4)).expect("attach");
        assert!(draft.is_sendable());
        assert!(draft.remove_attachment(0).is_some());
        assert!(draft.remove_attachment(0).is_none());
    }

    #[test]
    fn reply_in_direct_message_omits_guild() {
        let target = ReplyTarget {
            message_id: MessageId(10),
            channel_id: ChannelId(2),
            guild_id: None,
            ping: false,
        };
        let request = Draft::text(" thanks ").replying_to(target).into_new_message("n1".into());

        assert_eq!(request.content, "thanks");
        assert!(!request.ping_replied_user);
        assert_eq!(
            request.message_reference,
            Some(MessageReference {
                message_id: Some(MessageId(10)),
                channel_id: Some(ChannelId(2)),
                guild_id: None,
            })
        );
    }

    #[test]
    fn guild_reply_carries_ping_flag() {
        let target = ReplyTarget {
            message_id: MessageId(10),
            channel_id: ChannelId(2),
            guild_id: Some(GuildId(7)),
            ping: true,
        };
        let request = Draft::text("ok").replying_to(target).into_new_message("n2".into());

        assert!(request.ping_replied_user);
        assert_eq!(
            request.message_reference.and_then(|r| r.guild_id),
            Some(GuildId(7))
        );
        assert!(Draft::text("plain").into_new_message("n3".into()).message_reference.is_none());
    }
}
