//! `ChatApi` over the service's REST endpoints.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use shared::{
    domain::{AttachmentId, ChannelId, GuildId, MessageId},
    error::{code_for_status, ApiError},
    protocol::{AttachmentUpload, GuildDetail, Message, MessageDetail, MessageReference, NewMessage},
};
use tracing::debug;
use url::Url;

use crate::api::ChatApi;

#[derive(Serialize)]
struct HistoryQuery {
    limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    before: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SendMessageBody {
    content: String,
    nonce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message_reference: Option<MessageReference>,
    #[serde(default)]
    ping_replied_user: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    attachment_ids: Vec<AttachmentId>,
}

#[derive(Debug, Serialize, Deserialize)]
struct UploadedAttachment {
    id: AttachmentId,
}

pub struct HttpChatApi {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpChatApi {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let parsed = Url::parse(base_url).with_context(|| format!("invalid server url: {base_url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("server_url must start with http:// or https://");
        }
        Ok(Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{path}", self.base_url));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn upload_attachment(&self, channel_id: ChannelId, upload: AttachmentUpload) -> Result<AttachmentId> {
        let mime_type = upload
            .mime_type
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let response = self
            .request(Method::POST, &format!("/channels/{channel_id}/attachments"))
            .query(&[("filename", upload.filename.as_str()), ("mime_type", mime_type.as_str())])
            .body(upload.bytes)
            .send()
            .await?;
        let uploaded: UploadedAttachment = checked(response).await?.json().await?;
        debug!(channel_id = channel_id.0, attachment_id = uploaded.id.0, "attachment uploaded");
        Ok(uploaded.id)
    }
}

/// Pass successful responses through; turn error bodies into [`ApiError`].
async fn checked(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after_ms = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(|secs| secs * 1_000);
    let body = response.text().await.unwrap_or_default();
    let mut error = serde_json::from_str::<ApiError>(&body).unwrap_or_else(|_| {
        let message = if body.trim().is_empty() {
            status.to_string()
        } else {
            body.trim().to_string()
        };
        ApiError::new(code_for_status(status.as_u16()), message)
    });
    if error.code.is_transient() && error.retry_after_ms.is_none() {
        error.retry_after_ms = retry_after_ms;
    }
    Err(anyhow!(error).context(format!("request failed with status {status}")))
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn fetch_history(
        &self,
        channel_id: ChannelId,
        before: Option<MessageId>,
        limit: u32,
    ) -> Result<Vec<Message>> {
        let response = self
            .request(Method::GET, &format!("/channels/{channel_id}/messages"))
            .query(&HistoryQuery {
                limit,
                before: before.map(|id| id.0),
            })
            .send()
            .await?;
        Ok(checked(response).await?.json().await?)
    }

    async fn send_message(&self, channel_id: ChannelId, message: NewMessage) -> Result<Message> {
        let mut attachment_ids = Vec::with_capacity(message.attachments.len());
        for upload in message.attachments {
            let filename = upload.filename.clone();
            let id = self
                .upload_attachment(channel_id, upload)
                .await
                .with_context(|| format!("failed to upload {filename}"))?;
            attachment_ids.push(id);
        }

        let body = SendMessageBody {
            content: message.content,
            nonce: message.nonce,
            message_reference: message.message_reference,
            ping_replied_user: message.ping_replied_user,
            attachment_ids,
        };
        let response = self
            .request(Method::POST, &format!("/channels/{channel_id}/messages"))
            .json(&body)
            .send()
            .await?;
        Ok(checked(response).await?.json().await?)
    }

    async fn ack_read(&self, channel_id: ChannelId, message_id: MessageId) -> Result<()> {
        let response = self
            .request(
                Method::POST,
                &format!("/channels/{channel_id}/messages/{message_id}/ack"),
            )
            .send()
            .await?;
        checked(response).await?;
        Ok(())
    }

    async fn trigger_typing(&self, channel_id: ChannelId) -> Result<()> {
        let response = self
            .request(Method::POST, &format!("/channels/{channel_id}/typing"))
            .send()
            .await?;
        checked(response).await?;
        Ok(())
    }

    async fn fetch_guild_detail(&self, guild_id: GuildId) -> Result<GuildDetail> {
        let response = self
            .request(Method::GET, &format!("/guilds/{guild_id}"))
            .send()
            .await?;
        Ok(checked(response).await?.json().await?)
    }

    async fn fetch_message_detail(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<MessageDetail> {
        let response = self
            .request(
                Method::GET,
                &format!("/channels/{channel_id}/messages/{message_id}/detail"),
            )
            .send()
            .await?;
        Ok(checked(response).await?.json().await?)
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
