//! Realtime feed over the gateway websocket.

use anyhow::{bail, Context, Result};
use futures::StreamExt;
use shared::protocol::GatewayEvent;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, warn};
use url::Url;

const FEED_BUFFER: usize = 256;

/// Decode one text frame. Event types this client does not know are `None`.
pub fn decode_frame(text: &str) -> Result<Option<GatewayEvent>> {
    let value: serde_json::Value =
        serde_json::from_str(text).context("gateway frame is not valid json")?;
    let Some(kind) = value.get("type").and_then(|kind| kind.as_str()) else {
        bail!("gateway frame has no event type");
    };
    if !GatewayEvent::KINDS.iter().any(|known| *known == kind) {
        debug!(kind, "ignoring unknown gateway event");
        return Ok(None);
    }
    let event = serde_json::from_value::<GatewayEvent>(value)
        .context("gateway event payload does not match its type")?;
    Ok(Some(event))
}

/// Connect to the gateway and stream decoded events in arrival order.
/// The stream ends when the socket closes.
pub async fn connect_gateway(url: &str) -> Result<ReceiverStream<GatewayEvent>> {
    let parsed = Url::parse(url).with_context(|| format!("invalid gateway url: {url}"))?;
    if !matches!(parsed.scheme(), "ws" | "wss") {
        bail!("gateway_url must start with ws:// or wss://");
    }

    let (ws_stream, _) = connect_async(url)
        .await
        .with_context(|| format!("failed to connect websocket: {url}"))?;
    info!(url, "gateway connected");
    let (_, mut ws_reader) = ws_stream.split();

    let (tx, rx) = mpsc::channel(FEED_BUFFER);
    tokio::spawn(async move {
        while let Some(msg) = ws_reader.next().await {
            match msg {
                Ok(WsMessage::Text(text)) => match decode_frame(&text) {
                    Ok(Some(event)) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => warn!(error = %format!("{err:#}"), "skipping malformed gateway frame"),
                },
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "gateway receive failed");
                    break;
                }
            }
        }
        info!("gateway disconnected");
    });

    Ok(ReceiverStream::new(rx))
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
