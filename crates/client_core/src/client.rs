//! Root sync object: routes gateway events and owns cross-channel state.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use futures::{pin_mut, Stream, StreamExt};
use shared::{
    domain::{ChannelId, GuildId},
    protocol::{GatewayEvent, GuildDetail, GuildSummary},
};
use tokio::{
    sync::{broadcast, Mutex},
    time::Instant,
};
use tracing::{debug, info};

use crate::{
    api::ChatApi,
    config::SyncSettings,
    load_queue::{Hydrator, ProgressiveLoadQueue},
    session::ChannelSession,
    typing::{TypingSummary, TypingTracker},
};

/// Hydrates guild details.
pub struct GuildDetailLoader {
    api: Arc<dyn ChatApi>,
}

#[async_trait]
impl Hydrator for GuildDetailLoader {
    type Id = GuildId;
    type Detail = GuildDetail;

    async fn hydrate(&self, id: GuildId) -> anyhow::Result<GuildDetail> {
        self.api.fetch_guild_detail(id).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    ChannelOpened { channel_id: ChannelId },
    ChannelClosed { channel_id: ChannelId },
    GuildsUpdated,
    TypingUpdated { channel_id: ChannelId },
}

struct ClientState {
    current: Option<Arc<ChannelSession>>,
    guilds: BTreeMap<GuildId, GuildSummary>,
    typing: TypingTracker,
}

pub struct SyncClient {
    api: Arc<dyn ChatApi>,
    settings: SyncSettings,
    guild_details: Arc<ProgressiveLoadQueue<GuildDetailLoader>>,
    inner: Mutex<ClientState>,
    events: broadcast::Sender<ClientEvent>,
}

impl SyncClient {
    pub fn new(api: Arc<dyn ChatApi>, settings: SyncSettings) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        let guild_details = ProgressiveLoadQueue::new(
            "guilds",
            GuildDetailLoader {
                api: Arc::clone(&api),
            },
            settings.guild_queue.to_config(),
        );
        Arc::new(Self {
            api,
            guild_details,
            inner: Mutex::new(ClientState {
                current: None,
                guilds: BTreeMap::new(),
                typing: TypingTracker::new(settings.typing_expiry()),
            }),
            settings,
            events,
        })
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Close the current channel session and open one for `channel_id`,
    /// starting its first history fetch.
    pub async fn switch_channel(&self, channel_id: ChannelId) -> Arc<ChannelSession> {
        let mut inner = self.inner.lock().await;
        if let Some(current) = &inner.current {
            if current.channel_id() == channel_id {
                return Arc::clone(current);
            }
        }
        if let Some(previous) = inner.current.take() {
            previous.close().await;
            let _ = self.events.send(ClientEvent::ChannelClosed {
                channel_id: previous.channel_id(),
            });
        }

        let session = ChannelSession::open(channel_id, Arc::clone(&self.api), &self.settings);
        inner.current = Some(Arc::clone(&session));
        drop(inner);

        // The first page lands through the snapshot channel.
        let _ = session.fetch_older().await;
        let _ = self.events.send(ClientEvent::ChannelOpened { channel_id });
        session
    }

    pub async fn current_session(&self) -> Option<Arc<ChannelSession>> {
        self.inner.lock().await.current.clone()
    }

    pub async fn close_channel(&self) {
        let previous = self.inner.lock().await.current.take();
        if let Some(previous) = previous {
            previous.close().await;
            let _ = self.events.send(ClientEvent::ChannelClosed {
                channel_id: previous.channel_id(),
            });
        }
    }

    /// Drop every piece of sync state, as on logout.
    pub async fn reset(&self) {
        self.close_channel().await;
        self.guild_details.clear().await;
        let mut inner = self.inner.lock().await;
        inner.guilds.clear();
        inner.typing.clear();
        info!("sync state reset");
    }

    /// Consume a gateway feed strictly in delivery order.
    pub async fn run<S>(&self, feed: S)
    where
        S: Stream<Item = GatewayEvent>,
    {
        pin_mut!(feed);
        while let Some(event) = feed.next().await {
            self.handle_event(event).await;
        }
        info!("gateway feed ended");
    }

    pub async fn handle_event(&self, event: GatewayEvent) {
        match &event {
            GatewayEvent::MessageCreate { message } => {
                if message.webhook_id.is_none() {
                    let stopped = self
                        .inner
                        .lock()
                        .await
                        .typing
                        .stop(message.channel_id, message.author.id);
                    if stopped {
                        let _ = self.events.send(ClientEvent::TypingUpdated {
                            channel_id: message.channel_id,
                        });
                    }
                }
                self.route(&event).await;
            }
            GatewayEvent::MessageUpdate { .. }
            | GatewayEvent::MessageDelete { .. }
            | GatewayEvent::MessageDeleteBulk { .. } => self.route(&event).await,
            GatewayEvent::TypingStart {
                channel_id,
                user_id,
                display_name,
            } => {
                let name = display_name.clone().unwrap_or_else(|| user_id.to_string());
                let now = Instant::now();
                let lapsed = {
                    let mut inner = self.inner.lock().await;
                    let lapsed = inner.typing.prune(now);
                    inner.typing.start(*channel_id, *user_id, &name, now);
                    lapsed
                };
                for lapsed_channel in lapsed.into_iter().filter(|id| id != channel_id) {
                    let _ = self.events.send(ClientEvent::TypingUpdated {
                        channel_id: lapsed_channel,
                    });
                }
                let _ = self.events.send(ClientEvent::TypingUpdated {
                    channel_id: *channel_id,
                });
            }
            GatewayEvent::GuildCreate { guild } | GatewayEvent::GuildUpdate { guild } => {
                self.inner
                    .lock()
                    .await
                    .guilds
                    .insert(guild.id, guild.clone());
                self.guild_details.enqueue(guild.id).await;
                let _ = self.events.send(ClientEvent::GuildsUpdated);
            }
            GatewayEvent::GuildDelete { guild_id } => {
                let removed = self.inner.lock().await.guilds.remove(guild_id).is_some();
                if removed {
                    let _ = self.events.send(ClientEvent::GuildsUpdated);
                }
            }
        }
    }

    async fn route(&self, event: &GatewayEvent) {
        let Some(session) = self.current_session().await else {
            return;
        };
        if !session.apply_event(event).await {
            debug!(channel_id = ?event.channel_id(), "event not applied to current channel");
        }
    }

    pub async fn enqueue_guild(&self, guild_id: GuildId) -> bool {
        self.guild_details.enqueue(guild_id).await
    }

    pub async fn guild_detail(&self, guild_id: GuildId) -> Option<GuildDetail> {
        self.guild_details.detail(guild_id).await
    }

    pub async fn is_guild_hydrated(&self, guild_id: GuildId) -> bool {
        self.guild_details.is_hydrated(guild_id).await
    }

    pub fn guild_queue(&self) -> &Arc<ProgressiveLoadQueue<GuildDetailLoader>> {
        &self.guild_details
    }

    pub async fn guilds(&self) -> Vec<GuildSummary> {
        self.inner.lock().await.guilds.values().cloned().collect()
    }

    /// Who is typing in `channel_id`. Lapsed entries everywhere are dropped.
    pub async fn typing_summary(&self, channel_id: ChannelId) -> TypingSummary {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;
        inner.typing.prune(now);
        inner.typing.summary(channel_id, now)
    }
}

#[cfg(test)]
#[path = "tests/client_tests.rs"]
mod tests;
