//! Channel-scoped sync state.
//!
//! A `ChannelSession` is opened when the user switches to a channel and closed
//! at the next switch. It owns the reconciled message set, the history
//! fetcher, the message hydration queue and compose state for that channel.
//! All mutation happens under one mutex; spawned network tasks only fetch and
//! then re-lock to apply. Every change publishes an immutable
//! [`TimelineSnapshot`].

use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    domain::{ChannelId, MessageId},
    protocol::{GatewayEvent, Message, MessageDetail},
};
use tokio::{
    sync::{watch, Mutex},
    task::{AbortHandle, JoinHandle},
    time::Instant,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    api::ChatApi,
    compose::{Draft, SendStatus},
    config::SyncSettings,
    error::SyncError,
    history::{FetchOutcome, FetchState, FetchTicket, HistoryFetcher},
    load_queue::{Hydrator, ProgressiveLoadQueue},
    message_set::MessageSet,
    timeline::{annotate, TimelineRow},
    typing::TypingThrottle,
};

/// Hydrates message details for one channel.
pub struct MessageDetailLoader {
    api: Arc<dyn ChatApi>,
    channel_id: ChannelId,
}

impl MessageDetailLoader {
    pub fn new(api: Arc<dyn ChatApi>, channel_id: ChannelId) -> Self {
        Self { api, channel_id }
    }
}

#[async_trait]
impl Hydrator for MessageDetailLoader {
    type Id = MessageId;
    type Detail = MessageDetail;

    async fn hydrate(&self, id: MessageId) -> anyhow::Result<MessageDetail> {
        self.api.fetch_message_detail(self.channel_id, id).await
    }
}

/// Immutable view of a channel published after every change.
#[derive(Debug, Clone)]
pub struct TimelineSnapshot {
    pub channel_id: ChannelId,
    /// Newest first.
    pub messages: Arc<[Message]>,
    pub fetch: FetchState,
    pub reached_top: bool,
    pub send: SendStatus,
    pub revision: u64,
}

impl TimelineSnapshot {
    fn empty(channel_id: ChannelId) -> Self {
        Self {
            channel_id,
            messages: Arc::from(Vec::new()),
            fetch: FetchState::Idle,
            reached_top: false,
            send: SendStatus::Idle,
            revision: 0,
        }
    }

    pub fn rows(&self) -> Vec<TimelineRow> {
        annotate(&self.messages, self.reached_top)
    }
}

struct SessionState {
    messages: MessageSet,
    history: HistoryFetcher,
    fetch_task: Option<AbortHandle>,
    send: SendStatus,
    last_acked: Option<MessageId>,
    typing: TypingThrottle,
    closed: bool,
    revision: u64,
}

pub struct ChannelSession {
    channel_id: ChannelId,
    api: Arc<dyn ChatApi>,
    hydrate_fetched_pages: bool,
    state: Mutex<SessionState>,
    snapshots: watch::Sender<Arc<TimelineSnapshot>>,
    hydration: Arc<ProgressiveLoadQueue<MessageDetailLoader>>,
}

impl ChannelSession {
    pub fn open(channel_id: ChannelId, api: Arc<dyn ChatApi>, settings: &SyncSettings) -> Arc<Self> {
        let hydration = ProgressiveLoadQueue::new(
            "messages",
            MessageDetailLoader::new(Arc::clone(&api), channel_id),
            settings.message_queue.to_config(),
        );
        let (snapshots, _) = watch::channel(Arc::new(TimelineSnapshot::empty(channel_id)));
        info!(channel_id = channel_id.0, "opened channel session");

        Arc::new(Self {
            channel_id,
            api,
            hydrate_fetched_pages: settings.hydrate_fetched_pages,
            state: Mutex::new(SessionState {
                messages: MessageSet::new(),
                history: HistoryFetcher::new(settings.page_size),
                fetch_task: None,
                send: SendStatus::Idle,
                last_acked: None,
                typing: TypingThrottle::new(settings.typing_interval()),
                closed: false,
                revision: 0,
            }),
            snapshots,
            hydration,
        })
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<TimelineSnapshot>> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> Arc<TimelineSnapshot> {
        Arc::clone(&self.snapshots.borrow())
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// Apply a realtime message event addressed to this channel.
    pub async fn apply_event(&self, event: &GatewayEvent) -> bool {
        if event.channel_id() != Some(self.channel_id) {
            return false;
        }
        let mut state = self.state.lock().await;
        if state.closed {
            return false;
        }

        let changed = match event {
            GatewayEvent::MessageCreate { message } => state.messages.apply_create(message.clone()),
            GatewayEvent::MessageUpdate { message } => state.messages.apply_update(message),
            GatewayEvent::MessageDelete { id, .. } => state.messages.apply_delete(*id),
            GatewayEvent::MessageDeleteBulk { ids, .. } => state.messages.apply_bulk_delete(ids) > 0,
            _ => false,
        };
        if changed {
            self.publish(&mut state);
        }
        changed
    }

    pub async fn message(&self, id: MessageId) -> Option<Message> {
        self.state.lock().await.messages.get(id).cloned()
    }

    pub async fn cached_message(&self, id: MessageId) -> Option<Message> {
        self.state.lock().await.messages.cached(id).cloned()
    }

    /// The message that `id` replies to, when it is known.
    pub async fn quoted_message(&self, id: MessageId) -> Option<Message> {
        let state = self.state.lock().await;
        let message = state.messages.get(id)?;
        state.messages.quoted(message).cloned()
    }

    /// Fetch the page before the oldest loaded message.
    pub async fn fetch_older(self: &Arc<Self>) -> JoinHandle<FetchOutcome> {
        let mut state = self.state.lock().await;
        let before = state.messages.oldest().map(|m| m.id);
        self.start_fetch(&mut state, before)
    }

    pub async fn fetch_older_before(self: &Arc<Self>, before: Option<MessageId>) -> JoinHandle<FetchOutcome> {
        let mut state = self.state.lock().await;
        self.start_fetch(&mut state, before)
    }

    /// Re-run the last failed fetch with the same cursor.
    pub async fn retry_fetch(self: &Arc<Self>) -> Option<JoinHandle<FetchOutcome>> {
        let mut state = self.state.lock().await;
        let before = state.history.retry_cursor()?;
        Some(self.start_fetch(&mut state, before))
    }

    pub async fn cancel_fetch(&self) {
        let mut state = self.state.lock().await;
        if let Some(task) = state.fetch_task.take() {
            task.abort();
        }
        state.history.cancel();
        debug!(channel_id = self.channel_id.0, "history fetch cancelled");
        self.publish(&mut state);
    }

    fn start_fetch(self: &Arc<Self>, state: &mut SessionState, before: Option<MessageId>) -> JoinHandle<FetchOutcome> {
        if state.closed {
            return tokio::spawn(async { FetchOutcome::Cancelled });
        }
        if let Some(task) = state.fetch_task.take() {
            task.abort();
        }

        let ticket = state.history.begin(before);
        let limit = state.history.page_size();
        self.publish(state);

        let session = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let result = session
                .api
                .fetch_history(session.channel_id, before, limit)
                .await;
            session.finish_fetch(ticket, result).await
        });
        state.fetch_task = Some(handle.abort_handle());
        handle
    }

    async fn finish_fetch(&self, ticket: FetchTicket, result: anyhow::Result<Vec<Message>>) -> FetchOutcome {
        let mut state = self.state.lock().await;
        if state.closed {
            debug!(channel_id = self.channel_id.0, "dropping history page of closed session");
            return FetchOutcome::Cancelled;
        }
        if let Err(err) = &result {
            if state.history.is_current(&ticket) {
                warn!(channel_id = self.channel_id.0, error = %err, "history fetch failed");
            }
        }

        let outcome = {
            let SessionState {
                history, messages, ..
            } = &mut *state;
            history.complete(ticket, result, messages)
        };
        if outcome == FetchOutcome::Cancelled {
            return outcome;
        }

        state.fetch_task = None;
        self.publish(&mut state);

        if let FetchOutcome::Applied { inserted, .. } = &outcome {
            if self.hydrate_fetched_pages && !inserted.is_empty() {
                self.hydration.enqueue_many(inserted.iter().copied()).await;
            }
        }
        outcome
    }

    pub fn hydration(&self) -> &Arc<ProgressiveLoadQueue<MessageDetailLoader>> {
        &self.hydration
    }

    /// Schedule detail hydration for a message that became visible.
    pub async fn enqueue_hydration(&self, id: MessageId) -> bool {
        let state = self.state.lock().await;
        if state.closed {
            return false;
        }
        self.hydration.enqueue(id).await
    }

    pub async fn is_hydrated(&self, id: MessageId) -> bool {
        self.hydration.is_hydrated(id).await
    }

    pub async fn message_detail(&self, id: MessageId) -> Option<MessageDetail> {
        self.hydration.detail(id).await
    }

    /// Send a draft. On failure the draft is kept in [`SendStatus::Failed`].
    pub async fn send(&self, draft: Draft) -> Result<Message, SyncError> {
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(SyncError::Closed);
            }
            if state.send.is_sending() {
                return Err(SyncError::SendFailure("another message is still being sent".into()));
            }
            if !draft.is_sendable() {
                return Err(SyncError::SendFailure("message is empty".into()));
            }
            state.send = SendStatus::Sending;
            self.publish(&mut state);
        }

        let request = draft.clone().into_new_message(Uuid::new_v4().to_string());
        let result = self.api.send_message(self.channel_id, request).await;

        let mut state = self.state.lock().await;
        if state.closed {
            return result.map_err(|err| SyncError::send(&err));
        }
        match result {
            Ok(message) => {
                state.messages.apply_create(message.clone());
                state.send = SendStatus::Idle;
                state.typing.reset();
                self.publish(&mut state);
                Ok(message)
            }
            Err(err) => {
                warn!(channel_id = self.channel_id.0, error = %err, "message send failed");
                let error = SyncError::send(&err);
                state.send = SendStatus::Failed {
                    draft,
                    error: error.clone(),
                };
                self.publish(&mut state);
                Err(error)
            }
        }
    }

    pub async fn retry_send(&self) -> Option<Result<Message, SyncError>> {
        let draft = self.take_failed_draft().await?;
        Some(self.send(draft).await)
    }

    /// Recover the draft of a failed send, returning the status to idle.
    pub async fn take_failed_draft(&self) -> Option<Draft> {
        let mut state = self.state.lock().await;
        match std::mem::take(&mut state.send) {
            SendStatus::Failed { draft, .. } => {
                self.publish(&mut state);
                Some(draft)
            }
            other => {
                state.send = other;
                None
            }
        }
    }

    /// Mark the newest loaded message as read. Returns whether an ack was sent.
    pub async fn ack_latest(&self) -> Result<bool, SyncError> {
        let newest = {
            let state = self.state.lock().await;
            if state.closed {
                return Err(SyncError::Closed);
            }
            let Some(newest) = state.messages.newest().map(|m| m.id) else {
                return Ok(false);
            };
            if state.last_acked.is_some_and(|acked| acked >= newest) {
                return Ok(false);
            }
            newest
        };

        self.api
            .ack_read(self.channel_id, newest)
            .await
            .map_err(|err| SyncError::network(&err))?;

        let mut state = self.state.lock().await;
        state.last_acked = state.last_acked.max(Some(newest));
        Ok(true)
    }

    /// Tell the service the user is typing, at most once per interval.
    pub async fn notify_composing(&self) -> bool {
        {
            let mut state = self.state.lock().await;
            if state.closed || !state.typing.should_send(Instant::now()) {
                return false;
            }
        }
        if let Err(err) = self.api.trigger_typing(self.channel_id).await {
            debug!(channel_id = self.channel_id.0, error = %err, "typing indicator failed");
        }
        true
    }

    /// Stop all background work. Late results are discarded.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }
        state.closed = true;
        if let Some(task) = state.fetch_task.take() {
            task.abort();
        }
        state.history.cancel();
        self.hydration.clear().await;
        self.publish(&mut state);
        info!(channel_id = self.channel_id.0, "closed channel session");
    }

    fn publish(&self, state: &mut SessionState) {
        state.revision += 1;
        let snapshot = TimelineSnapshot {
            channel_id: self.channel_id,
            messages: state.messages.messages().into(),
            fetch: state.history.state().clone(),
            reached_top: state.history.reached_top(),
            send: state.send.clone(),
            revision: state.revision,
        };
        self.snapshots.send_replace(Arc::new(snapshot));
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
