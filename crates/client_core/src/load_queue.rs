//! Throttled background hydration of per-entity details.
//!
//! Ids are queued as they become visible and drained in FIFO batches. Each
//! batch is hydrated concurrently, but never with more than
//! `max_concurrency` requests in flight. Drains are rate limited by
//! `min_interval` and chained with a `cooldown` while work remains, so a fast
//! scroll turns into steady batches instead of one request per row.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    fmt::Debug,
    hash::Hash,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use futures::{stream, StreamExt};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{sleep, Instant},
};
use tracing::debug;

/// Fetches the detail payload for one id.
#[async_trait]
pub trait Hydrator: Send + Sync + 'static {
    type Id: Copy + Eq + Hash + Debug + Send + Sync + 'static;
    type Detail: Clone + Send + Sync + 'static;

    async fn hydrate(&self, id: Self::Id) -> anyhow::Result<Self::Detail>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadQueueConfig {
    /// Ids taken from the front of the queue per drain.
    pub batch_size: usize,
    /// Hard cap on concurrent hydration calls.
    pub max_concurrency: usize,
    /// Minimum time between two drain starts.
    pub min_interval: Duration,
    /// Delay before the next drain when ids are still pending.
    pub cooldown: Duration,
}

impl LoadQueueConfig {
    pub const MESSAGES: Self = Self {
        batch_size: 20,
        max_concurrency: 5,
        min_interval: Duration::from_millis(100),
        cooldown: Duration::from_millis(50),
    };

    pub const GUILDS: Self = Self {
        batch_size: 10,
        max_concurrency: 3,
        min_interval: Duration::ZERO,
        cooldown: Duration::from_millis(100),
    };
}

struct QueueState<H: Hydrator> {
    pending: VecDeque<H::Id>,
    pending_set: HashSet<H::Id>,
    in_flight: HashSet<H::Id>,
    hydrated: HashMap<H::Id, H::Detail>,
    processing: bool,
    last_drain: Option<Instant>,
    generation: u64,
    drain_task: Option<JoinHandle<()>>,
    deferred: Option<JoinHandle<()>>,
}

impl<H: Hydrator> QueueState<H> {
    fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            pending_set: HashSet::new(),
            in_flight: HashSet::new(),
            hydrated: HashMap::new(),
            processing: false,
            last_drain: None,
            generation: 0,
            drain_task: None,
            deferred: None,
        }
    }

    fn is_known(&self, id: &H::Id) -> bool {
        self.hydrated.contains_key(id) || self.pending_set.contains(id) || self.in_flight.contains(id)
    }
}

pub struct ProgressiveLoadQueue<H: Hydrator> {
    label: &'static str,
    hydrator: Arc<H>,
    config: LoadQueueConfig,
    state: Mutex<QueueState<H>>,
}

impl<H: Hydrator> ProgressiveLoadQueue<H> {
    pub fn new(label: &'static str, hydrator: H, config: LoadQueueConfig) -> Arc<Self> {
        Arc::new(Self {
            label,
            hydrator: Arc::new(hydrator),
            config,
            state: Mutex::new(QueueState::new()),
        })
    }

    pub fn config(&self) -> LoadQueueConfig {
        self.config
    }

    /// Queue `id` unless it is already hydrated, pending or in flight.
    pub async fn enqueue(self: &Arc<Self>, id: H::Id) -> bool {
        let mut state = self.state.lock().await;
        if state.is_known(&id) {
            return false;
        }
        state.pending.push_back(id);
        state.pending_set.insert(id);
        self.try_drain(&mut state);
        true
    }

    /// Queue several ids with a single drain attempt. Returns how many were new.
    pub async fn enqueue_many(self: &Arc<Self>, ids: impl IntoIterator<Item = H::Id>) -> usize {
        let mut state = self.state.lock().await;
        let mut added = 0;
        for id in ids {
            if state.is_known(&id) {
                continue;
            }
            state.pending.push_back(id);
            state.pending_set.insert(id);
            added += 1;
        }
        if added > 0 {
            self.try_drain(&mut state);
        }
        added
    }

    pub async fn is_hydrated(&self, id: H::Id) -> bool {
        self.state.lock().await.hydrated.contains_key(&id)
    }

    pub async fn detail(&self, id: H::Id) -> Option<H::Detail> {
        self.state.lock().await.hydrated.get(&id).cloned()
    }

    pub async fn hydrated_ids(&self) -> HashSet<H::Id> {
        self.state.lock().await.hydrated.keys().copied().collect()
    }

    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn in_flight_len(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    /// No drain running, scheduled, or waiting on pending ids.
    pub async fn is_idle(&self) -> bool {
        let state = self.state.lock().await;
        !state.processing && state.pending.is_empty() && state.deferred.is_none()
    }

    /// Drop all queued and hydrated state. Results of a drain that is still
    /// running are discarded.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.generation += 1;
        if let Some(task) = state.drain_task.take() {
            task.abort();
        }
        if let Some(task) = state.deferred.take() {
            task.abort();
        }
        state.pending.clear();
        state.pending_set.clear();
        state.in_flight.clear();
        state.hydrated.clear();
        state.processing = false;
        state.last_drain = None;
        debug!(queue = self.label, "cleared hydration queue");
    }

    fn try_drain(self: &Arc<Self>, state: &mut QueueState<H>) {
        if state.processing || state.pending.is_empty() {
            return;
        }

        if let Some(last) = state.last_drain {
            let elapsed = last.elapsed();
            if elapsed < self.config.min_interval {
                self.defer(state, self.config.min_interval - elapsed);
                return;
            }
        }

        let take = self.config.batch_size.max(1).min(state.pending.len());
        let batch: Vec<H::Id> = state.pending.drain(..take).collect();
        for id in &batch {
            state.pending_set.remove(id);
            state.in_flight.insert(*id);
        }
        state.processing = true;
        state.last_drain = Some(Instant::now());

        debug!(
            queue = self.label,
            batch = batch.len(),
            remaining = state.pending.len(),
            "draining hydration batch"
        );

        let queue = Arc::clone(self);
        let generation = state.generation;
        state.drain_task = Some(tokio::spawn(async move {
            queue.run_batch(generation, batch).await;
        }));
    }

    fn defer(self: &Arc<Self>, state: &mut QueueState<H>, delay: Duration) {
        if state.deferred.is_some() {
            return;
        }
        debug!(queue = self.label, delay_ms = delay.as_millis() as u64, "deferring drain");
        let queue = Arc::clone(self);
        let generation = state.generation;
        state.deferred = Some(tokio::spawn(async move {
            sleep(delay).await;
            queue.resume(generation).await;
        }));
    }

    async fn resume(self: Arc<Self>, generation: u64) {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            return;
        }
        state.deferred = None;
        self.try_drain(&mut state);
    }

    async fn run_batch(self: Arc<Self>, generation: u64, batch: Vec<H::Id>) {
        let hydrator = Arc::clone(&self.hydrator);
        let results: Vec<(H::Id, anyhow::Result<H::Detail>)> = stream::iter(batch)
            .map(|id| {
                let hydrator = Arc::clone(&hydrator);
                async move { (id, hydrator.hydrate(id).await) }
            })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            debug!(queue = self.label, "discarding hydration results of cleared queue");
            return;
        }

        for (id, result) in results {
            state.in_flight.remove(&id);
            match result {
                Ok(detail) => {
                    state.hydrated.insert(id, detail);
                }
                Err(err) => {
                    debug!(queue = self.label, ?id, error = %err, "hydration failed");
                }
            }
        }
        state.processing = false;
        state.drain_task = None;

        if !state.pending.is_empty() {
            let cooldown = self.config.cooldown;
            self.defer(&mut state, cooldown);
        }
    }
}

#[cfg(test)]
#[path = "tests/load_queue_tests.rs"]
mod tests;
