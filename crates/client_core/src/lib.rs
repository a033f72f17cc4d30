//! Client-side synchronization core.
//!
//! Realtime gateway events and paginated REST history are reconciled into one
//! ordered message set per channel, and guild and message details are
//! hydrated in the background through throttled load queues.

pub mod api;
pub mod channel_list;
pub mod client;
pub mod compose;
pub mod config;
pub mod error;
pub mod gateway;
pub mod guild_list;
pub mod history;
pub mod http;
pub mod load_queue;
pub mod message_set;
pub mod session;
pub mod timeline;
pub mod typing;

pub use api::ChatApi;
pub use client::{ClientEvent, SyncClient};
pub use config::{load_settings, SyncSettings};
pub use error::SyncError;
pub use history::{FetchOutcome, FetchState, HistoryFetcher};
pub use load_queue::{Hydrator, LoadQueueConfig, ProgressiveLoadQueue};
pub use message_set::MessageSet;
pub use session::{ChannelSession, TimelineSnapshot};

#[cfg(test)]
#[path = "tests/support.rs"]
mod tests_support;
