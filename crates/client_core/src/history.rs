//! Backward pagination state for one channel.
//!
//! The fetcher itself performs no I/O: a session asks it for a ticket before
//! issuing the request and hands the result back with that ticket. A result
//! whose ticket is no longer current is discarded, which is how superseded and
//! cancelled fetches are kept from touching the message set.

use shared::{domain::MessageId, protocol::Message};
use tracing::debug;

use crate::{error::SyncError, message_set::MessageSet};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FetchState {
    #[default]
    Idle,
    Fetching {
        before: Option<MessageId>,
    },
    Failed {
        before: Option<MessageId>,
        error: SyncError,
    },
    Cancelled,
}

impl FetchState {
    pub fn is_fetching(&self) -> bool {
        matches!(self, FetchState::Fetching { .. })
    }

    pub fn error(&self) -> Option<&SyncError> {
        match self {
            FetchState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    pub before: Option<MessageId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied {
        inserted: Vec<MessageId>,
        reached_top: bool,
    },
    Failed(SyncError),
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct HistoryFetcher {
    state: FetchState,
    reached_top: bool,
    generation: u64,
    page_size: u32,
}

impl Default for HistoryFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl HistoryFetcher {
    pub fn new(page_size: u32) -> Self {
        Self {
            state: FetchState::Idle,
            reached_top: false,
            generation: 0,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn state(&self) -> &FetchState {
        &self.state
    }

    pub fn reached_top(&self) -> bool {
        self.reached_top
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Cursor of the last failed fetch, for retrying with the same anchor.
    pub fn retry_cursor(&self) -> Option<Option<MessageId>> {
        match &self.state {
            FetchState::Failed { before, .. } => Some(*before),
            _ => None,
        }
    }

    /// Start a fetch, invalidating any fetch still in flight.
    pub fn begin(&mut self, before: Option<MessageId>) -> FetchTicket {
        if self.state.is_fetching() {
            debug!(?before, "superseding in-flight history fetch");
        }
        self.generation += 1;
        self.state = FetchState::Fetching { before };
        FetchTicket {
            generation: self.generation,
            before,
        }
    }

    pub fn cancel(&mut self) {
        self.generation += 1;
        if self.state.is_fetching() {
            self.state = FetchState::Cancelled;
        }
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.generation && self.state.is_fetching()
    }

    /// Apply the result of the fetch identified by `ticket`.
    pub fn complete(
        &mut self,
        ticket: FetchTicket,
        result: anyhow::Result<Vec<Message>>,
        messages: &mut MessageSet,
    ) -> FetchOutcome {
        if !self.is_current(&ticket) {
            debug!(before = ?ticket.before, "discarding result of stale history fetch");
            return FetchOutcome::Cancelled;
        }

        match result {
            Ok(page) => {
                let reached_top = page.len() < self.page_size as usize;
                let inserted = messages.merge_page(page);
                self.reached_top = reached_top;
                self.state = FetchState::Idle;
                FetchOutcome::Applied {
                    inserted,
                    reached_top,
                }
            }
            Err(err) => {
                let error = SyncError::network(&err);
                self.state = FetchState::Failed {
                    before: ticket.before,
                    error: error.clone(),
                };
                FetchOutcome::Failed(error)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/history_tests.rs"]
mod tests;
