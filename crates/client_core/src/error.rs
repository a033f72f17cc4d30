use thiserror::Error;

/// Failure states surfaced to the UI through snapshots.
///
/// Stale updates (events for messages outside the loaded window) are not
/// errors and never produce one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// A history fetch or another network round trip failed.
    #[error("network request failed: {0}")]
    TransientNetwork(String),
    /// Superseded or explicitly cancelled; never shown to the user.
    #[error("operation was cancelled")]
    Cancelled,
    /// The service rejected an outgoing message.
    #[error("message could not be sent: {0}")]
    SendFailure(String),
    /// The channel session was closed by a channel switch.
    #[error("channel session is closed")]
    Closed,
}

impl SyncError {
    pub fn network(err: &anyhow::Error) -> Self {
        Self::TransientNetwork(format!("{err:#}"))
    }

    pub fn send(err: &anyhow::Error) -> Self {
        Self::SendFailure(format!("{err:#}"))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientNetwork(_) | Self::SendFailure(_))
    }

    /// Whether the UI should surface this outcome at all.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::Closed)
    }
}
