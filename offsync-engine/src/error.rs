use thiserror::Error;

/// Error contract for caller-supplied fetch functions.
///
/// The variant decides what the coordinator does with a failed attempt:
/// `Cancelled` and `Fatal` stop the sync immediately, `Transient` consumes
/// one attempt from the retry budget.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The caller cancelled the request. Never retried.
    #[error("Request cancelled")]
    Cancelled,

    /// A failure worth retrying: network hiccup, timeout, overloaded server.
    #[error("Transient fetch failure: {0}")]
    Transient(String),

    /// A permanent failure retrying cannot fix.
    #[error("Fetch failed: {0}")]
    Fatal(String),
}

impl FetchError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    /// Whether the coordinator may spend a retry on this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Store error: {0}")]
    Store(#[from] offsync_store::StoreError),

    #[error("Delta payload serialization failed: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Remote fetch failed: {0}")]
    Fetch(#[source] FetchError),

    #[error("Sync gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: FetchError,
    },

    #[error("Invalid delta state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
