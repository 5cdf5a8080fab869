//! Error types for the signal channel

/// Errors raised by a [`SignalChannel`](crate::SignalChannel) implementation
#[derive(Debug, thiserror::Error)]
pub enum SignalChannelError {
    /// The channel id is not known to the store
    #[error("channel not found: {0}")]
    ChannelNotFound(String),
    /// The store refused or failed to persist a record
    #[error("channel write failed: {0}")]
    WriteFailed(String),
    /// The store failed to answer a query
    #[error("channel read failed: {0}")]
    ReadFailed(String),
    /// A record could not be interpreted
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    /// JSON encoding or decoding failed
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}
