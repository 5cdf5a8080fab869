#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("media permission denied: {0}")]
    AccessDenied(String),
    #[error("media device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("peer session is closed")]
    SessionClosed,
    #[error("invalid session description: {0}")]
    InvalidDescription(String),
    #[error("malformed candidate: {0}")]
    MalformedCandidate(String),
    #[error("codec error: {0}")]
    Codec(String),
}

impl MediaError {
    /// Permission and device failures, as opposed to negotiation faults.
    pub fn is_access_error(&self) -> bool {
        matches!(self, Self::AccessDenied(_) | Self::DeviceUnavailable(_))
    }
}

impl From<serde_json::Error> for MediaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}
