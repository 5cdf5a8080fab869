use callwire_media::MediaError;
use callwire_signal::SignalChannelError;

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// Permission denied or device unavailable. The call proceeds degraded.
    #[error("could not access camera or microphone: {0}")]
    MediaAccess(#[source] MediaError),
    /// Answer attempted with no answerable offer on the channel.
    #[error("no offer found in the latest {lookback} records")]
    NoOfferFound { lookback: usize },
    #[error("malformed candidate: {0}")]
    MalformedCandidate(String),
    #[error("could not publish {kind}: {source}")]
    ChannelWriteFailure {
        kind: String,
        #[source]
        source: SignalChannelError,
    },
    #[error("could not read signal channel: {0}")]
    ChannelRead(#[source] SignalChannelError),
    #[error("no active peer session")]
    NoSession,
    #[error("media transport error: {0}")]
    Transport(#[source] MediaError),
    #[error("failed to start call runtime: {0}")]
    Startup(#[from] std::io::Error),
}

impl From<MediaError> for CallError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::MalformedCandidate(msg) => Self::MalformedCandidate(msg),
            e if e.is_access_error() => Self::MediaAccess(e),
            e => Self::Transport(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_errors_map_onto_call_taxonomy() {
        let e: CallError = MediaError::AccessDenied("mic".into()).into();
        assert!(matches!(e, CallError::MediaAccess(_)));

        let e: CallError = MediaError::MalformedCandidate("x".into()).into();
        assert!(matches!(e, CallError::MalformedCandidate(_)));

        let e: CallError = MediaError::SessionClosed.into();
        assert!(matches!(e, CallError::Transport(_)));
    }

    #[test]
    fn no_offer_message_names_the_lookback() {
        let e = CallError::NoOfferFound { lookback: 30 };
        assert_eq!(e.to_string(), "no offer found in the latest 30 records");
    }
}
