use callwire_media::{ConnectionState, IceCandidate, LocalMedia, MediaError, RemoteTrack};
use callwire_signal::{ChatSummary, RecordKind, SignalChannelError, SignalRecord};

use crate::state::AppState;
use crate::CallAction;

#[derive(Clone, Debug)]
pub enum AppUpdate {
    FullState(AppState),
}

impl AppUpdate {
    pub fn rev(&self) -> u64 {
        match self {
            AppUpdate::FullState(s) => s.rev,
        }
    }
}

#[derive(Debug)]
pub enum CoreMsg {
    Action(CallAction),
    Internal(Box<InternalEvent>),
}

/// Which negotiation step is waiting on local media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationStep {
    Offer,
    Answer,
}

#[derive(Debug)]
pub enum InternalEvent {
    // Inbound feeds
    SignalBatch {
        call_id: String,
        records: Vec<SignalRecord>,
    },
    ChatFeedUpdated {
        summaries: Vec<ChatSummary>,
    },

    // Async results
    LocalMediaReady {
        call_id: String,
        step: NegotiationStep,
        media: Option<LocalMedia>,
        error: Option<MediaError>,
    },
    PublishFailed {
        call_id: String,
        kind: RecordKind,
        error: SignalChannelError,
    },

    // Peer session hooks
    LocalCandidate {
        call_id: String,
        session_id: u64,
        candidate: IceCandidate,
    },
    RemoteTrack {
        call_id: String,
        session_id: u64,
        track: RemoteTrack,
    },
    ConnectionStateChanged {
        call_id: String,
        session_id: u64,
        state: ConnectionState,
    },

    // Timers
    ClockTick {
        call_id: String,
    },
    AutoRejectElapsed {
        call_id: String,
    },
}
