use callwire_media::{ConnectionState, MediaKind, TrackKind};
use callwire_signal::PeerIdentity;

#[derive(Clone, Debug, PartialEq)]
pub struct AppState {
    pub rev: u64,
    pub local_identity: PeerIdentity,
    pub active_call: Option<CallState>,
    pub toast: Option<String>,
}

impl AppState {
    pub fn empty(local_identity: PeerIdentity) -> Self {
        Self {
            rev: 0,
            local_identity,
            active_call: None,
            toast: None,
        }
    }

    /// Status of the current call, `Idle` when there is none.
    pub fn call_status(&self) -> CallStatus {
        self.active_call
            .as_ref()
            .map(|c| c.status.clone())
            .unwrap_or(CallStatus::Idle)
    }

    pub fn has_live_call(&self) -> bool {
        self.active_call
            .as_ref()
            .map(|c| c.status.is_live())
            .unwrap_or(false)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallStatus {
    Idle,
    Outgoing,
    Incoming,
    Connected,
    Ended { reason: String },
}

impl CallStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Outgoing | Self::Incoming | Self::Connected)
    }

    pub fn is_ended(&self) -> bool {
        matches!(self, Self::Ended { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallDirection {
    Outgoing,
    Incoming,
}

/// Local audio cue played while a call is being set up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallCue {
    DialTone,
    RingTone,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CallState {
    pub call_id: String,
    pub channel_id: String,
    pub peer: PeerIdentity,
    pub direction: CallDirection,
    pub status: CallStatus,
    pub media_kind: MediaKind,
    /// Wall-clock milliseconds, set once when the call enters Outgoing or Incoming.
    pub started_at_ms: i64,
    pub connected_at_ms: Option<i64>,
    pub connected_secs: u64,
    pub is_muted: bool,
    pub is_camera_enabled: bool,
    pub cue: Option<CallCue>,
    pub remote_tracks: Vec<TrackKind>,
    pub connection_state: Option<ConnectionState>,
    pub last_error: Option<String>,
}

impl CallState {
    pub fn new(
        call_id: String,
        channel_id: String,
        peer: PeerIdentity,
        direction: CallDirection,
        media_kind: MediaKind,
        started_at_ms: i64,
    ) -> Self {
        let status = match direction {
            CallDirection::Outgoing => CallStatus::Outgoing,
            CallDirection::Incoming => CallStatus::Incoming,
        };
        Self {
            call_id,
            channel_id,
            peer,
            direction,
            status,
            media_kind,
            started_at_ms,
            connected_at_ms: None,
            connected_secs: 0,
            is_muted: false,
            is_camera_enabled: media_kind.wants_video(),
            cue: None,
            remote_tracks: vec![],
            connection_state: None,
            last_error: None,
        }
    }

    pub fn is_video_call(&self) -> bool {
        self.media_kind.wants_video()
    }
}
