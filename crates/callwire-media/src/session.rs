use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::config::PeerSessionConfig;
use crate::description::{IceCandidate, SessionDescription};
use crate::error::MediaError;
use crate::tracks::{LocalMedia, MediaKind, RemoteTrack};

pub type CandidateHook = Arc<dyn Fn(IceCandidate) + Send + Sync>;
pub type RemoteTrackHook = Arc<dyn Fn(RemoteTrack) + Send + Sync>;
pub type ConnectionStateHook = Arc<dyn Fn(ConnectionState) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Local capture devices and the factory for peer sessions.
///
/// `acquire_local_media` may block on a permission prompt; callers keep it off
/// any thread that must stay responsive.
pub trait MediaTransport: Send + Sync {
    fn acquire_local_media(&self, kind: MediaKind) -> Result<LocalMedia, MediaError>;

    fn create_peer_session(
        &self,
        config: &PeerSessionConfig,
    ) -> Result<Arc<dyn PeerSession>, MediaError>;
}

/// One point-to-point media negotiation.
///
/// Hooks registered with the `on_*` methods may be invoked from whichever
/// thread drives the session, including synchronously from within
/// `set_local_description` or `add_ice_candidate`. Implementations never hold
/// internal locks while calling a hook.
pub trait PeerSession: Send + Sync {
    fn id(&self) -> u64;

    fn add_local_media(&self, media: &LocalMedia) -> Result<(), MediaError>;

    fn create_offer(&self) -> Result<SessionDescription, MediaError>;

    /// Fails unless a remote offer has been applied.
    fn create_answer(&self) -> Result<SessionDescription, MediaError>;

    fn set_local_description(&self, desc: SessionDescription) -> Result<(), MediaError>;

    fn set_remote_description(&self, desc: SessionDescription) -> Result<(), MediaError>;

    fn remote_description(&self) -> Option<SessionDescription>;

    /// Fails if no remote description is set yet.
    fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), MediaError>;

    fn on_local_candidate(&self, hook: CandidateHook);

    fn on_remote_track(&self, hook: RemoteTrackHook);

    fn on_connection_state_change(&self, hook: ConnectionStateHook);

    fn connection_state(&self) -> ConnectionState;

    fn close(&self);

    fn is_closed(&self) -> bool;
}
