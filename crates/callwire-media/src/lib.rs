//! Media seam for callwire calls.
//!
//! The call core never touches devices or peer connections directly. It talks
//! to a [`MediaTransport`] for capture and session creation and to a
//! [`PeerSession`] for negotiation. [`LoopbackMedia`] is the in-process
//! implementation used by tests and the demo binary.

#![forbid(unsafe_code)]

pub mod config;
pub mod description;
pub mod error;
pub mod loopback;
pub mod session;
pub mod tracks;

pub use config::{IceServer, PeerSessionConfig, DEFAULT_ICE_CANDIDATE_POOL_SIZE, DEFAULT_STUN_URLS};
pub use description::{IceCandidate, SdpType, SessionDescription};
pub use error::MediaError;
pub use loopback::{LoopbackMedia, LoopbackSession};
pub use session::{
    CandidateHook, ConnectionState, ConnectionStateHook, MediaTransport, PeerSession,
    RemoteTrackHook,
};
pub use tracks::{LocalMedia, LocalTrack, MediaKind, RemoteTrack, TrackKind};
