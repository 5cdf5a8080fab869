#![allow(dead_code)]

mod helpers;

pub use helpers::*;

use std::sync::Arc;

use callwire_core::CallApp;
use callwire_media::{
    LocalMedia, LoopbackMedia, MediaError, MediaKind, MediaTransport, PeerSession,
    PeerSessionConfig,
};
use callwire_signal::{InMemorySignalChannel, PeerIdentity, RecordKind, SignalRecord};
use tempfile::TempDir;

pub const CHANNEL: &str = "chat";

pub fn alice() -> PeerIdentity {
    PeerIdentity::new("alice", "Alice")
}

pub fn bob() -> PeerIdentity {
    PeerIdentity::new("bob", "Bob")
}

/// One side of a call: the app plus the fakes it talks to.
pub struct Party {
    pub identity: PeerIdentity,
    pub app: Arc<CallApp>,
    pub media: LoopbackMedia,
    pub cues: RecordingCuePlayer,
    _dir: TempDir,
}

impl Party {
    pub fn start(identity: PeerIdentity, channel: &InMemorySignalChannel) -> Self {
        Self::start_with_config(identity, channel, None)
    }

    /// Spawn an app for `identity`, optionally writing `config` into its data dir
    /// first. The app is fed the identity's contact list from `channel`.
    pub fn start_with_config(
        identity: PeerIdentity,
        channel: &InMemorySignalChannel,
        config: Option<serde_json::Value>,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_str().unwrap().to_string();
        if let Some(v) = config {
            write_config(&data_dir, v);
        }
        let media = LoopbackMedia::new();
        Self::spawn(identity, channel, dir, media.clone(), Arc::new(media))
    }

    /// Spawn an app whose devices work but whose peer sessions never start.
    pub fn start_without_sessions(identity: PeerIdentity, channel: &InMemorySignalChannel) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let media = LoopbackMedia::new();
        Self::spawn(identity, channel, dir, media.clone(), Arc::new(NoSessions(media)))
    }

    fn spawn(
        identity: PeerIdentity,
        channel: &InMemorySignalChannel,
        dir: TempDir,
        media: LoopbackMedia,
        transport: Arc<dyn MediaTransport>,
    ) -> Self {
        let data_dir = dir.path().to_str().unwrap().to_string();
        let app = CallApp::new(data_dir, identity.clone(), Arc::new(channel.clone()), transport)
            .unwrap();
        let cues = RecordingCuePlayer::default();
        app.set_cue_player(Box::new(cues.clone()));
        app.attach_summary_feed(channel.watch_summaries(&identity.id));
        Self {
            identity,
            app,
            media,
            cues,
            _dir: dir,
        }
    }
}

/// Devices from the wrapped loopback, but every peer session fails to start.
struct NoSessions(LoopbackMedia);

impl MediaTransport for NoSessions {
    fn acquire_local_media(&self, kind: MediaKind) -> Result<LocalMedia, MediaError> {
        self.0.acquire_local_media(kind)
    }

    fn create_peer_session(
        &self,
        _config: &PeerSessionConfig,
    ) -> Result<Arc<dyn PeerSession>, MediaError> {
        Err(MediaError::DeviceUnavailable("no network interface".to_string()))
    }
}

pub fn open_chat(participants: Vec<PeerIdentity>) -> InMemorySignalChannel {
    let channel = InMemorySignalChannel::new();
    channel.open_channel(CHANNEL, participants);
    channel
}

pub fn records_of(channel: &InMemorySignalChannel, kind: RecordKind) -> Vec<SignalRecord> {
    channel
        .records(CHANNEL)
        .into_iter()
        .filter(|r| r.kind == kind)
        .collect()
}

pub fn notes_from(channel: &InMemorySignalChannel, sender: &str) -> Vec<String> {
    channel
        .records(CHANNEL)
        .into_iter()
        .filter(|r| r.kind == RecordKind::TextNote && r.sender == sender)
        .map(|r| r.payload)
        .collect()
}
