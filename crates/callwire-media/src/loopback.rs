use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::PeerSessionConfig;
use crate::description::{IceCandidate, SdpType, SessionDescription};
use crate::error::MediaError;
use crate::session::{
    CandidateHook, ConnectionState, ConnectionStateHook, MediaTransport, PeerSession,
    RemoteTrackHook,
};
use crate::tracks::{LocalMedia, LocalTrack, MediaKind, RemoteTrack, TrackKind};

const BASE_PORT: u32 = 50_000;
const CANDIDATES_PER_DESCRIPTION: usize = 2;

#[derive(Debug)]
struct LoopbackState {
    denied: HashSet<TrackKind>,
    next_session_id: u64,
    next_track_id: u64,
    sessions: Vec<Arc<LoopbackSession>>,
    acquired: Vec<LocalMedia>,
}

/// In-process media transport.
///
/// Produces well-formed descriptions and host candidates without touching any
/// device or socket, and records everything a session was asked to do.
#[derive(Debug, Clone)]
pub struct LoopbackMedia {
    state: Arc<Mutex<LoopbackState>>,
}

impl Default for LoopbackMedia {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackMedia {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(LoopbackState {
                denied: HashSet::new(),
                next_session_id: 1,
                next_track_id: 1,
                sessions: Vec::new(),
                acquired: Vec::new(),
            })),
        }
    }

    /// Make acquisition of `kind` fail as if the user refused the prompt.
    pub fn deny(&self, kind: TrackKind) {
        self.state.lock().denied.insert(kind);
    }

    pub fn sessions(&self) -> Vec<Arc<LoopbackSession>> {
        self.state.lock().sessions.clone()
    }

    pub fn latest_session(&self) -> Option<Arc<LoopbackSession>> {
        self.state.lock().sessions.last().cloned()
    }

    pub fn acquired_media(&self) -> Vec<LocalMedia> {
        self.state.lock().acquired.clone()
    }
}

impl MediaTransport for LoopbackMedia {
    fn acquire_local_media(&self, kind: MediaKind) -> Result<LocalMedia, MediaError> {
        let mut state = self.state.lock();
        if let Some(denied) = kind
            .track_kinds()
            .iter()
            .find(|k| state.denied.contains(*k))
        {
            return Err(MediaError::AccessDenied(format!(
                "{} capture not permitted",
                denied.as_str()
            )));
        }
        let mut tracks = Vec::new();
        for track_kind in kind.track_kinds() {
            let id = format!("local-{}-{}", track_kind.as_str(), state.next_track_id);
            state.next_track_id += 1;
            tracks.push(LocalTrack::new(id, *track_kind));
        }
        let media = LocalMedia::new(tracks);
        state.acquired.push(media.clone());
        Ok(media)
    }

    fn create_peer_session(
        &self,
        config: &PeerSessionConfig,
    ) -> Result<Arc<dyn PeerSession>, MediaError> {
        let mut state = self.state.lock();
        let id = state.next_session_id;
        state.next_session_id += 1;
        let session = Arc::new(LoopbackSession::new(id, config.clone()));
        state.sessions.push(session.clone());
        tracing::debug!(session_id = id, "loopback session created");
        Ok(session)
    }
}

#[derive(Default)]
struct SessionInner {
    local_media: Vec<LocalMedia>,
    local: Option<SessionDescription>,
    remote: Option<SessionDescription>,
    remote_commits: usize,
    applied: Vec<IceCandidate>,
    emitted: usize,
    connection: Option<ConnectionState>,
    closed: bool,
    candidate_hooks: Vec<CandidateHook>,
    track_hooks: Vec<RemoteTrackHook>,
    state_hooks: Vec<ConnectionStateHook>,
}

impl SessionInner {
    fn connection(&self) -> ConnectionState {
        self.connection.unwrap_or(ConnectionState::New)
    }

    fn local_kinds(&self) -> HashSet<TrackKind> {
        self.local_media
            .iter()
            .flat_map(|m| m.kinds())
            .collect()
    }

    // Returns the new state when it changed.
    fn advance(&mut self) -> Option<ConnectionState> {
        let next = match (self.local.is_some(), self.remote.is_some()) {
            (true, true) if !self.applied.is_empty() => ConnectionState::Connected,
            (true, true) => ConnectionState::Connecting,
            _ => return None,
        };
        if self.connection() == next || self.connection() == ConnectionState::Connected {
            return None;
        }
        self.connection = Some(next);
        Some(next)
    }
}

pub struct LoopbackSession {
    id: u64,
    config: PeerSessionConfig,
    inner: Mutex<SessionInner>,
}

impl std::fmt::Debug for LoopbackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackSession")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl LoopbackSession {
    fn new(id: u64, config: PeerSessionConfig) -> Self {
        Self {
            id,
            config,
            inner: Mutex::new(SessionInner::default()),
        }
    }

    pub fn config(&self) -> &PeerSessionConfig {
        &self.config
    }

    pub fn local_description(&self) -> Option<SessionDescription> {
        self.inner.lock().local.clone()
    }

    /// Number of times a remote description was committed.
    pub fn remote_commit_count(&self) -> usize {
        self.inner.lock().remote_commits
    }

    /// Candidates applied so far, in application order.
    pub fn applied_candidates(&self) -> Vec<IceCandidate> {
        self.inner.lock().applied.clone()
    }

    pub fn local_media(&self) -> Vec<LocalMedia> {
        self.inner.lock().local_media.clone()
    }

    fn render_sdp(&self, media_sections: &[TrackKind], local: &HashSet<TrackKind>) -> String {
        let mut sdp = format!(
            "v=0\r\no=- {} 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n",
            self.id
        );
        for (mid, kind) in media_sections.iter().enumerate() {
            let payload = match kind {
                TrackKind::Audio => "111",
                TrackKind::Video => "96",
            };
            let direction = if local.contains(kind) {
                "sendrecv"
            } else {
                "recvonly"
            };
            sdp.push_str(&format!(
                "m={} 9 UDP/TLS/RTP/SAVPF {payload}\r\na=mid:{mid}\r\na={direction}\r\n",
                kind.as_str()
            ));
        }
        sdp
    }

    fn ensure_open(inner: &SessionInner) -> Result<(), MediaError> {
        if inner.closed {
            return Err(MediaError::SessionClosed);
        }
        Ok(())
    }

    fn notify_state(hooks: Vec<ConnectionStateHook>, changed: Option<ConnectionState>) {
        if let Some(state) = changed {
            for hook in &hooks {
                hook(state);
            }
        }
    }
}

impl PeerSession for LoopbackSession {
    fn id(&self) -> u64 {
        self.id
    }

    fn add_local_media(&self, media: &LocalMedia) -> Result<(), MediaError> {
        let mut inner = self.inner.lock();
        Self::ensure_open(&inner)?;
        inner.local_media.push(media.clone());
        Ok(())
    }

    fn create_offer(&self) -> Result<SessionDescription, MediaError> {
        let inner = self.inner.lock();
        Self::ensure_open(&inner)?;
        let local = inner.local_kinds();
        let mut sections = vec![TrackKind::Audio];
        if local.contains(&TrackKind::Video) {
            sections.push(TrackKind::Video);
        }
        Ok(SessionDescription::offer(self.render_sdp(&sections, &local)))
    }

    fn create_answer(&self) -> Result<SessionDescription, MediaError> {
        let inner = self.inner.lock();
        Self::ensure_open(&inner)?;
        let remote = match &inner.remote {
            Some(desc) if desc.sdp_type == SdpType::Offer => desc,
            _ => {
                return Err(MediaError::InvalidDescription(
                    "no remote offer to answer".to_string(),
                ));
            }
        };
        let sections: Vec<TrackKind> = remote
            .media_sections()
            .iter()
            .filter_map(|m| TrackKind::from_sdp_media(m))
            .collect();
        let local = inner.local_kinds();
        Ok(SessionDescription::answer(self.render_sdp(&sections, &local)))
    }

    fn set_local_description(&self, desc: SessionDescription) -> Result<(), MediaError> {
        let (candidates, hooks, state_hooks, changed) = {
            let mut inner = self.inner.lock();
            Self::ensure_open(&inner)?;
            inner.local = Some(desc);
            let mut candidates = Vec::with_capacity(CANDIDATES_PER_DESCRIPTION);
            for _ in 0..CANDIDATES_PER_DESCRIPTION {
                let n = inner.emitted as u32 + 1;
                inner.emitted += 1;
                let port = BASE_PORT + (self.id as u32 % 1000) * 10 + n;
                candidates.push(
                    IceCandidate::new(format!(
                        "candidate:{n} 1 udp 2130706431 127.0.0.1 {port} typ host"
                    ))
                    .with_sdp_mid("0")
                    .with_sdp_m_line_index(0),
                );
            }
            let changed = inner.advance();
            (
                candidates,
                inner.candidate_hooks.clone(),
                inner.state_hooks.clone(),
                changed,
            )
        };
        for candidate in candidates {
            for hook in &hooks {
                hook(candidate.clone());
            }
        }
        Self::notify_state(state_hooks, changed);
        Ok(())
    }

    fn set_remote_description(&self, desc: SessionDescription) -> Result<(), MediaError> {
        let (tracks, hooks, state_hooks, changed) = {
            let mut inner = self.inner.lock();
            Self::ensure_open(&inner)?;
            let kinds: Vec<TrackKind> = desc
                .media_sections()
                .iter()
                .filter_map(|m| TrackKind::from_sdp_media(m))
                .collect();
            if kinds.is_empty() {
                return Err(MediaError::InvalidDescription(
                    "description has no media sections".to_string(),
                ));
            }
            inner.remote = Some(desc);
            inner.remote_commits += 1;
            let tracks: Vec<RemoteTrack> = kinds
                .into_iter()
                .map(|kind| RemoteTrack {
                    id: format!("remote-{}-{}", self.id, kind.as_str()),
                    kind,
                })
                .collect();
            let changed = inner.advance();
            (
                tracks,
                inner.track_hooks.clone(),
                inner.state_hooks.clone(),
                changed,
            )
        };
        for track in tracks {
            for hook in &hooks {
                hook(track.clone());
            }
        }
        Self::notify_state(state_hooks, changed);
        Ok(())
    }

    fn remote_description(&self) -> Option<SessionDescription> {
        self.inner.lock().remote.clone()
    }

    fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), MediaError> {
        candidate.validate()?;
        let (state_hooks, changed) = {
            let mut inner = self.inner.lock();
            Self::ensure_open(&inner)?;
            if inner.remote.is_none() {
                return Err(MediaError::InvalidDescription(
                    "remote description not set".to_string(),
                ));
            }
            inner.applied.push(candidate);
            let changed = inner.advance();
            (inner.state_hooks.clone(), changed)
        };
        Self::notify_state(state_hooks, changed);
        Ok(())
    }

    fn on_local_candidate(&self, hook: CandidateHook) {
        self.inner.lock().candidate_hooks.push(hook);
    }

    fn on_remote_track(&self, hook: RemoteTrackHook) {
        self.inner.lock().track_hooks.push(hook);
    }

    fn on_connection_state_change(&self, hook: ConnectionStateHook) {
        self.inner.lock().state_hooks.push(hook);
    }

    fn connection_state(&self) -> ConnectionState {
        let inner = self.inner.lock();
        if inner.closed {
            ConnectionState::Closed
        } else {
            inner.connection()
        }
    }

    fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.closed {
            return;
        }
        inner.closed = true;
        inner.connection = Some(ConnectionState::Closed);
        inner.candidate_hooks.clear();
        inner.track_hooks.clear();
        inner.state_hooks.clear();
        tracing::debug!(session_id = self.id, "loopback session closed");
    }

    fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_candidates(session: &Arc<dyn PeerSession>) -> Arc<Mutex<Vec<IceCandidate>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        session.on_local_candidate(Arc::new(move |c: IceCandidate| sink.lock().push(c)));
        seen
    }

    #[test]
    fn denied_kind_fails_acquisition() {
        let media = LoopbackMedia::new();
        media.deny(TrackKind::Video);
        let err = media.acquire_local_media(MediaKind::Video).unwrap_err();
        assert!(err.is_access_error());
        let audio = media.acquire_local_media(MediaKind::Audio).unwrap();
        assert_eq!(audio.kinds(), vec![TrackKind::Audio]);
    }

    #[test]
    fn offer_answer_exchange_connects() {
        let media = LoopbackMedia::new();
        let cfg = PeerSessionConfig::default();

        let caller = media.create_peer_session(&cfg).unwrap();
        let callee = media.create_peer_session(&cfg).unwrap();
        let caller_cands = collect_candidates(&caller);
        let callee_cands = collect_candidates(&callee);

        let states = Arc::new(Mutex::new(Vec::new()));
        let sink = states.clone();
        caller.on_connection_state_change(Arc::new(move |s: ConnectionState| sink.lock().push(s)));

        caller
            .add_local_media(&media.acquire_local_media(MediaKind::Video).unwrap())
            .unwrap();
        let offer = caller.create_offer().unwrap();
        assert_eq!(offer.media_sections(), vec!["audio", "video"]);
        caller.set_local_description(offer.clone()).unwrap();
        assert_eq!(caller_cands.lock().len(), 2);

        callee.set_remote_description(offer).unwrap();
        let answer = callee.create_answer().unwrap();
        assert_eq!(answer.media_sections(), vec!["audio", "video"]);
        assert!(answer.sdp.contains("a=recvonly"));
        callee.set_local_description(answer.clone()).unwrap();

        caller.set_remote_description(answer).unwrap();
        for c in callee_cands.lock().clone() {
            caller.add_ice_candidate(c).unwrap();
        }
        assert_eq!(caller.connection_state(), ConnectionState::Connected);
        assert_eq!(
            *states.lock(),
            vec![ConnectionState::Connecting, ConnectionState::Connected]
        );
    }

    #[test]
    fn candidate_before_remote_description_is_rejected() {
        let media = LoopbackMedia::new();
        let session = media.create_peer_session(&PeerSessionConfig::default()).unwrap();
        let cand = IceCandidate::new("candidate:1 1 udp 1 10.0.0.1 9 typ host").with_sdp_mid("0");
        assert!(matches!(
            session.add_ice_candidate(cand),
            Err(MediaError::InvalidDescription(_))
        ));
    }

    #[test]
    fn answer_requires_remote_offer() {
        let media = LoopbackMedia::new();
        let session = media.create_peer_session(&PeerSessionConfig::default()).unwrap();
        assert!(session.create_answer().is_err());
    }

    #[test]
    fn closed_session_refuses_work() {
        let media = LoopbackMedia::new();
        let session = media.create_peer_session(&PeerSessionConfig::default()).unwrap();
        session.close();
        assert!(session.is_closed());
        assert_eq!(session.connection_state(), ConnectionState::Closed);
        assert_eq!(session.create_offer().unwrap_err(), MediaError::SessionClosed);
    }

    #[test]
    fn remote_tracks_follow_remote_sections() {
        let media = LoopbackMedia::new();
        let session = media.create_peer_session(&PeerSessionConfig::default()).unwrap();
        let tracks = Arc::new(Mutex::new(Vec::new()));
        let sink = tracks.clone();
        session.on_remote_track(Arc::new(move |t: RemoteTrack| sink.lock().push(t.kind)));
        session
            .set_remote_description(SessionDescription::offer(
                "v=0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\n",
            ))
            .unwrap();
        assert_eq!(*tracks.lock(), vec![TrackKind::Audio]);
        assert_eq!(media.latest_session().unwrap().remote_commit_count(), 1);
    }
}
