use std::sync::Arc;

use callwire_media::{
    IceCandidate, LocalMedia, MediaTransport, PeerSession, PeerSessionConfig, SessionDescription,
    TrackKind,
};

use super::candidate_buffer::CandidateBuffer;
use crate::error::CallError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AnswerOutcome {
    Committed { drained: usize },
    AlreadyCommitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum CandidateOutcome {
    Applied,
    Buffered,
}

/// Owns the peer session for the live call and its candidate buffer.
///
/// All methods run on the actor thread; the session's hooks are wired by the
/// caller right after `create_session`.
pub(super) struct NegotiationEngine {
    transport: Arc<dyn MediaTransport>,
    config: PeerSessionConfig,
    session: Option<Arc<dyn PeerSession>>,
    local_media: Option<LocalMedia>,
    buffer: CandidateBuffer,
    remote_committed: bool,
}

impl NegotiationEngine {
    pub(super) fn new(transport: Arc<dyn MediaTransport>, config: PeerSessionConfig) -> Self {
        Self {
            transport,
            config,
            session: None,
            local_media: None,
            buffer: CandidateBuffer::default(),
            remote_committed: false,
        }
    }

    #[cfg(test)]
    pub(super) fn session(&self) -> Option<&Arc<dyn PeerSession>> {
        self.session.as_ref()
    }

    pub(super) fn session_id(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.id())
    }

    pub(super) fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Replace any prior session with a fresh one.
    ///
    /// Candidates buffered before the session existed are kept: they belong to
    /// the same call and become applicable once the remote description lands.
    pub(super) fn create_session(&mut self) -> Result<Arc<dyn PeerSession>, CallError> {
        self.close_session();
        let session = self
            .transport
            .create_peer_session(&self.config)
            .map_err(CallError::Transport)?;
        tracing::debug!(session_id = session.id(), "peer session created");
        self.session = Some(session.clone());
        Ok(session)
    }

    pub(super) fn attach_local_media(&mut self, media: LocalMedia) -> Result<(), CallError> {
        let Some(session) = self.session.as_ref() else {
            media.stop();
            return Err(CallError::NoSession);
        };
        if let Err(e) = session.add_local_media(&media) {
            media.stop();
            return Err(CallError::Transport(e));
        }
        if let Some(prev) = self.local_media.replace(media) {
            prev.stop();
        }
        Ok(())
    }

    pub(super) fn set_track_enabled(&self, kind: TrackKind, enabled: bool) -> bool {
        self.local_media
            .as_ref()
            .map(|m| m.set_enabled(kind, enabled))
            .unwrap_or(false)
    }

    /// Generate and locally commit an offer; returns its wire payload.
    pub(super) fn make_offer(&mut self) -> Result<String, CallError> {
        let session = self.session.clone().ok_or(CallError::NoSession)?;
        let offer = session.create_offer()?;
        session.set_local_description(offer.clone())?;
        Ok(offer.to_json()?)
    }

    /// Commit the remote offer, drain buffered candidates, then generate and
    /// locally commit an answer; returns its wire payload.
    pub(super) fn make_answer(&mut self, offer_payload: &str) -> Result<String, CallError> {
        let session = self.session.clone().ok_or(CallError::NoSession)?;
        let offer = SessionDescription::from_json(offer_payload).map_err(CallError::Transport)?;
        session.set_remote_description(offer)?;
        self.remote_committed = true;
        self.drain_buffered();
        let answer = session.create_answer()?;
        session.set_local_description(answer.clone())?;
        Ok(answer.to_json()?)
    }

    /// Commit the remote answer once. Later calls are no-ops.
    pub(super) fn apply_answer(&mut self, answer_payload: &str) -> Result<AnswerOutcome, CallError> {
        let session = self.session.clone().ok_or(CallError::NoSession)?;
        if self.remote_committed || session.remote_description().is_some() {
            return Ok(AnswerOutcome::AlreadyCommitted);
        }
        let answer = SessionDescription::from_json(answer_payload).map_err(CallError::Transport)?;
        session.set_remote_description(answer)?;
        self.remote_committed = true;
        let drained = self.drain_buffered();
        Ok(AnswerOutcome::Committed { drained })
    }

    /// Apply a remote candidate now if the remote description is committed,
    /// otherwise buffer it.
    pub(super) fn apply_candidate(
        &mut self,
        candidate_payload: &str,
    ) -> Result<CandidateOutcome, CallError> {
        let candidate = IceCandidate::from_json(candidate_payload)?;
        match self.session.as_ref() {
            Some(session) if self.remote_committed => {
                session.add_ice_candidate(candidate)?;
                Ok(CandidateOutcome::Applied)
            }
            _ => {
                self.buffer.push(candidate);
                Ok(CandidateOutcome::Buffered)
            }
        }
    }

    /// Apply every buffered candidate in arrival order and clear the buffer.
    pub(super) fn drain_buffered(&mut self) -> usize {
        let Some(session) = self.session.clone() else {
            return 0;
        };
        let pending = self.buffer.drain();
        let count = pending.len();
        for candidate in pending {
            if let Err(e) = session.add_ice_candidate(candidate) {
                tracing::warn!(%e, "buffered candidate rejected");
            }
        }
        count
    }

    fn close_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.close();
        }
        if let Some(media) = self.local_media.take() {
            media.stop();
        }
        self.remote_committed = false;
    }

    /// Release media, close the session, drop buffered candidates. Idempotent.
    pub(super) fn teardown(&mut self) {
        self.close_session();
        self.buffer.clear();
    }
}
