use std::sync::Arc;

use callwire_media::{
    ConnectionState, IceCandidate, LocalMedia, MediaError, MediaKind, MediaTransport, PeerSession,
    RemoteTrack, TrackKind,
};
use callwire_signal::note::{InvitationKind, CALL_ACCEPTED, CALL_ENDED};
use callwire_signal::{
    now_millis, OutgoingRecord, PeerIdentity, RecordKind, SignalChannelError, SignalRecord,
};

use super::incoming::DetectedInvitation;
use super::negotiation::{AnswerOutcome, CandidateOutcome};
use super::publisher::Outbound;
use super::signal_router::{RoutedSignal, SignalRouter};
use super::{ActiveRouter, AppCore};
use crate::error::CallError;
use crate::state::{CallCue, CallDirection, CallState, CallStatus};
use crate::updates::{CoreMsg, InternalEvent, NegotiationStep};

const AUTOMATED_PEER_TOAST: &str = "Automated contact can't answer calls";

fn invitation_for(kind: MediaKind) -> InvitationKind {
    match kind {
        MediaKind::Audio => InvitationKind::Voice,
        MediaKind::Video => InvitationKind::Video,
    }
}

fn media_for(kind: InvitationKind) -> MediaKind {
    match kind {
        InvitationKind::Voice => MediaKind::Audio,
        InvitationKind::Video => MediaKind::Video,
    }
}

// Video that cannot be captured degrades to audio; the first error is kept
// either way so it can be reported.
fn acquire_with_fallback(
    transport: &dyn MediaTransport,
    kind: MediaKind,
) -> (Option<LocalMedia>, Option<MediaError>) {
    match transport.acquire_local_media(kind) {
        Ok(media) => (Some(media), None),
        Err(e) if kind == MediaKind::Video => match transport.acquire_local_media(MediaKind::Audio) {
            Ok(media) => (Some(media), Some(e)),
            Err(_) => (None, Some(e)),
        },
        Err(e) => (None, Some(e)),
    }
}

impl AppCore {
    fn is_live_call(&self, call_id: &str) -> bool {
        self.state
            .active_call
            .as_ref()
            .map(|c| c.call_id == call_id && c.status.is_live())
            .unwrap_or(false)
    }

    pub(super) fn is_current_session(&self, call_id: &str, session_id: u64) -> bool {
        self.is_live_call(call_id) && self.engine.session_id() == Some(session_id)
    }

    fn local_id(&self) -> String {
        self.state.local_identity.id.clone()
    }

    pub(super) fn publish_signal(&mut self, call_id: &str, kind: RecordKind, payload: String) {
        let Some(channel_id) = self
            .state
            .active_call
            .as_ref()
            .filter(|c| c.call_id == call_id)
            .map(|c| c.channel_id.clone())
        else {
            return;
        };
        self.publisher.publish(Outbound {
            call_id: call_id.to_string(),
            channel_id,
            record: OutgoingRecord::new(kind, self.local_id(), payload),
        });
    }

    fn publish_note(&mut self, call_id: &str, text: &str) {
        self.publish_signal(call_id, RecordKind::TextNote, text.to_string());
    }

    fn record_error(&mut self, err: &CallError) {
        if let Some(call) = self.state.active_call.as_mut() {
            call.last_error = Some(err.to_string());
        }
    }

    pub(super) fn handle_start_call_action(
        &mut self,
        channel_id: &str,
        peer: PeerIdentity,
        media_kind: MediaKind,
    ) {
        if self.state.has_live_call() {
            self.toast("Already in a call");
            return;
        }
        if channel_id.trim().is_empty() {
            self.toast("Chat not found");
            return;
        }
        if peer.id == self.state.local_identity.id {
            self.toast("Cannot call yourself");
            return;
        }

        let call_id = uuid::Uuid::new_v4().to_string();
        let started_at_ms = now_millis();
        let automated = peer.automated;
        tracing::info!(%call_id, %channel_id, peer = %peer.id, ?media_kind, "starting call");

        self.state.active_call = Some(CallState::new(
            call_id.clone(),
            channel_id.to_string(),
            peer,
            CallDirection::Outgoing,
            media_kind,
            started_at_ms,
        ));
        self.publish_failure_reported = None;
        self.publish_note(&call_id, invitation_for(media_kind).note_text());
        self.start_cue(CallCue::DialTone);
        self.open_signal_router(&call_id, channel_id, started_at_ms);

        if automated {
            if let Some(delay) = self.config.auto_reject_delay() {
                let rt = self.runtime.handle().clone();
                self.call_runtime
                    .arm_auto_reject(&rt, &call_id, delay, self.core_sender.clone());
            }
        }

        self.request_local_media(&call_id, media_kind, NegotiationStep::Offer);
        self.emit_state();
    }

    pub(super) fn begin_incoming_call(&mut self, invitation: DetectedInvitation) {
        let call_id = uuid::Uuid::new_v4().to_string();
        let started_at_ms = now_millis();
        let media_kind = media_for(invitation.kind);
        tracing::info!(
            %call_id,
            channel_id = %invitation.channel_id,
            peer = %invitation.peer.id,
            ?media_kind,
            "incoming call"
        );

        self.state.active_call = Some(CallState::new(
            call_id.clone(),
            invitation.channel_id.clone(),
            invitation.peer,
            CallDirection::Incoming,
            media_kind,
            started_at_ms,
        ));
        self.publish_failure_reported = None;
        self.start_cue(CallCue::RingTone);
        self.open_signal_router(&call_id, &invitation.channel_id, started_at_ms);
        self.emit_state();
    }

    fn open_signal_router(&mut self, call_id: &str, channel_id: &str, started_at_ms: i64) {
        let floor = self.processed_marks.get(channel_id).copied();
        let router = SignalRouter::new(self.local_id(), started_at_ms, self.config.signal_window_ms())
            .with_floor(floor);
        match self.channel.subscribe(channel_id, router.window_start_ms()) {
            Ok(subscription) => {
                let rt = self.runtime.handle().clone();
                self.call_runtime
                    .forward_signals(&rt, call_id, subscription, self.core_sender.clone());
            }
            Err(e) => {
                let err = CallError::ChannelRead(e);
                tracing::warn!(%call_id, %channel_id, %err, "signal subscription failed");
                self.record_error(&err);
                self.toast(err.to_string());
            }
        }
        self.router = Some(ActiveRouter {
            call_id: call_id.to_string(),
            channel_id: channel_id.to_string(),
            router,
        });
    }

    pub(super) fn handle_answer_call_action(&mut self) {
        let Some(active) = self.state.active_call.as_ref() else {
            return;
        };
        if !matches!(active.status, CallStatus::Incoming) {
            return;
        }
        let call_id = active.call_id.clone();
        let media_kind = active.media_kind;

        self.stop_cue(CallCue::RingTone);
        self.mark_connected(&call_id);
        self.request_local_media(&call_id, media_kind, NegotiationStep::Answer);
        self.emit_state();
    }

    pub(super) fn handle_reject_call_action(&mut self) {
        let Some(active) = self.state.active_call.as_ref() else {
            return;
        };
        if !matches!(active.status, CallStatus::Incoming) {
            return;
        }
        self.end_call_local("declined", true);
    }

    pub(super) fn handle_end_call_action(&mut self) {
        if !self.state.has_live_call() {
            return;
        }
        self.end_call_local("user_hangup", true);
    }

    pub(super) fn handle_toggle_mute_action(&mut self) {
        let Some(call) = self.state.active_call.as_mut() else {
            return;
        };
        if !call.status.is_live() {
            return;
        }
        call.is_muted = !call.is_muted;
        let enabled = !call.is_muted;
        self.engine.set_track_enabled(TrackKind::Audio, enabled);
        self.emit_state();
    }

    pub(super) fn handle_toggle_camera_action(&mut self) {
        let Some(call) = self.state.active_call.as_mut() else {
            return;
        };
        if !call.status.is_live() || !call.is_video_call() {
            return;
        }
        call.is_camera_enabled = !call.is_camera_enabled;
        let enabled = call.is_camera_enabled;
        self.engine.set_track_enabled(TrackKind::Video, enabled);
        self.emit_state();
    }

    fn mark_connected(&mut self, call_id: &str) {
        let now = now_millis();
        if let Some(call) = self.state.active_call.as_mut() {
            call.status = CallStatus::Connected;
            call.connected_at_ms = Some(now);
            call.connected_secs = 0;
        }
        let rt = self.runtime.handle().clone();
        self.call_runtime
            .start_clock(&rt, call_id, self.core_sender.clone());
        tracing::info!(%call_id, "call connected");
    }

    fn request_local_media(&mut self, call_id: &str, kind: MediaKind, step: NegotiationStep) {
        let transport = self.media.clone();
        let tx = self.core_sender.clone();
        let call_id = call_id.to_string();
        // Capture may sit behind a permission prompt.
        self.runtime.spawn_blocking(move || {
            let (media, error) = acquire_with_fallback(transport.as_ref(), kind);
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::LocalMediaReady {
                call_id,
                step,
                media,
                error,
            })));
        });
    }

    pub(super) fn handle_local_media_ready(
        &mut self,
        call_id: &str,
        step: NegotiationStep,
        media: Option<LocalMedia>,
        error: Option<MediaError>,
    ) {
        if !self.is_live_call(call_id) {
            tracing::debug!(%call_id, "local media arrived for a finished call");
            if let Some(media) = media {
                media.stop();
            }
            return;
        }

        if let Some(e) = error {
            let err = CallError::MediaAccess(e);
            tracing::warn!(%call_id, %err, "local media unavailable");
            self.record_error(&err);
            self.toast(err.to_string());
        }

        self.negotiate(call_id, step, media);
        if step == NegotiationStep::Answer {
            // Sent even when negotiation failed so the caller stops dialing.
            self.publish_note(call_id, CALL_ACCEPTED);
        }
        self.emit_state();
    }

    fn negotiate(&mut self, call_id: &str, step: NegotiationStep, media: Option<LocalMedia>) {
        let session = match self.engine.create_session() {
            Ok(session) => session,
            Err(err) => {
                tracing::error!(%call_id, %err, "peer session setup failed");
                if let Some(media) = media {
                    media.stop();
                }
                self.record_error(&err);
                self.toast(err.to_string());
                return;
            }
        };
        self.wire_session_hooks(call_id, &session);

        if let Some(media) = media {
            let (muted, camera_on, has_video) = self
                .state
                .active_call
                .as_ref()
                .map(|c| (c.is_muted, c.is_camera_enabled, c.is_video_call()))
                .unwrap_or((false, false, false));
            media.set_enabled(TrackKind::Audio, !muted);
            media.set_enabled(TrackKind::Video, camera_on);
            let got_video = media.has(TrackKind::Video);
            match self.engine.attach_local_media(media) {
                Ok(()) => {
                    if has_video && !got_video {
                        if let Some(call) = self.state.active_call.as_mut() {
                            call.is_camera_enabled = false;
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(%call_id, %err, "attaching local media failed");
                    self.record_error(&err);
                }
            }
        }

        match step {
            NegotiationStep::Offer => self.send_offer(call_id),
            NegotiationStep::Answer => self.send_answer(call_id),
        }
    }

    fn wire_session_hooks(&self, call_id: &str, session: &Arc<dyn PeerSession>) {
        let session_id = session.id();

        let tx = self.core_sender.clone();
        let call = call_id.to_string();
        session.on_local_candidate(Arc::new(move |candidate: IceCandidate| {
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::LocalCandidate {
                call_id: call.clone(),
                session_id,
                candidate,
            })));
        }));

        let tx = self.core_sender.clone();
        let call = call_id.to_string();
        session.on_remote_track(Arc::new(move |track: RemoteTrack| {
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::RemoteTrack {
                call_id: call.clone(),
                session_id,
                track,
            })));
        }));

        let tx = self.core_sender.clone();
        let call = call_id.to_string();
        session.on_connection_state_change(Arc::new(move |state: ConnectionState| {
            let _ = tx.send(CoreMsg::Internal(Box::new(
                InternalEvent::ConnectionStateChanged {
                    call_id: call.clone(),
                    session_id,
                    state,
                },
            )));
        }));
    }

    fn send_offer(&mut self, call_id: &str) {
        match self.engine.make_offer() {
            Ok(payload) => {
                tracing::info!(%call_id, "offer published");
                self.publish_signal(call_id, RecordKind::Offer, payload);
            }
            Err(err) => {
                tracing::error!(%call_id, %err, "offer failed");
                self.record_error(&err);
                self.toast(format!("Could not start call: {err}"));
            }
        }
    }

    fn send_answer(&mut self, call_id: &str) {
        let Some(channel_id) = self.state.active_call.as_ref().map(|c| c.channel_id.clone()) else {
            return;
        };
        let lookback = self.config.offer_lookback();
        let local_id = self.local_id();
        let offer = self
            .channel
            .query_latest_by_type(&channel_id, RecordKind::Offer, lookback)
            .map_err(CallError::ChannelRead)
            .and_then(|found| {
                // Our own offer from an earlier call is not answerable.
                found
                    .filter(|r| !r.is_from(&local_id))
                    .ok_or(CallError::NoOfferFound { lookback })
            });

        match offer.and_then(|record| self.engine.make_answer(&record.payload)) {
            Ok(payload) => {
                tracing::info!(%call_id, "answer published");
                self.publish_signal(call_id, RecordKind::Answer, payload);
            }
            Err(err) => {
                tracing::warn!(%call_id, %err, "answer not sent");
                self.record_error(&err);
                self.toast(format!("Could not answer call: {err}"));
            }
        }
    }

    pub(super) fn handle_signal_batch(
        &mut self,
        call_id: &str,
        records: Vec<SignalRecord>,
    ) {
        if !self.is_live_call(call_id) {
            return;
        }
        let Some(active) = self.router.as_mut().filter(|r| r.call_id == call_id) else {
            return;
        };
        let signals = active.router.route(records);

        for signal in signals {
            if !self.is_live_call(call_id) {
                break;
            }
            match signal {
                RoutedSignal::Ended => {
                    tracing::info!(%call_id, "peer ended the call");
                    self.end_call_local("remote_ended", false);
                    break;
                }
                RoutedSignal::Accepted => self.on_peer_accepted(call_id),
                RoutedSignal::Answer(payload) => self.on_peer_answer(call_id, &payload),
                RoutedSignal::Candidate(payload) => self.on_peer_candidate(call_id, &payload),
            }
        }
    }

    fn outgoing_direction(&self) -> bool {
        self.state
            .active_call
            .as_ref()
            .map(|c| c.direction == CallDirection::Outgoing)
            .unwrap_or(false)
    }

    fn on_peer_accepted(&mut self, call_id: &str) {
        let is_outgoing = self
            .state
            .active_call
            .as_ref()
            .map(|c| c.status == CallStatus::Outgoing)
            .unwrap_or(false);
        if !is_outgoing {
            return;
        }
        self.stop_cue(CallCue::DialTone);
        self.mark_connected(call_id);
        self.emit_state();
    }

    fn on_peer_answer(&mut self, call_id: &str, payload: &str) {
        if !self.outgoing_direction() {
            tracing::debug!(%call_id, "ignoring answer on an incoming call");
            return;
        }
        match self.engine.apply_answer(payload) {
            Ok(AnswerOutcome::Committed { drained }) => {
                tracing::info!(%call_id, drained, "remote answer committed");
            }
            Ok(AnswerOutcome::AlreadyCommitted) => {
                tracing::debug!(%call_id, "duplicate answer ignored");
            }
            Err(err) => {
                tracing::warn!(%call_id, %err, "answer not applied");
                self.record_error(&err);
            }
        }
    }

    fn on_peer_candidate(&mut self, call_id: &str, payload: &str) {
        match self.engine.apply_candidate(payload) {
            Ok(CandidateOutcome::Applied) => tracing::debug!(%call_id, "candidate applied"),
            Ok(CandidateOutcome::Buffered) => tracing::debug!(
                %call_id,
                buffered = self.engine.buffered_len(),
                "candidate buffered"
            ),
            Err(err) => tracing::warn!(%call_id, %err, "candidate dropped"),
        }
    }

    /// End the live call. Resources are released before the status flips.
    pub(super) fn end_call_local(&mut self, reason: &str, notify: bool) {
        let Some(call_id) = self
            .state
            .active_call
            .as_ref()
            .filter(|c| c.status.is_live())
            .map(|c| c.call_id.clone())
        else {
            return;
        };
        tracing::info!(%call_id, reason, notify, "ending call");

        if notify {
            self.publish_note(&call_id, CALL_ENDED);
        }
        if let Some(sub) = self.call_runtime.on_call_ended(&call_id) {
            self.channel.unsubscribe(sub);
        }
        if let Some(active) = self.router.take() {
            if let Some(mark) = active.router.last_processed_ms() {
                let slot = self.processed_marks.entry(active.channel_id).or_insert(mark);
                *slot = (*slot).max(mark);
            }
        }
        self.engine.teardown();
        self.stop_all_cues();

        if let Some(call) = self.state.active_call.as_mut() {
            call.status = CallStatus::Ended {
                reason: reason.to_string(),
            };
            call.cue = None;
        }
        self.emit_state();
    }

    pub(super) fn handle_publish_failed(
        &mut self,
        call_id: &str,
        kind: RecordKind,
        error: SignalChannelError,
    ) {
        if !self.is_live_call(call_id) {
            tracing::debug!(%call_id, %kind, %error, "publish failed after call ended");
            return;
        }
        if self.publish_failure_reported.as_deref() == Some(call_id) {
            return;
        }
        self.publish_failure_reported = Some(call_id.to_string());
        let err = CallError::ChannelWriteFailure {
            kind: kind.to_string(),
            source: error,
        };
        self.record_error(&err);
        self.toast(err.to_string());
    }

    pub(super) fn handle_clock_tick(&mut self, call_id: &str) {
        let now = now_millis();
        let Some(call) = self
            .state
            .active_call
            .as_mut()
            .filter(|c| c.call_id == call_id && c.status == CallStatus::Connected)
        else {
            return;
        };
        let Some(connected_at) = call.connected_at_ms else {
            return;
        };
        call.connected_secs = u64::try_from(now.saturating_sub(connected_at) / 1_000).unwrap_or(0);
        self.emit_state();
    }

    pub(super) fn handle_auto_reject(&mut self, call_id: &str) {
        let still_dialing = self
            .state
            .active_call
            .as_ref()
            .map(|c| c.call_id == call_id && c.status == CallStatus::Outgoing)
            .unwrap_or(false);
        if !still_dialing {
            return;
        }
        tracing::info!(%call_id, "automated peer did not answer");
        self.end_call_local("auto_rejected", true);
        self.toast(AUTOMATED_PEER_TOAST);
    }
}

#[cfg(test)]
mod tests {
    use callwire_media::LoopbackMedia;

    use super::*;

    #[test]
    fn video_falls_back_to_audio_and_keeps_the_error() {
        let media = LoopbackMedia::new();
        media.deny(TrackKind::Video);
        let (local, err) = acquire_with_fallback(&media, MediaKind::Video);
        assert_eq!(local.unwrap().kinds(), vec![TrackKind::Audio]);
        assert!(err.unwrap().is_access_error());
    }

    #[test]
    fn denied_audio_yields_no_media() {
        let media = LoopbackMedia::new();
        media.deny(TrackKind::Audio);
        let (local, err) = acquire_with_fallback(&media, MediaKind::Video);
        assert!(local.is_none());
        assert!(err.is_some());
    }

    #[test]
    fn invitation_kind_matches_media_kind() {
        assert_eq!(invitation_for(MediaKind::Audio), InvitationKind::Voice);
        assert_eq!(media_for(InvitationKind::Video), MediaKind::Video);
    }
}
