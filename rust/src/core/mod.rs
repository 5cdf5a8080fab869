mod call_control;
mod call_runtime;
mod candidate_buffer;
mod config;
mod incoming;
mod negotiation;
mod publisher;
mod signal_router;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use callwire_media::MediaTransport;
use callwire_signal::{PeerIdentity, SignalChannel};
use flume::Sender;

use crate::actions::CallAction;
use crate::error::CallError;
use crate::state::{AppState, CallCue};
use crate::updates::{AppUpdate, CoreMsg, InternalEvent};
use crate::CuePlayer;

pub(crate) use config::default_app_config_json;

pub(crate) type SharedCuePlayer = Arc<RwLock<Option<Arc<dyn CuePlayer>>>>;

// Router bound to the live call.
struct ActiveRouter {
    call_id: String,
    channel_id: String,
    router: signal_router::SignalRouter,
}

pub struct AppCore {
    pub state: AppState,
    rev: u64,

    update_sender: Sender<AppUpdate>,
    core_sender: Sender<CoreMsg>,
    shared_state: Arc<RwLock<AppState>>,

    config: config::AppConfig,
    runtime: tokio::runtime::Runtime,

    channel: Arc<dyn SignalChannel>,
    publisher: publisher::SignalPublisher,
    engine: negotiation::NegotiationEngine,
    router: Option<ActiveRouter>,
    // Per channel: production time of the last peer record a finished call consumed.
    processed_marks: HashMap<String, i64>,
    detector: incoming::IncomingCallDetector,
    call_runtime: call_runtime::CallRuntime,
    media: Arc<dyn MediaTransport>,
    cue_player: SharedCuePlayer,

    // Call id whose publish failure was already surfaced.
    publish_failure_reported: Option<String>,
}

impl AppCore {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        update_sender: Sender<AppUpdate>,
        core_sender: Sender<CoreMsg>,
        data_dir: &str,
        local_identity: PeerIdentity,
        shared_state: Arc<RwLock<AppState>>,
        channel: Arc<dyn SignalChannel>,
        media: Arc<dyn MediaTransport>,
        cue_player: SharedCuePlayer,
    ) -> Result<Self, CallError> {
        let config = config::load_app_config(data_dir);
        let state = AppState::empty(local_identity);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("callwire-rt")
            .enable_time()
            .build()?;

        let publisher = publisher::SignalPublisher::spawn(channel.clone(), core_sender.clone())?;
        let engine = negotiation::NegotiationEngine::new(media.clone(), config.peer_session_config());
        let detector = incoming::IncomingCallDetector::new(config.invite_freshness_ms());

        let this = Self {
            state,
            rev: 0,
            update_sender,
            core_sender,
            shared_state,
            config,
            runtime,
            channel,
            publisher,
            engine,
            router: None,
            processed_marks: HashMap::new(),
            detector,
            call_runtime: call_runtime::CallRuntime::default(),
            media,
            cue_player,
            publish_failure_reported: None,
        };

        // Ensure CallApp::state() has an immediately-available snapshot.
        let snapshot = this.state.clone();
        this.commit_state_snapshot(&snapshot);
        Ok(this)
    }

    fn next_rev(&mut self) -> u64 {
        self.rev += 1;
        self.state.rev = self.rev;
        self.rev
    }

    fn commit_state_snapshot(&self, snapshot: &AppState) {
        match self.shared_state.write() {
            Ok(mut g) => *g = snapshot.clone(),
            Err(poison) => *poison.into_inner() = snapshot.clone(),
        }
    }

    fn emit_state(&mut self) {
        self.next_rev();
        let snapshot = self.state.clone();
        self.commit_state_snapshot(&snapshot);
        let _ = self.update_sender.send(AppUpdate::FullState(snapshot));
    }

    fn toast(&mut self, msg: impl Into<String>) {
        // Stays in state until the UI clears it, so a snapshot read still shows it.
        self.state.toast = Some(msg.into());
        self.emit_state();
    }

    fn cue_player(&self) -> Option<Arc<dyn CuePlayer>> {
        match self.cue_player.read() {
            Ok(g) => g.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }

    fn start_cue(&mut self, cue: CallCue) {
        if let Some(call) = self.state.active_call.as_mut() {
            call.cue = Some(cue);
        }
        if let Some(player) = self.cue_player() {
            player.start(cue);
        }
    }

    fn stop_cue(&mut self, cue: CallCue) {
        if let Some(call) = self.state.active_call.as_mut() {
            if call.cue == Some(cue) {
                call.cue = None;
            }
        }
        if let Some(player) = self.cue_player() {
            player.stop(cue);
        }
    }

    fn stop_all_cues(&mut self) {
        self.stop_cue(CallCue::DialTone);
        self.stop_cue(CallCue::RingTone);
    }

    pub fn handle_message(&mut self, msg: CoreMsg) {
        match msg {
            CoreMsg::Action(action) => {
                tracing::info!(action = action.tag(), "dispatch");
                self.handle_action(action);
            }
            CoreMsg::Internal(internal) => self.handle_internal(*internal),
        }
    }

    fn handle_action(&mut self, action: CallAction) {
        match action {
            CallAction::StartCall {
                channel_id,
                peer,
                media,
            } => self.handle_start_call_action(&channel_id, peer, media),
            CallAction::AnswerCall => self.handle_answer_call_action(),
            CallAction::RejectCall => self.handle_reject_call_action(),
            CallAction::EndCall => self.handle_end_call_action(),
            CallAction::ToggleMute => self.handle_toggle_mute_action(),
            CallAction::ToggleCamera => self.handle_toggle_camera_action(),
            CallAction::ClearToast => {
                if self.state.toast.take().is_some() {
                    self.emit_state();
                }
            }
        }
    }

    fn handle_internal(&mut self, internal: InternalEvent) {
        match internal {
            InternalEvent::SignalBatch { call_id, records } => {
                self.handle_signal_batch(&call_id, records);
            }
            InternalEvent::ChatFeedUpdated { summaries } => {
                // Detection only runs while no call is live.
                if self.state.has_live_call() {
                    return;
                }
                let now = callwire_signal::now_millis();
                if let Some(invitation) = self.detector.detect(&summaries, now) {
                    self.begin_incoming_call(invitation);
                }
            }
            InternalEvent::LocalMediaReady {
                call_id,
                step,
                media,
                error,
            } => self.handle_local_media_ready(&call_id, step, media, error),
            InternalEvent::PublishFailed {
                call_id,
                kind,
                error,
            } => self.handle_publish_failed(&call_id, kind, error),
            InternalEvent::LocalCandidate {
                call_id,
                session_id,
                candidate,
            } => {
                if !self.is_current_session(&call_id, session_id) {
                    return;
                }
                match candidate.to_json() {
                    Ok(payload) => self.publish_signal(
                        &call_id,
                        callwire_signal::RecordKind::IceCandidate,
                        payload,
                    ),
                    Err(e) => tracing::warn!(%call_id, %e, "local candidate encode failed"),
                }
            }
            InternalEvent::RemoteTrack {
                call_id,
                session_id,
                track,
            } => {
                if !self.is_current_session(&call_id, session_id) {
                    return;
                }
                tracing::info!(%call_id, track = %track.id, kind = track.kind.as_str(), "remote track");
                if let Some(call) = self.state.active_call.as_mut() {
                    if !call.remote_tracks.contains(&track.kind) {
                        call.remote_tracks.push(track.kind);
                    }
                }
                self.emit_state();
            }
            InternalEvent::ConnectionStateChanged {
                call_id,
                session_id,
                state,
            } => {
                if !self.is_current_session(&call_id, session_id) {
                    return;
                }
                tracing::debug!(%call_id, %state, "peer connection state");
                if let Some(call) = self.state.active_call.as_mut() {
                    call.connection_state = Some(state);
                }
                self.emit_state();
            }
            InternalEvent::ClockTick { call_id } => self.handle_clock_tick(&call_id),
            InternalEvent::AutoRejectElapsed { call_id } => self.handle_auto_reject(&call_id),
        }
    }
}
