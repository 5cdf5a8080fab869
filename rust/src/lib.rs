//! Call negotiation over a shared chat log.
//!
//! [`CallApp`] is the handle a UI holds. It owns a single-threaded actor that
//! serializes every user action, channel batch, media result, and timer tick,
//! so the call state machine never sees concurrent mutation.

mod actions;
mod core;
mod error;
mod logging;
mod state;
mod updates;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;

use callwire_media::MediaTransport;
use callwire_signal::{ChatSummary, PeerIdentity, SignalChannel};
use flume::{Receiver, Sender};

pub use actions::CallAction;
pub use error::CallError;
pub use logging::init_logging;
pub use state::*;
pub use updates::*;

/// Return the default `callwire_config.json` payload used when no config file exists.
pub fn default_config_json() -> String {
    crate::core::default_app_config_json()
}

pub trait AppReconciler: Send + Sync + 'static {
    fn reconcile(&self, update: AppUpdate);
}

/// Platform-side playback of local call cues.
///
/// Called from the actor thread; implementations must not block.
pub trait CuePlayer: Send + Sync + 'static {
    fn start(&self, cue: CallCue);
    fn stop(&self, cue: CallCue);
}

pub struct CallApp {
    core_tx: Sender<CoreMsg>,
    update_rx: Receiver<AppUpdate>,
    listening: AtomicBool,
    shared_state: Arc<RwLock<AppState>>,
    cue_player: crate::core::SharedCuePlayer,
}

impl CallApp {
    pub fn new(
        data_dir: impl Into<String>,
        local_identity: PeerIdentity,
        channel: Arc<dyn SignalChannel>,
        media: Arc<dyn MediaTransport>,
    ) -> Result<Arc<Self>, CallError> {
        let data_dir = data_dir.into();
        logging::init_logging();
        tracing::info!(data_dir = %data_dir, identity = %local_identity.id, "CallApp::new() starting");

        let (update_tx, update_rx) = flume::unbounded();
        let (core_tx, core_rx) = flume::unbounded::<CoreMsg>();
        let shared_state = Arc::new(RwLock::new(AppState::empty(local_identity.clone())));
        let cue_player: crate::core::SharedCuePlayer = Arc::new(RwLock::new(None));

        let mut core = crate::core::AppCore::new(
            update_tx,
            core_tx.clone(),
            &data_dir,
            local_identity,
            shared_state.clone(),
            channel,
            media,
            cue_player.clone(),
        )?;

        // Actor loop thread (single threaded "app actor").
        thread::Builder::new()
            .name("callwire-core".to_string())
            .spawn(move || {
                while let Ok(msg) = core_rx.recv() {
                    core.handle_message(msg);
                }
            })?;

        Ok(Arc::new(Self {
            core_tx,
            update_rx,
            listening: AtomicBool::new(false),
            shared_state,
            cue_player,
        }))
    }

    pub fn state(&self) -> AppState {
        match self.shared_state.read() {
            Ok(g) => g.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }

    pub fn dispatch(&self, action: CallAction) {
        // Contract: never block caller.
        let _ = self.core_tx.send(CoreMsg::Action(action));
    }

    pub fn listen_for_updates(&self, reconciler: Box<dyn AppReconciler>) {
        if self
            .listening
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Avoid multiple listeners that would split messages.
            return;
        }

        let rx = self.update_rx.clone();
        thread::spawn(move || {
            while let Ok(update) = rx.recv() {
                reconciler.reconcile(update);
            }
        });
    }

    pub fn set_cue_player(&self, player: Box<dyn CuePlayer>) {
        let player: Arc<dyn CuePlayer> = Arc::from(player);
        match self.cue_player.write() {
            Ok(mut slot) => {
                *slot = Some(player);
            }
            Err(poison) => {
                *poison.into_inner() = Some(player);
            }
        }
    }

    /// Hand the current contact list to the incoming-call detector.
    pub fn push_chat_feed(&self, summaries: Vec<ChatSummary>) {
        let _ = self.core_tx.send(CoreMsg::Internal(Box::new(
            InternalEvent::ChatFeedUpdated { summaries },
        )));
    }

    /// Forward every contact-list update from `feed` to the detector until the
    /// feed closes.
    pub fn attach_summary_feed(&self, feed: Receiver<Vec<ChatSummary>>) {
        let tx = self.core_tx.clone();
        thread::spawn(move || {
            while let Ok(summaries) = feed.recv() {
                let msg = CoreMsg::Internal(Box::new(InternalEvent::ChatFeedUpdated { summaries }));
                if tx.send(msg).is_err() {
                    break;
                }
            }
        });
    }
}
