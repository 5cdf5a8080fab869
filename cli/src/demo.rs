use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use callwire_core::{
    AppReconciler, AppState, AppUpdate, CallAction, CallApp, CallStatus,
};
use callwire_media::{LoopbackMedia, MediaKind};
use callwire_signal::{InMemorySignalChannel, PeerIdentity, RecordKind};
use serde_json::json;

const DEMO_CHANNEL: &str = "demo-chat";
const POLL: Duration = Duration::from_millis(50);

pub struct DemoOptions {
    pub video: bool,
    pub automated: bool,
    pub hangup_after_ms: u64,
    pub timeout_secs: u64,
}

/// Logs each status transition of one party.
struct StatusLogger {
    who: String,
    last: Mutex<Option<CallStatus>>,
}

impl AppReconciler for StatusLogger {
    fn reconcile(&self, update: AppUpdate) {
        let AppUpdate::FullState(state) = update;
        let status = state.call_status();
        let mut last = match self.last.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        if last.as_ref() != Some(&status) {
            tracing::info!(who = %self.who, rev = state.rev, ?status, "status");
            *last = Some(status);
        }
        if let Some(toast) = &state.toast {
            tracing::info!(who = %self.who, %toast, "toast");
        }
    }
}

fn spawn_party(
    state_dir: &Path,
    identity: PeerIdentity,
    channel: &InMemorySignalChannel,
) -> Result<Arc<CallApp>> {
    // Both parties read the same callwire_config.json.
    let app = CallApp::new(
        state_dir.to_string_lossy(),
        identity.clone(),
        Arc::new(channel.clone()),
        Arc::new(LoopbackMedia::new()),
    )
    .with_context(|| format!("start {}", identity.id))?;
    app.listen_for_updates(Box::new(StatusLogger {
        who: identity.id.clone(),
        last: Mutex::new(None),
    }));
    app.attach_summary_feed(channel.watch_summaries(&identity.id));
    Ok(app)
}

fn party_json(state: &AppState) -> serde_json::Value {
    let call = state.active_call.as_ref();
    json!({
        "identity": state.local_identity.id,
        "status": format!("{:?}", state.call_status()),
        "toast": state.toast,
        "connected_secs": call.map(|c| c.connected_secs),
        "remote_tracks": call.map(|c| c.remote_tracks.iter().map(|k| k.as_str()).collect::<Vec<_>>()),
        "connection_state": call.and_then(|c| c.connection_state).map(|s| s.to_string()),
        "last_error": call.and_then(|c| c.last_error.clone()),
    })
}

/// Place a call from alice to bob (or an automated contact) over an
/// in-memory channel, hang up after the configured delay, and describe what
/// happened.
pub fn run(state_dir: &Path, opts: DemoOptions) -> Result<serde_json::Value> {
    let channel = InMemorySignalChannel::new();
    let caller_id = PeerIdentity::new("alice", "Alice");
    let callee_id = if opts.automated {
        PeerIdentity::automated("helper-bot", "Helper Bot")
    } else {
        PeerIdentity::new("bob", "Bob")
    };
    channel.open_channel(DEMO_CHANNEL, vec![caller_id.clone(), callee_id.clone()]);

    let caller = spawn_party(state_dir, caller_id, &channel)?;
    // Automated contacts have no app; nobody will ever pick up.
    let callee = if opts.automated {
        None
    } else {
        Some(spawn_party(state_dir, callee_id.clone(), &channel)?)
    };

    let media = if opts.video {
        MediaKind::Video
    } else {
        MediaKind::Audio
    };
    caller.dispatch(CallAction::StartCall {
        channel_id: DEMO_CHANNEL.to_string(),
        peer: callee_id,
        media,
    });

    let deadline = Instant::now() + Duration::from_secs(opts.timeout_secs);
    let hangup_after = Duration::from_millis(opts.hangup_after_ms);
    let mut answered = false;
    let mut connected_at: Option<Instant> = None;
    let mut hung_up = false;

    loop {
        if Instant::now() >= deadline {
            return Err(anyhow!(
                "demo did not finish within {}s (caller status: {:?})",
                opts.timeout_secs,
                caller.state().call_status()
            ));
        }

        let offer_seen = channel
            .records(DEMO_CHANNEL)
            .iter()
            .any(|r| r.kind == RecordKind::Offer);
        if let Some(callee) = &callee {
            if !answered && offer_seen && callee.state().call_status() == CallStatus::Incoming {
                callee.dispatch(CallAction::AnswerCall);
                answered = true;
            }
        }

        let status = caller.state().call_status();
        if status == CallStatus::Connected && connected_at.is_none() {
            connected_at = Some(Instant::now());
        }
        if let Some(at) = connected_at {
            if !hung_up && at.elapsed() >= hangup_after {
                caller.dispatch(CallAction::EndCall);
                hung_up = true;
            }
        }

        let callee_done = callee
            .as_ref()
            .map(|c| c.state().call_status().is_ended())
            .unwrap_or(true);
        if status.is_ended() && callee_done {
            break;
        }
        std::thread::sleep(POLL);
    }

    let records: Vec<serde_json::Value> = channel
        .records(DEMO_CHANNEL)
        .iter()
        .map(|r| {
            let summary = match r.kind {
                RecordKind::TextNote => crate::note_meaning(&r.payload),
                _ => format!("{} bytes", r.payload.len()),
            };
            json!({
                "produced_at_ms": r.produced_at_ms,
                "sender": r.sender,
                "kind": r.kind.as_str(),
                "summary": summary,
            })
        })
        .collect();

    Ok(json!({
        "channel_id": DEMO_CHANNEL,
        "caller": party_json(&caller.state()),
        "callee": callee.map(|c| party_json(&c.state())),
        "records": records,
    }))
}
