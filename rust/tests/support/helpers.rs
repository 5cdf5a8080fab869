#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use callwire_core::{AppReconciler, AppUpdate, CallCue, CuePlayer};

pub fn wait_until(what: &str, timeout: Duration, f: impl FnMut() -> bool) {
    wait_until_with_poll(what, timeout, Duration::from_millis(20), f);
}

pub fn wait_until_with_poll(
    what: &str,
    timeout: Duration,
    poll: Duration,
    mut f: impl FnMut() -> bool,
) {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if f() {
            return;
        }
        std::thread::sleep(poll);
    }
    panic!("{what}: condition not met within {timeout:?}");
}

pub fn write_config(data_dir: &str, v: serde_json::Value) {
    let path = std::path::Path::new(data_dir).join("callwire_config.json");
    std::fs::write(path, serde_json::to_vec(&v).unwrap()).unwrap();
}

pub struct TestReconciler {
    updates: Arc<Mutex<Vec<AppUpdate>>>,
}

impl TestReconciler {
    pub fn new() -> (Self, Arc<Mutex<Vec<AppUpdate>>>) {
        let updates = Arc::new(Mutex::new(vec![]));
        (
            Self {
                updates: updates.clone(),
            },
            updates,
        )
    }
}

impl AppReconciler for TestReconciler {
    fn reconcile(&self, update: AppUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CueEvent {
    Start(CallCue),
    Stop(CallCue),
}

#[derive(Clone, Default)]
pub struct RecordingCuePlayer {
    events: Arc<Mutex<Vec<CueEvent>>>,
}

impl RecordingCuePlayer {
    pub fn events(&self) -> Vec<CueEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl CuePlayer for RecordingCuePlayer {
    fn start(&self, cue: CallCue) {
        self.events.lock().unwrap().push(CueEvent::Start(cue));
    }

    fn stop(&self, cue: CallCue) {
        self.events.lock().unwrap().push(CueEvent::Stop(cue));
    }
}
