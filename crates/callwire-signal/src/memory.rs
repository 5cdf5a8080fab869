//! In-memory signal channel
//!
//! A complete, non-persistent [`SignalChannel`] used by tests, the CLI demo,
//! and embedders that run both parties in one process. Besides the log itself
//! it maintains per-participant chat summaries the way a contact list would.
//!
//! **Note:** every operation takes one global lock, so delivery to
//! subscribers happens in append order. Tests that need reordered or batched
//! delivery use [`InMemorySignalChannel::inject_batch`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use flume::{Receiver, Sender};
use parking_lot::Mutex;

use crate::channel::{SignalChannel, SignalSubscription, SubscriptionId};
use crate::error::SignalChannelError;
use crate::record::{OutgoingRecord, RecordKind, SignalRecord};
use crate::summary::{ChatSummary, PeerIdentity, snippet_for};

/// Current wall-clock time in milliseconds
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[derive(Debug, Default)]
struct ChannelLog {
    participants: Vec<PeerIdentity>,
    records: Vec<SignalRecord>,
    last_produced_at_ms: i64,
    // owner id -> summary
    summaries: HashMap<String, ChatSummary>,
}

#[derive(Debug)]
struct Subscriber {
    channel_id: String,
    tx: Sender<Vec<SignalRecord>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    channels: HashMap<String, ChannelLog>,
    subscribers: BTreeMap<SubscriptionId, Subscriber>,
    // owner id -> watcher
    summary_watchers: Vec<(String, Sender<Vec<ChatSummary>>)>,
    next_subscription: u64,
    fail_writes: Option<String>,
}

impl MemoryState {
    fn summaries_for(&self, identity: &str) -> Vec<ChatSummary> {
        let mut out: Vec<ChatSummary> = self
            .channels
            .values()
            .filter_map(|log| log.summaries.get(identity).cloned())
            .collect();
        out.sort_by(|a, b| {
            b.last_message_at_ms
                .unwrap_or(0)
                .cmp(&a.last_message_at_ms.unwrap_or(0))
                .then_with(|| a.channel_id.cmp(&b.channel_id))
        });
        out
    }

    fn notify_summary_watchers(&mut self, channel_id: &str) {
        let Some(log) = self.channels.get(channel_id) else {
            return;
        };
        let owners: Vec<String> = log.participants.iter().map(|p| p.id.clone()).collect();
        let watchers = std::mem::take(&mut self.summary_watchers);
        let mut kept = Vec::with_capacity(watchers.len());
        for (owner, tx) in watchers {
            if owners.contains(&owner) && tx.send(self.summaries_for(&owner)).is_err() {
                continue;
            }
            kept.push((owner, tx));
        }
        self.summary_watchers = kept;
    }

    fn deliver(&mut self, channel_id: &str, batch: Vec<SignalRecord>) {
        if batch.is_empty() {
            return;
        }
        self.subscribers.retain(|id, sub| {
            if sub.channel_id != channel_id {
                return true;
            }
            let alive = sub.tx.send(batch.clone()).is_ok();
            if !alive {
                tracing::debug!(subscription = id.0, channel_id, "dropping closed subscriber");
            }
            alive
        });
    }

    fn store(
        &mut self,
        channel_id: &str,
        record: OutgoingRecord,
        produced_at_ms: Option<i64>,
    ) -> Result<SignalRecord, SignalChannelError> {
        if let Some(reason) = &self.fail_writes {
            return Err(SignalChannelError::WriteFailed(reason.clone()));
        }
        let log = self
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| SignalChannelError::ChannelNotFound(channel_id.to_string()))?;

        let produced_at_ms = match produced_at_ms {
            Some(ts) => ts,
            None => now_millis().max(log.last_produced_at_ms + 1),
        };
        log.last_produced_at_ms = log.last_produced_at_ms.max(produced_at_ms);

        let stored = SignalRecord {
            id: uuid::Uuid::new_v4().to_string(),
            channel_id: channel_id.to_string(),
            kind: record.kind,
            sender: record.sender,
            payload: record.payload,
            produced_at_ms,
        };

        let snippet = snippet_for(stored.kind, &stored.payload);
        if let Some(snippet) = &snippet {
            for (owner, summary) in log.summaries.iter_mut() {
                let is_sender = *owner == stored.sender;
                summary.last_message = Some(snippet.clone());
                summary.last_message_at_ms = Some(produced_at_ms);
                summary.unread_count = if is_sender {
                    0
                } else {
                    summary.unread_count.saturating_add(1)
                };
            }
        }
        log.records.push(stored.clone());

        if snippet.is_some() {
            self.notify_summary_watchers(channel_id);
        }
        Ok(stored)
    }
}

/// In-memory implementation of [`SignalChannel`]
#[derive(Debug, Clone, Default)]
pub struct InMemorySignalChannel {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemorySignalChannel {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a conversation between `participants`.
    ///
    /// Each participant gets a summary whose peer is the first other
    /// participant. Opening an existing channel is a no-op.
    pub fn open_channel(&self, channel_id: &str, participants: Vec<PeerIdentity>) {
        let mut state = self.state.lock();
        if state.channels.contains_key(channel_id) {
            return;
        }
        let mut summaries = HashMap::new();
        for owner in &participants {
            if let Some(peer) = participants.iter().find(|p| p.id != owner.id) {
                summaries.insert(
                    owner.id.clone(),
                    ChatSummary::new(channel_id, peer.clone()),
                );
            }
        }
        state.channels.insert(
            channel_id.to_string(),
            ChannelLog {
                participants,
                summaries,
                ..Default::default()
            },
        );
        state.notify_summary_watchers(channel_id);
    }

    /// Append a record with an explicit timestamp instead of the channel clock
    pub fn append_at(
        &self,
        channel_id: &str,
        record: OutgoingRecord,
        produced_at_ms: i64,
    ) -> Result<SignalRecord, SignalChannelError> {
        let mut state = self.state.lock();
        let stored = state.store(channel_id, record, Some(produced_at_ms))?;
        state.deliver(channel_id, vec![stored.clone()]);
        Ok(stored)
    }

    /// Store several records with explicit timestamps and deliver them to
    /// subscribers as a single batch, in the order given.
    pub fn inject_batch(
        &self,
        channel_id: &str,
        records: Vec<(OutgoingRecord, i64)>,
    ) -> Result<Vec<SignalRecord>, SignalChannelError> {
        let mut state = self.state.lock();
        let mut batch = Vec::with_capacity(records.len());
        for (record, produced_at_ms) in records {
            batch.push(state.store(channel_id, record, Some(produced_at_ms))?);
        }
        state.deliver(channel_id, batch.clone());
        Ok(batch)
    }

    /// All records of a channel in append order
    pub fn records(&self, channel_id: &str) -> Vec<SignalRecord> {
        self.state
            .lock()
            .channels
            .get(channel_id)
            .map(|log| log.records.clone())
            .unwrap_or_default()
    }

    /// The contact list of `identity`, most recent conversation first
    pub fn summaries_for(&self, identity: &str) -> Vec<ChatSummary> {
        self.state.lock().summaries_for(identity)
    }

    /// Zero the unread count of `identity` on a channel
    pub fn mark_read(&self, channel_id: &str, identity: &str) {
        let mut state = self.state.lock();
        let changed = match state
            .channels
            .get_mut(channel_id)
            .and_then(|log| log.summaries.get_mut(identity))
        {
            Some(summary) if summary.unread_count > 0 => {
                summary.unread_count = 0;
                true
            }
            _ => false,
        };
        if changed {
            state.notify_summary_watchers(channel_id);
        }
    }

    /// Feed of the contact list of `identity`.
    ///
    /// The current list is sent immediately, then again after every change.
    pub fn watch_summaries(&self, identity: &str) -> Receiver<Vec<ChatSummary>> {
        let (tx, rx) = flume::unbounded();
        let mut state = self.state.lock();
        let _ = tx.send(state.summaries_for(identity));
        state.summary_watchers.push((identity.to_string(), tx));
        rx
    }

    /// Make every subsequent write fail with `reason`, or restore writes with `None`
    pub fn fail_writes(&self, reason: Option<&str>) {
        self.state.lock().fail_writes = reason.map(ToString::to_string);
    }

    /// Number of live subscriptions on a channel
    pub fn subscriber_count(&self, channel_id: &str) -> usize {
        self.state
            .lock()
            .subscribers
            .values()
            .filter(|s| s.channel_id == channel_id)
            .count()
    }
}

impl SignalChannel for InMemorySignalChannel {
    fn append(
        &self,
        channel_id: &str,
        record: OutgoingRecord,
    ) -> Result<SignalRecord, SignalChannelError> {
        let mut state = self.state.lock();
        let stored = state.store(channel_id, record, None)?;
        state.deliver(channel_id, vec![stored.clone()]);
        Ok(stored)
    }

    fn subscribe(
        &self,
        channel_id: &str,
        since_ms: i64,
    ) -> Result<SignalSubscription, SignalChannelError> {
        let mut state = self.state.lock();
        let backlog: Vec<SignalRecord> = state
            .channels
            .get(channel_id)
            .ok_or_else(|| SignalChannelError::ChannelNotFound(channel_id.to_string()))?
            .records
            .iter()
            .filter(|r| r.produced_at_ms >= since_ms)
            .cloned()
            .collect();

        let (tx, rx) = flume::unbounded();
        if !backlog.is_empty() {
            let _ = tx.send(backlog);
        }
        state.next_subscription += 1;
        let id = SubscriptionId(state.next_subscription);
        state.subscribers.insert(
            id,
            Subscriber {
                channel_id: channel_id.to_string(),
                tx,
            },
        );
        Ok(SignalSubscription::new(id, rx))
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        self.state.lock().subscribers.remove(&subscription);
    }

    fn query_latest_by_type(
        &self,
        channel_id: &str,
        kind: RecordKind,
        lookback: usize,
    ) -> Result<Option<SignalRecord>, SignalChannelError> {
        let state = self.state.lock();
        let log = state
            .channels
            .get(channel_id)
            .ok_or_else(|| SignalChannelError::ChannelNotFound(channel_id.to_string()))?;
        let mut recent: Vec<&SignalRecord> = log.records.iter().collect();
        recent.sort_by(|a, b| b.produced_at_ms.cmp(&a.produced_at_ms));
        Ok(recent
            .into_iter()
            .take(lookback)
            .find(|r| r.kind == kind)
            .cloned())
    }
}
