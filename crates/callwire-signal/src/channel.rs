//! The signal channel interface
//!
//! A signal channel is an append-only, per-chat log. The call core only needs
//! three things from it: write a record, be told about new records, and look up
//! the most recent record of a kind.

use std::time::Duration;

use flume::{Receiver, RecvError, RecvTimeoutError, TryRecvError};

use crate::error::SignalChannelError;
use crate::record::{OutgoingRecord, RecordKind, SignalRecord};

/// Default number of most recent records searched by
/// [`SignalChannel::query_latest_by_type`]
pub const DEFAULT_LOOKBACK: usize = 30;

/// Identifier of a live subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Push-based delivery of new records.
///
/// Each item is one notification batch. Records inside a batch carry no
/// ordering guarantee; consumers must sort by `produced_at_ms` themselves.
/// The stream ends once the subscription is removed from the channel.
pub struct SignalSubscription {
    id: SubscriptionId,
    rx: Receiver<Vec<SignalRecord>>,
}

impl SignalSubscription {
    /// Wrap a batch receiver
    pub fn new(id: SubscriptionId, rx: Receiver<Vec<SignalRecord>>) -> Self {
        Self { id, rx }
    }

    /// Subscription id, used to unsubscribe
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Non-blocking receive of the next batch
    pub fn try_recv(&self) -> Result<Vec<SignalRecord>, TryRecvError> {
        self.rx.try_recv()
    }

    /// Blocking receive of the next batch
    pub fn recv(&self) -> Result<Vec<SignalRecord>, RecvError> {
        self.rx.recv()
    }

    /// Blocking receive with a deadline
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Vec<SignalRecord>, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Async receive of the next batch
    pub async fn recv_async(&self) -> Result<Vec<SignalRecord>, RecvError> {
        self.rx.recv_async().await
    }
}

impl std::fmt::Debug for SignalSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalSubscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Storage trait for the shared chat log used as a signaling transport
pub trait SignalChannel: Send + Sync {
    /// Append a record.
    ///
    /// The channel assigns the id and the timestamp. Callers treat this as
    /// fire-and-forget; the returned record is informational.
    fn append(
        &self,
        channel_id: &str,
        record: OutgoingRecord,
    ) -> Result<SignalRecord, SignalChannelError>;

    /// Subscribe to records of a channel.
    ///
    /// Records already stored with `produced_at_ms >= since_ms` are delivered
    /// as the first batch, then every newly appended record.
    fn subscribe(
        &self,
        channel_id: &str,
        since_ms: i64,
    ) -> Result<SignalSubscription, SignalChannelError>;

    /// Remove a subscription, ending its stream. Unknown ids are ignored.
    fn unsubscribe(&self, subscription: SubscriptionId);

    /// The most recent record of `kind` among the latest `lookback` records
    /// of the channel, whatever their kind.
    fn query_latest_by_type(
        &self,
        channel_id: &str,
        kind: RecordKind,
        lookback: usize,
    ) -> Result<Option<SignalRecord>, SignalChannelError>;
}
