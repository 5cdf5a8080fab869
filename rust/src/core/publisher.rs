use std::sync::Arc;
use std::thread;

use callwire_signal::{OutgoingRecord, SignalChannel};
use flume::Sender;

use crate::updates::{CoreMsg, InternalEvent};

#[derive(Debug)]
pub(super) struct Outbound {
    pub call_id: String,
    pub channel_id: String,
    pub record: OutgoingRecord,
}

/// Appends records on a dedicated thread, strictly in submission order.
///
/// Submission never blocks the actor. Failures come back as
/// `InternalEvent::PublishFailed` and are not retried.
pub(super) struct SignalPublisher {
    tx: Sender<Outbound>,
}

impl SignalPublisher {
    pub(super) fn spawn(
        channel: Arc<dyn SignalChannel>,
        core_tx: Sender<CoreMsg>,
    ) -> std::io::Result<Self> {
        let (tx, rx) = flume::unbounded::<Outbound>();
        thread::Builder::new()
            .name("callwire-publisher".to_string())
            .spawn(move || {
                while let Ok(out) = rx.recv() {
                    let kind = out.record.kind;
                    match channel.append(&out.channel_id, out.record) {
                        Ok(stored) => tracing::debug!(
                            call_id = %out.call_id,
                            channel_id = %out.channel_id,
                            %kind,
                            record_id = %stored.id,
                            "published"
                        ),
                        Err(e) => {
                            tracing::warn!(
                                call_id = %out.call_id,
                                channel_id = %out.channel_id,
                                %kind,
                                %e,
                                "publish failed"
                            );
                            let _ = core_tx.send(CoreMsg::Internal(Box::new(
                                InternalEvent::PublishFailed {
                                    call_id: out.call_id,
                                    kind,
                                    error: e,
                                },
                            )));
                        }
                    }
                }
            })?;
        Ok(Self { tx })
    }

    pub(super) fn publish(&self, out: Outbound) {
        let _ = self.tx.send(out);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use callwire_signal::{InMemorySignalChannel, PeerIdentity, RecordKind};

    use super::*;

    fn setup() -> (InMemorySignalChannel, SignalPublisher, flume::Receiver<CoreMsg>) {
        let channel = InMemorySignalChannel::new();
        channel.open_channel(
            "chat",
            vec![PeerIdentity::new("me", "Me"), PeerIdentity::new("peer", "Peer")],
        );
        let (core_tx, core_rx) = flume::unbounded();
        let publisher = SignalPublisher::spawn(Arc::new(channel.clone()), core_tx).unwrap();
        (channel, publisher, core_rx)
    }

    fn outbound(record: OutgoingRecord) -> Outbound {
        Outbound {
            call_id: "call".into(),
            channel_id: "chat".into(),
            record,
        }
    }

    #[test]
    fn records_land_in_submission_order() {
        let (channel, publisher, _rx) = setup();
        publisher.publish(outbound(OutgoingRecord::text_note("me", "first")));
        publisher.publish(outbound(OutgoingRecord::new(RecordKind::Offer, "me", "{}")));
        publisher.publish(outbound(OutgoingRecord::new(RecordKind::IceCandidate, "me", "c")));

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while channel.records("chat").len() < 3 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        let kinds: Vec<RecordKind> = channel.records("chat").iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![RecordKind::TextNote, RecordKind::Offer, RecordKind::IceCandidate]
        );
    }

    #[test]
    fn failures_are_reported_to_the_actor() {
        let (channel, publisher, rx) = setup();
        channel.fail_writes(Some("offline"));
        publisher.publish(outbound(OutgoingRecord::text_note("me", "hello")));

        let msg = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        match msg {
            CoreMsg::Internal(ev) => match *ev {
                InternalEvent::PublishFailed { call_id, kind, .. } => {
                    assert_eq!(call_id, "call");
                    assert_eq!(kind, RecordKind::TextNote);
                }
                other => panic!("unexpected event: {other:?}"),
            },
            CoreMsg::Action(a) => panic!("unexpected action: {a:?}"),
        }
    }
}
