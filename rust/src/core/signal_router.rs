use std::collections::HashSet;

use callwire_signal::note::{classify_note, NoteMeaning};
use callwire_signal::{RecordKind, SignalRecord};

/// A record the call cares about, in dispatch order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum RoutedSignal {
    Ended,
    Accepted,
    Answer(String),
    Candidate(String),
}

/// Turns raw channel batches for one call into an ordered list of signals.
///
/// The channel gives no ordering or delivery guarantees, so every batch is
/// windowed, re-sorted by production time, stripped of our own records and of
/// anything already seen, then cut after the first "call ended".
///
/// A router lives for one call. Records an earlier call on the same channel
/// already handled are kept out by the floor, see [`SignalRouter::with_floor`].
#[derive(Debug)]
pub(super) struct SignalRouter {
    local_id: String,
    window_start_ms: i64,
    floor_ms: Option<i64>,
    last_processed_ms: Option<i64>,
    seen: HashSet<String>,
    ended: bool,
}

impl SignalRouter {
    pub(super) fn new(local_id: impl Into<String>, started_at_ms: i64, window_ms: i64) -> Self {
        Self {
            local_id: local_id.into(),
            window_start_ms: started_at_ms.saturating_sub(window_ms),
            floor_ms: None,
            last_processed_ms: None,
            seen: HashSet::new(),
            ended: false,
        }
    }

    /// Drop every record produced at or before `floor_ms`.
    pub(super) fn with_floor(mut self, floor_ms: Option<i64>) -> Self {
        self.floor_ms = floor_ms;
        self
    }

    pub(super) fn window_start_ms(&self) -> i64 {
        self.window_start_ms
    }

    /// Production time of the newest peer record this router consumed.
    pub(super) fn last_processed_ms(&self) -> Option<i64> {
        self.last_processed_ms
    }

    pub(super) fn route(&mut self, mut batch: Vec<SignalRecord>) -> Vec<RoutedSignal> {
        if self.ended {
            return vec![];
        }
        let floor = self.floor_ms;
        batch.retain(|r| {
            r.produced_at_ms >= self.window_start_ms
                && floor.is_none_or(|f| r.produced_at_ms > f)
        });
        // Stable: equal timestamps keep delivery order.
        batch.sort_by_key(|r| r.produced_at_ms);

        let mut out = Vec::new();
        for record in batch {
            if record.is_from(&self.local_id) {
                continue;
            }
            if !self.seen.insert(record.id.clone()) {
                tracing::debug!(record_id = %record.id, "duplicate record dropped");
                continue;
            }
            self.last_processed_ms = self.last_processed_ms.max(Some(record.produced_at_ms));
            let signal = match record.kind {
                RecordKind::TextNote => match classify_note(&record.payload) {
                    NoteMeaning::Ended => Some(RoutedSignal::Ended),
                    NoteMeaning::Accepted => Some(RoutedSignal::Accepted),
                    NoteMeaning::Invitation(_) | NoteMeaning::Plain => None,
                },
                RecordKind::Answer => Some(RoutedSignal::Answer(record.payload)),
                RecordKind::IceCandidate => Some(RoutedSignal::Candidate(record.payload)),
                // Offers are fetched on demand when answering.
                RecordKind::Offer => None,
            };
            if let Some(signal) = signal {
                let is_end = signal == RoutedSignal::Ended;
                out.push(signal);
                if is_end {
                    self.ended = true;
                    break;
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use callwire_signal::note::{CALL_ACCEPTED, CALL_ENDED, VOICE_INVITATION};

    use super::*;

    const START: i64 = 1_000_000;

    fn rec(id: &str, kind: RecordKind, sender: &str, payload: &str, at: i64) -> SignalRecord {
        SignalRecord {
            id: id.to_string(),
            channel_id: "chat".to_string(),
            kind,
            sender: sender.to_string(),
            payload: payload.to_string(),
            produced_at_ms: at,
        }
    }

    fn router() -> SignalRouter {
        SignalRouter::new("me", START, 15_000)
    }

    #[test]
    fn window_admits_records_just_before_start() {
        let mut r = router();
        let out = r.route(vec![
            rec("old", RecordKind::IceCandidate, "peer", "c-old", START - 15_001),
            rec("edge", RecordKind::IceCandidate, "peer", "c-edge", START - 15_000),
            rec("new", RecordKind::IceCandidate, "peer", "c-new", START + 5),
        ]);
        assert_eq!(
            out,
            vec![
                RoutedSignal::Candidate("c-edge".into()),
                RoutedSignal::Candidate("c-new".into()),
            ]
        );
    }

    #[test]
    fn batch_is_resorted_by_production_time() {
        let mut r = router();
        let out = r.route(vec![
            rec("b", RecordKind::IceCandidate, "peer", "second", START + 20),
            rec("c", RecordKind::TextNote, "peer", CALL_ACCEPTED, START + 30),
            rec("a", RecordKind::Answer, "peer", "answer", START + 10),
        ]);
        assert_eq!(
            out,
            vec![
                RoutedSignal::Answer("answer".into()),
                RoutedSignal::Candidate("second".into()),
                RoutedSignal::Accepted,
            ]
        );
    }

    #[test]
    fn own_records_are_never_dispatched() {
        let mut r = router();
        let kinds = [
            (RecordKind::TextNote, CALL_ENDED),
            (RecordKind::TextNote, CALL_ACCEPTED),
            (RecordKind::Answer, "a"),
            (RecordKind::IceCandidate, "c"),
            (RecordKind::Offer, "o"),
        ];
        let batch = kinds
            .iter()
            .enumerate()
            .map(|(i, (k, p))| rec(&format!("r{i}"), *k, "me", p, START + i as i64))
            .collect();
        assert!(r.route(batch).is_empty());
    }

    #[test]
    fn ended_cuts_the_rest_of_the_batch() {
        let mut r = router();
        let out = r.route(vec![
            rec("late-answer", RecordKind::Answer, "peer", "answer", START + 50),
            rec("end", RecordKind::TextNote, "peer", CALL_ENDED, START + 40),
            rec("cand", RecordKind::IceCandidate, "peer", "c", START + 60),
        ]);
        assert_eq!(out, vec![RoutedSignal::Ended]);
        // Nothing after an end is ever routed again.
        assert!(r
            .route(vec![rec("x", RecordKind::Answer, "peer", "a", START + 70)])
            .is_empty());
    }

    #[test]
    fn duplicates_across_batches_are_dropped() {
        let mut r = router();
        let c = rec("dup", RecordKind::IceCandidate, "peer", "c", START + 1);
        assert_eq!(r.route(vec![c.clone()]).len(), 1);
        assert!(r.route(vec![c.clone(), c]).is_empty());
    }

    #[test]
    fn floor_hides_what_an_earlier_call_consumed() {
        let mut first = router();
        first.route(vec![
            rec("ans", RecordKind::Answer, "peer", "answer", START + 10),
            rec("acc", RecordKind::TextNote, "peer", CALL_ACCEPTED, START + 20),
            rec("mine", RecordKind::TextNote, "me", CALL_ENDED, START + 90),
        ]);
        // Own records never move the mark.
        assert_eq!(first.last_processed_ms(), Some(START + 20));

        let mut second =
            SignalRouter::new("me", START + 1_000, 15_000).with_floor(first.last_processed_ms());
        let out = second.route(vec![
            rec("ans", RecordKind::Answer, "peer", "answer", START + 10),
            rec("acc", RecordKind::TextNote, "peer", CALL_ACCEPTED, START + 20),
            rec("fresh", RecordKind::TextNote, "peer", CALL_ACCEPTED, START + 1_200),
        ]);
        assert_eq!(out, vec![RoutedSignal::Accepted]);
        assert_eq!(second.last_processed_ms(), Some(START + 1_200));
    }

    #[test]
    fn mark_stays_empty_until_a_peer_record_lands() {
        let mut r = router();
        assert_eq!(r.last_processed_ms(), None);
        r.route(vec![rec("old", RecordKind::IceCandidate, "peer", "c", START - 20_000)]);
        assert_eq!(r.last_processed_ms(), None);
    }

    #[test]
    fn offers_invitations_and_chat_are_ignored() {
        let mut r = router();
        let out = r.route(vec![
            rec("o", RecordKind::Offer, "peer", "offer", START + 1),
            rec("i", RecordKind::TextNote, "peer", VOICE_INVITATION, START + 2),
            rec("t", RecordKind::TextNote, "peer", "see you soon", START + 3),
        ]);
        assert!(out.is_empty());
    }
}
