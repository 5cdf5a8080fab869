use std::collections::VecDeque;

use callwire_media::IceCandidate;

/// Remote candidates that arrived before a remote description was committed.
#[derive(Debug, Default)]
pub(super) struct CandidateBuffer {
    pending: VecDeque<IceCandidate>,
}

impl CandidateBuffer {
    pub(super) fn push(&mut self, candidate: IceCandidate) {
        self.pending.push_back(candidate);
    }

    pub(super) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(super) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take every buffered candidate in arrival order, leaving the buffer empty.
    pub(super) fn drain(&mut self) -> Vec<IceCandidate> {
        self.pending.drain(..).collect()
    }

    pub(super) fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(n: u32) -> IceCandidate {
        IceCandidate::new(format!("candidate:{n} 1 udp 1 10.0.0.{n} 9 typ host")).with_sdp_mid("0")
    }

    #[test]
    fn drain_is_fifo_and_empties() {
        let mut buf = CandidateBuffer::default();
        for n in [3, 1, 2] {
            buf.push(cand(n));
        }
        assert_eq!(buf.len(), 3);
        let drained = buf.drain();
        assert_eq!(drained, vec![cand(3), cand(1), cand(2)]);
        assert!(buf.is_empty());
        assert!(buf.drain().is_empty());
    }

    #[test]
    fn clear_discards_everything() {
        let mut buf = CandidateBuffer::default();
        buf.push(cand(1));
        buf.clear();
        assert!(buf.is_empty());
    }
}
