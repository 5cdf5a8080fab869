use callwire_signal::note::{invitation_kind, InvitationKind};
use callwire_signal::{ChatSummary, PeerIdentity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct DetectedInvitation {
    pub channel_id: String,
    pub peer: PeerIdentity,
    pub kind: InvitationKind,
    pub invited_at_ms: i64,
}

/// Spots call invitations in the contact-list feed.
///
/// A summary rings when its snippet reads as an invitation, it has unread
/// activity, it is younger than the freshness window, and it is strictly newer
/// than anything this detector already acted on.
#[derive(Debug)]
pub(super) struct IncomingCallDetector {
    watermark_ms: i64,
    freshness_ms: i64,
}

impl IncomingCallDetector {
    pub(super) fn new(freshness_ms: i64) -> Self {
        Self {
            watermark_ms: i64::MIN,
            freshness_ms,
        }
    }

    pub(super) fn watermark_ms(&self) -> i64 {
        self.watermark_ms
    }

    /// Returns the newest qualifying invitation, advancing the watermark to it.
    pub(super) fn detect(
        &mut self,
        summaries: &[ChatSummary],
        now_ms: i64,
    ) -> Option<DetectedInvitation> {
        let found = summaries
            .iter()
            .filter(|s| s.has_unread())
            .filter_map(|s| {
                let at = s.last_message_at_ms?;
                let kind = invitation_kind(s.last_message.as_deref()?)?;
                Some((s, at, kind))
            })
            .filter(|(_, at, _)| now_ms.saturating_sub(*at) < self.freshness_ms)
            .filter(|(_, at, _)| *at > self.watermark_ms)
            .max_by_key(|(_, at, _)| *at)?;

        let (summary, invited_at_ms, kind) = found;
        self.watermark_ms = invited_at_ms;
        tracing::info!(
            channel_id = %summary.channel_id,
            peer = %summary.peer.id,
            ?kind,
            "incoming call detected"
        );
        Some(DetectedInvitation {
            channel_id: summary.channel_id.clone(),
            peer: summary.peer.clone(),
            kind,
            invited_at_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 10_000_000;

    fn summary(channel: &str, snippet: &str, at: i64, unread: u32) -> ChatSummary {
        let mut s = ChatSummary::new(channel, PeerIdentity::new(format!("{channel}-peer"), "Peer"));
        s.last_message = Some(snippet.to_string());
        s.last_message_at_ms = Some(at);
        s.unread_count = unread;
        s
    }

    #[test]
    fn fresh_unread_invitation_rings_once() {
        let mut d = IncomingCallDetector::new(45_000);
        let feed = vec![summary("chat", "📞 Voice Call", NOW - 1_000, 1)];

        let hit = d.detect(&feed, NOW).unwrap();
        assert_eq!(hit.kind, InvitationKind::Voice);
        assert_eq!(hit.channel_id, "chat");
        assert_eq!(d.watermark_ms(), NOW - 1_000);

        // Same snippet on the next feed update must not ring again.
        assert!(d.detect(&feed, NOW + 500).is_none());
    }

    #[test]
    fn video_snippet_is_video() {
        let mut d = IncomingCallDetector::new(45_000);
        let hit = d
            .detect(&[summary("chat", "🎥 Video Call", NOW, 2)], NOW)
            .unwrap();
        assert_eq!(hit.kind, InvitationKind::Video);
    }

    #[test]
    fn stale_read_or_plain_snippets_are_ignored() {
        let mut d = IncomingCallDetector::new(45_000);
        let feed = vec![
            summary("old", "📞 Voice Call", NOW - 45_000, 1),
            summary("read", "📞 Voice Call", NOW - 10, 0),
            summary("chat", "are you free later?", NOW - 10, 3),
            summary("over", "📞 Call Ended", NOW - 10, 1),
        ];
        assert!(d.detect(&feed, NOW).is_none());
        assert_eq!(d.watermark_ms(), i64::MIN);
    }

    #[test]
    fn newest_invitation_wins_and_newer_one_rings_later() {
        let mut d = IncomingCallDetector::new(45_000);
        let feed = vec![
            summary("a", "📞 Voice Call", NOW - 3_000, 1),
            summary("b", "🎥 Video Call", NOW - 2_000, 1),
        ];
        assert_eq!(d.detect(&feed, NOW).unwrap().channel_id, "b");
        // "a" is older than the watermark now.
        assert!(d.detect(&feed, NOW).is_none());

        let next = vec![summary("a", "📞 Voice Call", NOW + 1_000, 2)];
        assert_eq!(d.detect(&next, NOW + 1_500).unwrap().channel_id, "a");
    }
}
