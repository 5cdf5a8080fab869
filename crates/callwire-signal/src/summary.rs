//! Chat-list summaries
//!
//! A summary is what a contact list shows for one conversation: the last
//! message snippet, its time, and how many messages the owner has not read.
//! The incoming-call detector works exclusively from this feed.

use serde::{Deserialize, Serialize};

use crate::note::{CALL_ACCEPTED, CALL_ENDED, VIDEO_INVITATION, VOICE_INVITATION};
use crate::record::RecordKind;

/// Maximum number of characters of a text note kept in a snippet
pub const SNIPPET_MAX_CHARS: usize = 50;

/// A party on a channel
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerIdentity {
    /// Stable identity used as `sender` on records
    pub id: String,
    /// Human-readable name
    pub display_name: String,
    /// Whether this party is an automated responder that never picks up calls
    #[serde(default)]
    pub automated: bool,
}

impl PeerIdentity {
    /// A human peer
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            automated: false,
        }
    }

    /// An automated peer
    pub fn automated(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            automated: true,
            ..Self::new(id, display_name)
        }
    }
}

/// One conversation as seen from the contact list of its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    /// Channel carrying the conversation
    pub channel_id: String,
    /// The other party
    pub peer: PeerIdentity,
    /// Snippet of the last chat message
    pub last_message: Option<String>,
    /// Time of the last chat message in milliseconds
    pub last_message_at_ms: Option<i64>,
    /// Messages the owner has not read yet
    pub unread_count: u32,
}

impl ChatSummary {
    /// An empty summary for a freshly opened conversation
    pub fn new(channel_id: impl Into<String>, peer: PeerIdentity) -> Self {
        Self {
            channel_id: channel_id.into(),
            peer,
            last_message: None,
            last_message_at_ms: None,
            unread_count: 0,
        }
    }

    /// Whether the summary shows unread activity
    pub fn has_unread(&self) -> bool {
        self.unread_count > 0
    }
}

/// Contact-list snippet for a record, or `None` for negotiation records,
/// which never update summaries.
pub fn snippet_for(kind: RecordKind, payload: &str) -> Option<String> {
    if kind.is_negotiation() {
        return None;
    }
    let snippet = match payload {
        VOICE_INVITATION => "📞 Voice Call".to_string(),
        VIDEO_INVITATION => "🎥 Video Call".to_string(),
        CALL_ACCEPTED => "📞 Call Connected".to_string(),
        CALL_ENDED => "📞 Call Ended".to_string(),
        text => text.chars().take(SNIPPET_MAX_CHARS).collect(),
    };
    Some(snippet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::{InvitationKind, invitation_kind};

    #[test]
    fn call_notes_get_call_snippets() {
        assert_eq!(
            snippet_for(RecordKind::TextNote, VOICE_INVITATION).as_deref(),
            Some("📞 Voice Call")
        );
        assert_eq!(
            snippet_for(RecordKind::TextNote, VIDEO_INVITATION).as_deref(),
            Some("🎥 Video Call")
        );
        assert_eq!(
            snippet_for(RecordKind::TextNote, CALL_ACCEPTED).as_deref(),
            Some("📞 Call Connected")
        );
        assert_eq!(
            snippet_for(RecordKind::TextNote, CALL_ENDED).as_deref(),
            Some("📞 Call Ended")
        );
    }

    #[test]
    fn invitation_snippets_are_recognizable() {
        let voice = snippet_for(RecordKind::TextNote, VOICE_INVITATION).unwrap();
        let video = snippet_for(RecordKind::TextNote, VIDEO_INVITATION).unwrap();
        assert_eq!(invitation_kind(&voice), Some(InvitationKind::Voice));
        assert_eq!(invitation_kind(&video), Some(InvitationKind::Video));
        let connected = snippet_for(RecordKind::TextNote, CALL_ACCEPTED).unwrap();
        assert_eq!(invitation_kind(&connected), None);
    }

    #[test]
    fn text_is_truncated_by_chars() {
        let long = "é".repeat(80);
        let snippet = snippet_for(RecordKind::TextNote, &long).unwrap();
        assert_eq!(snippet.chars().count(), SNIPPET_MAX_CHARS);
    }

    #[test]
    fn negotiation_records_have_no_snippet() {
        assert!(snippet_for(RecordKind::Offer, "{}").is_none());
        assert!(snippet_for(RecordKind::Answer, "{}").is_none());
        assert!(snippet_for(RecordKind::IceCandidate, "{}").is_none());
    }
}
