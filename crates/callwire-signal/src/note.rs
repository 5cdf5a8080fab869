//! Call notes carried as free text
//!
//! Call events travel as ordinary chat notes, so peers recognize them by
//! case-insensitive substring match on the note text. Any user-typed message
//! containing the same phrases is indistinguishable from a real call event;
//! keeping every match in this module means a structured replacement only has
//! to touch one place.

/// Note text published when a voice call is started
pub const VOICE_INVITATION: &str = "Voice call started";
/// Note text published when a video call is started
pub const VIDEO_INVITATION: &str = "Video call started";
/// Note text published by the callee after answering
pub const CALL_ACCEPTED: &str = "Call Accepted";
/// Note text published by whichever side hangs up
pub const CALL_ENDED: &str = "Call Ended";

/// The kind of call an invitation asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvitationKind {
    /// Audio only
    Voice,
    /// Audio and video
    Video,
}

impl InvitationKind {
    /// The note text announcing this kind of call
    pub fn note_text(&self) -> &'static str {
        match self {
            Self::Voice => VOICE_INVITATION,
            Self::Video => VIDEO_INVITATION,
        }
    }
}

/// What a text note means to the call protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteMeaning {
    /// A call invitation
    Invitation(InvitationKind),
    /// The callee answered
    Accepted,
    /// The other side hung up
    Ended,
    /// Ordinary chat
    Plain,
}

/// Classify the text of a note.
///
/// "call ended" is checked first so a note mentioning both phrases always
/// terminates.
pub fn classify_note(text: &str) -> NoteMeaning {
    let lower = text.to_lowercase();
    if lower.contains("call ended") {
        return NoteMeaning::Ended;
    }
    if lower.contains("call accepted") {
        return NoteMeaning::Accepted;
    }
    match invitation_kind(&lower) {
        Some(kind) => NoteMeaning::Invitation(kind),
        None => NoteMeaning::Plain,
    }
}

/// Recognize a call invitation in a note or a chat-list snippet.
///
/// Matches "video call" or "voice call"; anything mentioning "video" is a
/// video invitation.
pub fn invitation_kind(text: &str) -> Option<InvitationKind> {
    let lower = text.to_lowercase();
    if !(lower.contains("video call") || lower.contains("voice call")) {
        return None;
    }
    if lower.contains("video") {
        Some(InvitationKind::Video)
    } else {
        Some(InvitationKind::Voice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_protocol_notes() {
        assert_eq!(classify_note(CALL_ENDED), NoteMeaning::Ended);
        assert_eq!(classify_note(CALL_ACCEPTED), NoteMeaning::Accepted);
        assert_eq!(
            classify_note(VOICE_INVITATION),
            NoteMeaning::Invitation(InvitationKind::Voice)
        );
        assert_eq!(
            classify_note(VIDEO_INVITATION),
            NoteMeaning::Invitation(InvitationKind::Video)
        );
        assert_eq!(classify_note("see you at 5"), NoteMeaning::Plain);
    }

    #[test]
    fn matching_is_case_insensitive_substring() {
        assert_eq!(classify_note("oh no, CALL ENDED early"), NoteMeaning::Ended);
        assert_eq!(classify_note("📞 Call Ended"), NoteMeaning::Ended);
        assert_eq!(
            invitation_kind("🎥 Video Call"),
            Some(InvitationKind::Video)
        );
        assert_eq!(
            invitation_kind("📞 Voice Call"),
            Some(InvitationKind::Voice)
        );
        assert_eq!(invitation_kind("call me maybe"), None);
    }

    #[test]
    fn ended_wins_over_accepted_in_the_same_note() {
        assert_eq!(
            classify_note("call accepted, then call ended"),
            NoteMeaning::Ended
        );
    }
}
