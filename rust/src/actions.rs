use callwire_media::MediaKind;
use callwire_signal::PeerIdentity;

#[derive(Debug, Clone)]
pub enum CallAction {
    // Lifecycle
    StartCall {
        channel_id: String,
        peer: PeerIdentity,
        media: MediaKind,
    },
    AnswerCall,
    RejectCall,
    EndCall,

    // In-call controls
    ToggleMute,
    ToggleCamera,

    // UI
    ClearToast,
}

impl CallAction {
    /// Log-safe action tag.
    pub fn tag(&self) -> &'static str {
        match self {
            CallAction::StartCall { .. } => "StartCall",
            CallAction::AnswerCall => "AnswerCall",
            CallAction::RejectCall => "RejectCall",
            CallAction::EndCall => "EndCall",

            CallAction::ToggleMute => "ToggleMute",
            CallAction::ToggleCamera => "ToggleCamera",

            CallAction::ClearToast => "ClearToast",
        }
    }
}
