//! Record types carried over the signal channel
//!
//! Every entry on a chat channel is a [`SignalRecord`]. Human-readable notes and
//! negotiation payloads share the same log; the [`RecordKind`] tag is the only
//! thing telling them apart.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SignalChannelError;

/// The kind of a record on the channel.
///
/// The serialized names are wire-visible and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Free text, including the call notes ("Voice call started", "Call Accepted", ...)
    TextNote,
    /// A serialized session-description offer
    Offer,
    /// A serialized session-description answer
    Answer,
    /// A serialized connectivity candidate
    IceCandidate,
}

impl RecordKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextNote => "text_note",
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice_candidate",
        }
    }

    /// Whether the record belongs to the negotiation protocol rather than the chat.
    ///
    /// Negotiation records never show up in chat summaries.
    pub fn is_negotiation(&self) -> bool {
        !matches!(self, Self::TextNote)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = SignalChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text_note" => Ok(Self::TextNote),
            "offer" => Ok(Self::Offer),
            "answer" => Ok(Self::Answer),
            "ice_candidate" => Ok(Self::IceCandidate),
            other => Err(SignalChannelError::InvalidRecord(format!(
                "unknown record kind: {other}"
            ))),
        }
    }
}

/// A record as submitted by a client, before the channel assigns identity and time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingRecord {
    /// Record kind
    pub kind: RecordKind,
    /// Identity of the author
    pub sender: String,
    /// Opaque payload, carried verbatim
    pub payload: String,
}

impl OutgoingRecord {
    /// Build an outgoing record
    pub fn new(kind: RecordKind, sender: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            kind,
            sender: sender.into(),
            payload: payload.into(),
        }
    }

    /// Build a text note
    pub fn text_note(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(RecordKind::TextNote, sender, text)
    }
}

/// An immutable record appended to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalRecord {
    /// Channel-assigned unique id
    pub id: String,
    /// Channel the record was appended to
    pub channel_id: String,
    /// Record kind
    pub kind: RecordKind,
    /// Identity of the author
    pub sender: String,
    /// Opaque payload: note text, or a serialized description / candidate
    pub payload: String,
    /// Channel-assigned timestamp in milliseconds.
    ///
    /// Monotonically increasing within one channel; delivery order to clients
    /// does not necessarily follow it.
    pub produced_at_ms: i64,
}

impl SignalRecord {
    /// Serialize the record to its wire JSON form
    pub fn to_json(&self) -> Result<String, SignalChannelError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a record from its wire JSON form
    pub fn from_json(json: &str) -> Result<Self, SignalChannelError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether this record was authored by `identity`
    pub fn is_from(&self, identity: &str) -> bool {
        self.sender == identity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_are_stable() {
        for kind in [
            RecordKind::TextNote,
            RecordKind::Offer,
            RecordKind::Answer,
            RecordKind::IceCandidate,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            assert_eq!(kind.as_str().parse::<RecordKind>().unwrap(), kind);
        }
        assert!("webrtc-offer".parse::<RecordKind>().is_err());
    }

    #[test]
    fn payload_survives_wire_form_verbatim() {
        let payload = "{\"type\":\"offer\",\"sdp\":\"v=0\\r\\no=- 1 2 IN IP4 127.0.0.1\\r\\n\"}";
        let record = SignalRecord {
            id: "r1".to_string(),
            channel_id: "alice_bob".to_string(),
            kind: RecordKind::Offer,
            sender: "alice".to_string(),
            payload: payload.to_string(),
            produced_at_ms: 1_700_000_000_000,
        };
        let parsed = SignalRecord::from_json(&record.to_json().unwrap()).unwrap();
        assert_eq!(parsed.payload.as_bytes(), payload.as_bytes());
        assert_eq!(parsed, record);
    }

    #[test]
    fn only_text_notes_are_chat() {
        assert!(!RecordKind::TextNote.is_negotiation());
        assert!(RecordKind::Offer.is_negotiation());
        assert!(RecordKind::Answer.is_negotiation());
        assert!(RecordKind::IceCandidate.is_negotiation());
    }
}
