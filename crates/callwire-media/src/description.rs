//! Wire payloads for negotiation records.
//!
//! Both types serialize to the JSON shapes browsers use for
//! `RTCSessionDescriptionInit` and `RTCIceCandidateInit`, so payloads written
//! here can be consumed by a web peer unchanged.

use serde::{Deserialize, Serialize};

use crate::error::MediaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, MediaError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, MediaError> {
        let desc: Self = serde_json::from_str(json)
            .map_err(|e| MediaError::InvalidDescription(e.to_string()))?;
        if desc.sdp.trim().is_empty() {
            return Err(MediaError::InvalidDescription("empty sdp".to_string()));
        }
        Ok(desc)
    }

    /// Media kinds of the `m=` sections, in order.
    pub fn media_sections(&self) -> Vec<String> {
        self.sdp
            .lines()
            .filter_map(|line| line.trim_end().strip_prefix("m="))
            .filter_map(|rest| rest.split_whitespace().next())
            .map(ToString::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default)]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }

    pub fn with_sdp_mid(mut self, sdp_mid: impl Into<String>) -> Self {
        self.sdp_mid = Some(sdp_mid.into());
        self
    }

    pub fn with_sdp_m_line_index(mut self, index: u16) -> Self {
        self.sdp_m_line_index = Some(index);
        self
    }

    pub fn to_json(&self) -> Result<String, MediaError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and validate a candidate payload.
    ///
    /// Anything that is not JSON of the expected shape, or whose candidate line
    /// does not start with `candidate:`, is malformed.
    pub fn from_json(json: &str) -> Result<Self, MediaError> {
        let candidate: Self = serde_json::from_str(json)
            .map_err(|e| MediaError::MalformedCandidate(e.to_string()))?;
        candidate.validate()?;
        Ok(candidate)
    }

    pub fn validate(&self) -> Result<(), MediaError> {
        if !self.candidate.starts_with("candidate:") {
            return Err(MediaError::MalformedCandidate(format!(
                "unexpected candidate line: {:?}",
                self.candidate
            )));
        }
        if self.sdp_mid.is_none() && self.sdp_m_line_index.is_none() {
            return Err(MediaError::MalformedCandidate(
                "candidate has neither sdpMid nor sdpMLineIndex".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_uses_browser_field_names() {
        let desc = SessionDescription::offer("v=0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\n");
        let json = desc.to_json().unwrap();
        assert!(json.contains("\"type\":\"offer\""));
        assert!(json.contains("\"sdp\":"));
        assert_eq!(SessionDescription::from_json(&json).unwrap(), desc);
    }

    #[test]
    fn parses_browser_description() {
        let json = r#"{"type":"answer","sdp":"v=0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\nm=video 9 UDP/TLS/RTP/SAVPF 96\r\n"}"#;
        let desc = SessionDescription::from_json(json).unwrap();
        assert_eq!(desc.sdp_type, SdpType::Answer);
        assert_eq!(desc.media_sections(), vec!["audio", "video"]);
    }

    #[test]
    fn rejects_empty_description() {
        let err = SessionDescription::from_json(r#"{"type":"offer","sdp":"  "}"#).unwrap_err();
        assert!(matches!(err, MediaError::InvalidDescription(_)));
        assert!(SessionDescription::from_json("not json").is_err());
    }

    #[test]
    fn candidate_uses_browser_field_names() {
        let json = r#"{"candidate":"candidate:1 1 udp 2130706431 192.168.1.10 54321 typ host","sdpMid":"0","sdpMLineIndex":0,"usernameFragment":"abcd"}"#;
        let cand = IceCandidate::from_json(json).unwrap();
        assert_eq!(cand.sdp_mid.as_deref(), Some("0"));
        assert_eq!(cand.sdp_m_line_index, Some(0));
        assert_eq!(cand.username_fragment.as_deref(), Some("abcd"));

        let back = IceCandidate::from_json(&cand.to_json().unwrap()).unwrap();
        assert_eq!(back, cand);
    }

    #[test]
    fn malformed_candidates_are_rejected() {
        for bad in [
            "garbage",
            r#"{"sdpMid":"0"}"#,
            r#"{"candidate":"hello","sdpMid":"0"}"#,
            r#"{"candidate":"candidate:1 1 udp 1 10.0.0.1 9 typ host"}"#,
        ] {
            let err = IceCandidate::from_json(bad).unwrap_err();
            assert!(matches!(err, MediaError::MalformedCandidate(_)), "{bad}");
        }
    }
}
