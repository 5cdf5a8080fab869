use serde::{Deserialize, Serialize};

pub const DEFAULT_STUN_URLS: [&str; 5] = [
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
    "stun:stun2.l.google.com:19302",
    "stun:stun3.l.google.com:19302",
    "stun:stun4.l.google.com:19302",
];

pub const DEFAULT_ICE_CANDIDATE_POOL_SIZE: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSessionConfig {
    pub ice_servers: Vec<IceServer>,
    pub ice_candidate_pool_size: u8,
}

impl PeerSessionConfig {
    /// Build from plain server URLs, one server entry per URL.
    pub fn from_urls<I, S>(urls: I, ice_candidate_pool_size: u8) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ice_servers: urls.into_iter().map(IceServer::stun).collect(),
            ice_candidate_pool_size,
        }
    }
}

impl Default for PeerSessionConfig {
    fn default() -> Self {
        Self::from_urls(DEFAULT_STUN_URLS, DEFAULT_ICE_CANDIDATE_POOL_SIZE)
    }
}
