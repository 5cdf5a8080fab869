use std::path::Path;
use std::time::Duration;

use callwire_media::{PeerSessionConfig, DEFAULT_ICE_CANDIDATE_POOL_SIZE, DEFAULT_STUN_URLS};
use callwire_signal::DEFAULT_LOOKBACK;
use serde::{Deserialize, Serialize};

pub(crate) const CONFIG_FILE_NAME: &str = "callwire_config.json";

const DEFAULT_INVITE_FRESHNESS_SECS: u64 = 45;
const DEFAULT_SIGNAL_WINDOW_SECS: u64 = 15;
const DEFAULT_AUTO_REJECT_AFTER_MS: u64 = 3_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) ice_servers: Option<Vec<String>>,
    pub(crate) ice_candidate_pool_size: Option<u8>,
    // How old an invitation snippet may be and still ring.
    pub(crate) invite_freshness_secs: Option<u64>,
    // Records produced this long before call start are still routed.
    pub(crate) signal_window_secs: Option<u64>,
    pub(crate) offer_lookback: Option<usize>,
    pub(crate) auto_reject_after_ms: Option<u64>,
    pub(crate) disable_auto_reject: Option<bool>,
}

pub(crate) fn load_app_config(data_dir: &str) -> AppConfig {
    let path = Path::new(data_dir).join(CONFIG_FILE_NAME);
    let Ok(bytes) = std::fs::read(&path) else {
        return AppConfig::default();
    };
    match serde_json::from_slice::<AppConfig>(&bytes) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), %e, "ignoring unparsable config");
            AppConfig::default()
        }
    }
}

pub(crate) fn default_app_config_json() -> String {
    let defaults = AppConfig {
        ice_servers: Some(DEFAULT_STUN_URLS.iter().map(ToString::to_string).collect()),
        ice_candidate_pool_size: Some(DEFAULT_ICE_CANDIDATE_POOL_SIZE),
        invite_freshness_secs: Some(DEFAULT_INVITE_FRESHNESS_SECS),
        signal_window_secs: Some(DEFAULT_SIGNAL_WINDOW_SECS),
        offer_lookback: Some(DEFAULT_LOOKBACK),
        auto_reject_after_ms: Some(DEFAULT_AUTO_REJECT_AFTER_MS),
        disable_auto_reject: Some(false),
    };
    serde_json::to_string_pretty(&defaults).unwrap_or_else(|_| "{}".to_string())
}

impl AppConfig {
    pub(crate) fn peer_session_config(&self) -> PeerSessionConfig {
        let pool = self
            .ice_candidate_pool_size
            .unwrap_or(DEFAULT_ICE_CANDIDATE_POOL_SIZE);
        match &self.ice_servers {
            Some(urls) if urls.iter().any(|u| !u.trim().is_empty()) => PeerSessionConfig::from_urls(
                urls.iter()
                    .map(|u| u.trim())
                    .filter(|u| !u.is_empty())
                    .map(ToString::to_string),
                pool,
            ),
            _ => PeerSessionConfig::from_urls(DEFAULT_STUN_URLS, pool),
        }
    }

    pub(crate) fn invite_freshness_ms(&self) -> i64 {
        secs_to_ms(
            self.invite_freshness_secs
                .unwrap_or(DEFAULT_INVITE_FRESHNESS_SECS),
        )
    }

    pub(crate) fn signal_window_ms(&self) -> i64 {
        secs_to_ms(self.signal_window_secs.unwrap_or(DEFAULT_SIGNAL_WINDOW_SECS))
    }

    pub(crate) fn offer_lookback(&self) -> usize {
        self.offer_lookback
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_LOOKBACK)
    }

    /// `None` when automated peers should be left ringing.
    pub(crate) fn auto_reject_delay(&self) -> Option<Duration> {
        if self.disable_auto_reject == Some(true) {
            return None;
        }
        Some(Duration::from_millis(
            self.auto_reject_after_ms
                .unwrap_or(DEFAULT_AUTO_REJECT_AFTER_MS),
        ))
    }
}

fn secs_to_ms(secs: u64) -> i64 {
    i64::try_from(secs.saturating_mul(1_000)).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_app_config(dir.path().to_str().unwrap());
        assert_eq!(cfg.invite_freshness_ms(), 45_000);
        assert_eq!(cfg.signal_window_ms(), 15_000);
        assert_eq!(cfg.offer_lookback(), 30);
        assert_eq!(cfg.auto_reject_delay(), Some(Duration::from_millis(3_000)));
        assert_eq!(cfg.peer_session_config(), PeerSessionConfig::default());
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"signal_window_secs": 5, "ice_servers": ["stun:example.org:3478"]}"#,
        )
        .unwrap();
        let cfg = load_app_config(dir.path().to_str().unwrap());
        assert_eq!(cfg.signal_window_ms(), 5_000);
        assert_eq!(cfg.invite_freshness_ms(), 45_000);
        let peer = cfg.peer_session_config();
        assert_eq!(peer.ice_servers.len(), 1);
        assert_eq!(peer.ice_candidate_pool_size, 10);
    }

    #[test]
    fn garbage_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), b"{not json").unwrap();
        let cfg = load_app_config(dir.path().to_str().unwrap());
        assert_eq!(cfg.offer_lookback(), 30);
    }

    #[test]
    fn auto_reject_can_be_disabled() {
        let cfg = AppConfig {
            disable_auto_reject: Some(true),
            ..Default::default()
        };
        assert_eq!(cfg.auto_reject_delay(), None);
    }

    #[test]
    fn default_json_parses_back() {
        let json = default_app_config_json();
        let cfg: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.ice_servers.as_ref().map(Vec::len), Some(5));
        assert_eq!(cfg.auto_reject_after_ms, Some(3_000));
    }
}
