//! Session config loader (strict parsing).

use std::time::Duration;

use serde::Deserialize;

use gclink_core::{GcError, Result};

/// Tunables for one GC session. Defaults are safe for production; tests
/// shrink the timeouts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// The game this session speaks for. Messages addressed to any other
    /// app id are ignored without logging.
    pub app_id: u32,
    /// Upper bound on waiting for the coordinator's craft response.
    pub craft_response_timeout_ms: u64,
    /// Poll cadence while waiting for crafted/merged item ids to land.
    pub item_poll_interval_ms: u64,
    /// Upper bound on the poll above.
    pub item_wait_timeout_ms: u64,
    /// Backoff before the single retry of a failed inventory fetch.
    pub rest_retry_backoff_ms: u64,
    /// Upper bound on waiting for the session to re-establish during
    /// restart recovery.
    pub restart_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            app_id: 440,
            craft_response_timeout_ms: 30_000,
            item_poll_interval_ms: 100,
            item_wait_timeout_ms: 30_000,
            rest_retry_backoff_ms: 500,
            restart_timeout_ms: 60_000,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.app_id == 0 {
            return Err(GcError::Config("app_id must be non-zero".into()));
        }
        if self.item_poll_interval_ms == 0 {
            return Err(GcError::Config("item_poll_interval_ms must be non-zero".into()));
        }
        for (name, v) in [
            ("craft_response_timeout_ms", self.craft_response_timeout_ms),
            ("item_wait_timeout_ms", self.item_wait_timeout_ms),
            ("restart_timeout_ms", self.restart_timeout_ms),
        ] {
            if v == 0 {
                return Err(GcError::Config(format!("{name} must be non-zero")));
            }
        }
        Ok(())
    }

    pub fn craft_response_timeout(&self) -> Duration {
        Duration::from_millis(self.craft_response_timeout_ms)
    }

    pub fn item_poll_interval(&self) -> Duration {
        Duration::from_millis(self.item_poll_interval_ms)
    }

    pub fn item_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.item_wait_timeout_ms)
    }

    pub fn rest_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.rest_retry_backoff_ms)
    }

    pub fn restart_timeout(&self) -> Duration {
        Duration::from_millis(self.restart_timeout_ms)
    }
}

pub fn load_from_str(s: &str) -> Result<SessionConfig> {
    let cfg: SessionConfig =
        serde_yaml::from_str(s).map_err(|e| GcError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn yaml_overrides_defaults() {
        let cfg = load_from_str("app_id: 570\ncraft_response_timeout_ms: 5000\n")
            .expect("valid config");
        assert_eq!(cfg.app_id, 570);
        assert_eq!(cfg.craft_response_timeout_ms, 5_000);
        assert_eq!(cfg.item_poll_interval_ms, 100);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(load_from_str("app_id: 440\nretries: 9\n").is_err());
    }

    #[test]
    fn zero_app_id_is_rejected() {
        assert!(load_from_str("app_id: 0\n").is_err());
    }
}
