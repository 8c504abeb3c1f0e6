//! Sync timing configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timers and circuit-breaker limits for one subscription session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Quiet period after the last notification before refreshing
    pub debounce_ms: u64,
    /// Failures within the window that trip the breaker
    pub failure_threshold: u32,
    pub failure_window_ms: u64,
    /// Poll interval once the breaker has tripped
    pub fallback_poll_ms: u64,
    /// Coarse poll that runs regardless of channel health
    pub safety_poll_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            failure_threshold: 5,
            failure_window_ms: 15_000,
            fallback_poll_ms: 5_000,
            safety_poll_ms: 30_000,
        }
    }
}

impl SyncConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn failure_window(&self) -> Duration {
        Duration::from_millis(self.failure_window_ms)
    }

    pub fn fallback_poll(&self) -> Duration {
        Duration::from_millis(self.fallback_poll_ms.max(1))
    }

    pub fn safety_poll(&self) -> Duration {
        Duration::from_millis(self.safety_poll_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: SyncConfig = serde_json::from_str(r#"{"debounce_ms": 250}"#).unwrap();
        assert_eq!(config.debounce(), Duration::from_millis(250));
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.safety_poll(), Duration::from_secs(30));
    }
}
