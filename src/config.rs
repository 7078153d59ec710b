//! Configuration for the bridge.

use serde::Deserialize;

/// Configuration for the bridge handler and its concurrency services.
#[derive(Clone, Debug, Deserialize)]
pub struct BridgeConfig {
    /// Application name, part of every session identity
    pub app_name: String,

    /// User ID applied when the request omits one
    pub default_user_id: String,

    /// Maximum simultaneous in-flight runs process-wide
    pub max_in_flight_runs: usize,

    /// Age after which an unfinished run may be reclaimed (seconds)
    pub run_stale_after_sec: u64,

    /// Lock acquisition attempts before giving up
    pub lock_retry_count: u32,

    /// Interval between lock acquisition attempts (milliseconds)
    pub lock_retry_interval_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            app_name: "agent".to_string(),
            default_user_id: "anonymous".to_string(),
            max_in_flight_runs: 64,
            run_stale_after_sec: 600, // 10 minutes
            lock_retry_count: 5,
            lock_retry_interval_ms: 500,
        }
    }
}

impl BridgeConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            app_name: std::env::var("AG_UI_BRIDGE_APP_NAME").unwrap_or(defaults.app_name),
            default_user_id: std::env::var("AG_UI_BRIDGE_DEFAULT_USER_ID")
                .unwrap_or(defaults.default_user_id),
            max_in_flight_runs: std::env::var("AG_UI_BRIDGE_MAX_IN_FLIGHT_RUNS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_in_flight_runs),
            run_stale_after_sec: std::env::var("AG_UI_BRIDGE_RUN_STALE_AFTER_SEC")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.run_stale_after_sec),
            lock_retry_count: std::env::var("AG_UI_BRIDGE_LOCK_RETRY_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.lock_retry_count),
            lock_retry_interval_ms: std::env::var("AG_UI_BRIDGE_LOCK_RETRY_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.lock_retry_interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.app_name, "agent");
        assert_eq!(config.default_user_id, "anonymous");
        assert_eq!(config.max_in_flight_runs, 64);
        assert_eq!(config.run_stale_after_sec, 600);
        assert_eq!(config.lock_retry_count, 5);
        assert_eq!(config.lock_retry_interval_ms, 500);
    }
}
