//! Global configuration types.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls
//! auto-save cadence, draft expiry and remote call timeouts.

use serde::{Deserialize, Serialize};

/// Default auto-save cadence (30 seconds).
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 30;
/// Age at which an untouched draft is classified as expired (7 days).
pub const DEFAULT_EXPIRY_THRESHOLD_HOURS: i64 = 168;
/// Idle time after which the "last active N hours ago" notice is shown.
pub const DEFAULT_IDLE_NOTICE_HOURS: i64 = 24;
/// Timeout applied to every store and recovery call.
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 15;

/// Top-level configuration.
///
/// Loaded from `~/.pillars/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Seconds between auto-save ticks.
    #[serde(default = "default_autosave_interval_secs")]
    pub autosave_interval_secs: u64,

    /// Hours after the last save at which a draft counts as expired.
    #[serde(default = "default_expiry_threshold_hours")]
    pub expiry_threshold_hours: i64,

    /// Hours of inactivity before the idle notice is displayed.
    #[serde(default = "default_idle_notice_hours")]
    pub idle_notice_hours: i64,

    /// Seconds before a store or recovery call is abandoned.
    #[serde(default = "default_remote_timeout_secs")]
    pub remote_timeout_secs: u64,
}

fn default_autosave_interval_secs() -> u64 {
    DEFAULT_AUTOSAVE_INTERVAL_SECS
}

fn default_expiry_threshold_hours() -> i64 {
    DEFAULT_EXPIRY_THRESHOLD_HOURS
}

fn default_idle_notice_hours() -> i64 {
    DEFAULT_IDLE_NOTICE_HOURS
}

fn default_remote_timeout_secs() -> u64 {
    DEFAULT_REMOTE_TIMEOUT_SECS
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            autosave_interval_secs: default_autosave_interval_secs(),
            expiry_threshold_hours: default_expiry_threshold_hours(),
            idle_notice_hours: default_idle_notice_hours(),
            remote_timeout_secs: default_remote_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_config_default_values() {
        let config = GlobalConfig::default();
        assert_eq!(config.autosave_interval_secs, 30);
        assert_eq!(config.expiry_threshold_hours, 168);
        assert_eq!(config.idle_notice_hours, 24);
        assert_eq!(config.remote_timeout_secs, 15);
    }

    #[test]
    fn test_global_config_deserialize_with_defaults() {
        let config: GlobalConfig = toml::from_str("").unwrap();
        assert_eq!(config.autosave_interval_secs, 30);
        assert_eq!(config.expiry_threshold_hours, 168);
    }

    #[test]
    fn test_global_config_deserialize_partial() {
        let toml_str = r#"
autosave_interval_secs = 10
expiry_threshold_hours = 72
"#;
        let config: GlobalConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.autosave_interval_secs, 10);
        assert_eq!(config.expiry_threshold_hours, 72);
        assert_eq!(config.idle_notice_hours, 24);
        assert_eq!(config.remote_timeout_secs, 15);
    }
}
