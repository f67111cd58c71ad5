//! Global configuration loader.
//!
//! Reads `config.toml` from the data directory (`~/.pillars/` in production)
//! and deserializes it into [`GlobalConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;
use pillars_types::config::GlobalConfig;

/// Auto-save ticks closer than this would hammer the store.
const MIN_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(5);
const MIN_REMOTE_TIMEOUT: Duration = Duration::from_secs(1);
const MIN_EXPIRY_THRESHOLD_HOURS: i64 = 1;

/// Load global configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`GlobalConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    match toml::from_str::<GlobalConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            GlobalConfig::default()
        }
    }
}

/// Auto-save cadence, never below 5 seconds.
pub fn resolve_autosave_interval(config: &GlobalConfig) -> Duration {
    Duration::from_secs(config.autosave_interval_secs).max(MIN_AUTOSAVE_INTERVAL)
}

/// Timeout for store and recovery calls, never below 1 second.
pub fn resolve_remote_timeout(config: &GlobalConfig) -> Duration {
    Duration::from_secs(config.remote_timeout_secs).max(MIN_REMOTE_TIMEOUT)
}

/// Draft expiry threshold, never below 1 hour.
pub fn resolve_expiry_threshold(config: &GlobalConfig) -> TimeDelta {
    TimeDelta::hours(config.expiry_threshold_hours.max(MIN_EXPIRY_THRESHOLD_HOURS))
}

/// Resolve the data directory.
///
/// Uses `PILLARS_DATA_DIR` when set, otherwise `~/.pillars`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PILLARS_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".pillars");
    }

    // Last resort: current directory
    PathBuf::from(".pillars")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_global_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.autosave_interval_secs, 30);
        assert_eq!(config.expiry_threshold_hours, 168);
    }

    #[tokio::test]
    async fn load_global_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            "autosave_interval_secs = 10\nremote_timeout_secs = 5\n",
        )
        .await
        .unwrap();

        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.autosave_interval_secs, 10);
        assert_eq!(config.remote_timeout_secs, 5);
        assert_eq!(config.expiry_threshold_hours, 168);
    }

    #[tokio::test]
    async fn load_global_config_malformed_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "autosave_interval_secs = \"soon\"")
            .await
            .unwrap();

        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.autosave_interval_secs, 30);
    }

    #[test]
    fn resolve_autosave_interval_enforces_floor() {
        let config = GlobalConfig {
            autosave_interval_secs: 1,
            ..Default::default()
        };
        assert_eq!(resolve_autosave_interval(&config), Duration::from_secs(5));
        assert_eq!(
            resolve_autosave_interval(&GlobalConfig::default()),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn resolve_remote_timeout_enforces_floor() {
        let config = GlobalConfig {
            remote_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(resolve_remote_timeout(&config), Duration::from_secs(1));
    }

    #[test]
    fn resolve_expiry_threshold_enforces_floor() {
        let config = GlobalConfig {
            expiry_threshold_hours: -3,
            ..Default::default()
        };
        assert_eq!(resolve_expiry_threshold(&config), TimeDelta::hours(1));
        assert_eq!(
            resolve_expiry_threshold(&GlobalConfig::default()),
            TimeDelta::days(7)
        );
    }
}
