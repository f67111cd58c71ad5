//! Device information captured alongside every save.
//!
//! The snapshot is informational only and never affects draft semantics.
//! Its fingerprint lets the metadata show which device last wrote a draft.

use pillars_types::assessment::META_DEVICE_FINGERPRINT;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

/// Snapshot the environment of the current process.
///
/// Fields: `user_agent`, `platform`, `terminal`, `timezone`, `locale`.
/// Unknown values are recorded as JSON null.
pub fn capture_device_info() -> Map<String, Value> {
    let mut info = Map::new();
    info.insert(
        "user_agent".to_string(),
        json!(format!(
            "pillars/{} ({}; {})",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        )),
    );
    info.insert("platform".to_string(), json!(std::env::consts::OS));
    info.insert("terminal".to_string(), env_value("TERM"));
    info.insert(
        "timezone".to_string(),
        std::env::var("TZ")
            .map(Value::String)
            .unwrap_or_else(|_| json!(chrono::Local::now().offset().to_string())),
    );
    info.insert(
        "locale".to_string(),
        std::env::var("LC_ALL")
            .or_else(|_| std::env::var("LANG"))
            .map(Value::String)
            .unwrap_or(Value::Null),
    );
    info
}

fn env_value(key: &str) -> Value {
    std::env::var(key).map(Value::String).unwrap_or(Value::Null)
}

/// SHA-256 hex digest over the sorted `key=value` pairs of `info`.
pub fn device_fingerprint(info: &Map<String, Value>) -> String {
    let mut pairs: Vec<(&String, &Value)> = info.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));

    let mut hasher = Sha256::new();
    for (key, value) in pairs {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.to_string().as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

/// Metadata entries stamped onto saves from this device.
pub fn device_metadata(info: &Map<String, Value>) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert(
        META_DEVICE_FINGERPRINT.to_string(),
        Value::String(device_fingerprint(info)),
    );
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_has_expected_fields() {
        let info = capture_device_info();
        for field in ["user_agent", "platform", "terminal", "timezone", "locale"] {
            assert!(info.contains_key(field), "missing {field}");
        }
        assert_eq!(info["platform"], json!(std::env::consts::OS));
        assert!(info["user_agent"].as_str().unwrap().starts_with("pillars/"));
    }

    #[test]
    fn test_fingerprint_is_stable_and_hex() {
        let info = capture_device_info();
        let a = device_fingerprint(&info);
        let b = device_fingerprint(&info.clone());
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_changes_with_info() {
        let mut info = Map::new();
        info.insert("platform".to_string(), json!("linux"));
        let before = device_fingerprint(&info);
        info.insert("platform".to_string(), json!("macos"));
        assert_ne!(before, device_fingerprint(&info));
    }

    #[test]
    fn test_device_metadata_carries_fingerprint() {
        let info = capture_device_info();
        let metadata = device_metadata(&info);
        assert_eq!(
            metadata[META_DEVICE_FINGERPRINT],
            json!(device_fingerprint(&info))
        );
    }
}
