//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

use crate::workflow::DEFAULT_MAX_CAPTURE_ATTEMPTS;

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Certificate owner name (default: "pubkey")
    pub owner: String,

    /// Expect uncompressed public keys (default: false)
    pub uncompressed: bool,

    /// Log level (default: "info")
    pub log: String,

    /// Capture timeout in seconds, 0 blocks forever (default: 0)
    pub capture_timeout_seconds: u64,

    /// Tries per capture step (default: 3)
    pub capture_max_attempts: u32,

    /// Light-on-dark QR rendering (default: true)
    pub qr_invert: bool,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            owner: ksigner_cert::DEFAULT_OWNER.to_string(),
            uncompressed: false,
            log: "info".to_string(),
            capture_timeout_seconds: 0,
            capture_max_attempts: DEFAULT_MAX_CAPTURE_ATTEMPTS,
            qr_invert: true,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "owner": self.owner,
            "uncompressed": self.uncompressed,
            "log": self.log,
            "capture": {
                "timeout_seconds": self.capture_timeout_seconds,
                "max_attempts": self.capture_max_attempts
            },
            "qr": {
                "invert": self.qr_invert
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let defaults = BuiltinDefaults::default();
        assert_eq!(defaults.owner, "pubkey");
        assert!(!defaults.uncompressed);
        assert_eq!(defaults.log, "info");
        assert_eq!(defaults.capture_timeout_seconds, 0);
        assert_eq!(defaults.capture_max_attempts, 3);
        assert!(defaults.qr_invert);
    }

    #[test]
    fn test_to_value() {
        let value = BuiltinDefaults::default().to_value();

        assert_eq!(value["owner"], "pubkey");
        assert_eq!(value["capture"]["max_attempts"], 3);
        assert_eq!(value["qr"]["invert"], true);
    }
}
