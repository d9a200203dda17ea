//! Effective configuration with provenance
//!
//! The merged layers are deserialized into [`KsignerConfig`] and validated.
//! Each contributing source is recorded so `--log debug` can show where the
//! values came from.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ksigner_cert::KeyFormat;

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;
use crate::logging;

/// Largest accepted capture timeout (one day)
pub const MAX_TIMEOUT_SECONDS: u64 = 86_400;

/// Largest accepted number of capture attempts
pub const MAX_CAPTURE_ATTEMPTS: u32 = 100;

/// Origin of a configuration source
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigOrigin {
    Builtin,
    User,
    Cli,
}

/// A contributing config source with provenance
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/cli)
    pub digest: Option<String>,
}

/// `[capture]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaptureConfig {
    /// 0 blocks until a decode or a cancel
    pub timeout_seconds: u64,
    pub max_attempts: u32,
}

impl CaptureConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }
}

/// `[qr]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QrConfig {
    pub invert: bool,
}

/// Typed, validated configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KsignerConfig {
    pub owner: String,
    pub uncompressed: bool,
    pub log: String,
    pub capture: CaptureConfig,
    pub qr: QrConfig,
}

impl KsignerConfig {
    pub fn key_format(&self) -> KeyFormat {
        KeyFormat::from_uncompressed_flag(self.uncompressed)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.capture.max_attempts == 0 || self.capture.max_attempts > MAX_CAPTURE_ATTEMPTS {
            return Err(ConfigError::ValidationError(format!(
                "capture.max_attempts must be in [1, {}]",
                MAX_CAPTURE_ATTEMPTS
            )));
        }
        if self.capture.timeout_seconds > MAX_TIMEOUT_SECONDS {
            return Err(ConfigError::ValidationError(format!(
                "capture.timeout_seconds must be at most {}",
                MAX_TIMEOUT_SECONDS
            )));
        }
        ksigner_cert::validate_owner(&self.owner)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        logging::normalize_level(&self.log)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        Ok(())
    }
}

/// Effective configuration plus the sources that produced it
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub config: KsignerConfig,
    pub sources: Vec<ConfigSource>,
}

impl EffectiveConfig {
    /// Resolve the user config file and build.
    ///
    /// An explicit path must exist. Without one, the default location is
    /// used when present and skipped otherwise.
    pub fn load(explicit: Option<&Path>, cli_overrides: Option<Value>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) if !path.exists() => Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Self::build(Some(path), cli_overrides),
            None => {
                let default = default_config_path().filter(|path| path.exists());
                Self::build(default.as_deref(), cli_overrides)
            }
        }
    }

    /// Build from defaults, an optional user file and CLI overrides.
    pub fn build(user_config_path: Option<&Path>, cli_overrides: Option<Value>) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        if let Some(path) = user_config_path {
            let (value, digest) = load_toml_file(path)?;
            layers.push(value);
            sources.push(ConfigSource {
                origin: ConfigOrigin::User,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(layers);
        let config: KsignerConfig = serde_json::from_value(merged)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;

        Ok(Self { config, sources })
    }
}

/// `$XDG_CONFIG_HOME/ksigner/config.toml`, falling back to `~/.config`.
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .map(|dir| dir.join("ksigner").join("config.toml"))
}

/// Load and parse a TOML file, returning the value and digest
fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
    let bytes = fs::read(path)
        .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hex::encode(hasher.finalize());

    let contents = String::from_utf8(bytes)
        .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;
    let toml_value: toml::Value = toml::from_str(&contents)
        .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;

    Ok((toml_to_json(toml_value), digest))
}

fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn toml_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_build_with_defaults_only() {
        let effective = EffectiveConfig::build(None, None).unwrap();

        assert_eq!(effective.config.owner, "pubkey");
        assert_eq!(effective.config.key_format(), KeyFormat::Compressed);
        assert_eq!(effective.config.capture.timeout(), None);
        assert_eq!(effective.sources.len(), 1);
    }

    #[test]
    fn test_user_file_then_cli() {
        let file = toml_file(
            "owner = \"alice\"\nuncompressed = true\n[capture]\ntimeout_seconds = 45\n",
        );
        let cli = serde_json::json!({"owner": "bob"});

        let effective = EffectiveConfig::build(Some(file.path()), Some(cli)).unwrap();
        let config = &effective.config;

        assert_eq!(config.owner, "bob");
        assert!(config.uncompressed);
        assert_eq!(config.capture.timeout(), Some(Duration::from_secs(45)));
        assert_eq!(config.capture.max_attempts, 3);
        assert_eq!(effective.sources[1].origin, ConfigOrigin::User);
        assert_eq!(effective.sources[1].digest.as_ref().map(String::len), Some(64));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let file = toml_file("ownr = \"typo\"\n");
        let result = EffectiveConfig::build(Some(file.path()), None);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validation_max_attempts() {
        let cli = serde_json::json!({"capture": {"max_attempts": 0}});
        let err = EffectiveConfig::build(None, Some(cli)).unwrap_err();
        assert!(err.to_string().contains("capture.max_attempts"));
    }

    #[test]
    fn test_validation_timeout() {
        let cli = serde_json::json!({"capture": {"timeout_seconds": 90_000}});
        let err = EffectiveConfig::build(None, Some(cli)).unwrap_err();
        assert!(err.to_string().contains("capture.timeout_seconds"));
    }

    #[test]
    fn test_validation_owner_and_log() {
        let cli = serde_json::json!({"owner": "a/b"});
        assert!(matches!(
            EffectiveConfig::build(None, Some(cli)),
            Err(ConfigError::ValidationError(_))
        ));

        let cli = serde_json::json!({"log": "chatty"});
        assert!(matches!(
            EffectiveConfig::build(None, Some(cli)),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_invalid_toml() {
        let file = toml_file("owner = \n");
        let result = EffectiveConfig::build(Some(file.path()), None);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_explicit_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        let result = EffectiveConfig::load(Some(&missing), None);
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }
}
