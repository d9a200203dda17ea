//! Layered configuration
//!
//! 1. Built-in defaults
//! 2. User config (`--config <path>`, else `~/.config/ksigner/config.toml`)
//! 3. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::BuiltinDefaults;
pub use effective::{
    default_config_path, CaptureConfig, ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig,
    KsignerConfig, QrConfig, MAX_CAPTURE_ATTEMPTS, MAX_TIMEOUT_SECONDS,
};
pub use merge::{deep_merge, merge_layers};
