//! Configuration loading and management.
//!
//! Loads convoke configuration from `./convoke.toml` (or
//! `$CONVOKE_CONFIG_PATH`). Environment variables override file values;
//! file values override defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::engine::delay::DelayPolicy;
use crate::engine::DEFAULT_INVITE_MESSAGE;

/// Top-level convoke configuration loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConvokeConfig {
    /// Inter-target delay settings (`[delay]`).
    pub delay: DelayConfig,
    /// Invite-link fallback settings (`[fallback]`).
    pub fallback: FallbackConfig,
    /// Log output settings (`[logging]`).
    pub logging: LoggingConfig,
}

/// `[delay]` section: base delay range and strategy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    /// Lower bound of the base delay range, in seconds.
    pub min_seconds: f64,
    /// Upper bound of the base delay range, in seconds.
    pub max_seconds: f64,
    /// Use the history-aware adaptive strategy instead of fixed sampling.
    pub adaptive: bool,
}

impl Default for DelayConfig {
    fn default() -> Self {
        // The balanced preset.
        Self {
            min_seconds: 3.0,
            max_seconds: 6.0,
            adaptive: false,
        }
    }
}

impl DelayConfig {
    /// Build the engine policy from this section.
    ///
    /// # Errors
    ///
    /// Returns an error when the bounds are unusable.
    pub fn policy(&self) -> Result<DelayPolicy> {
        let policy = if self.adaptive {
            DelayPolicy::Adaptive {
                min: self.min_seconds,
                max: self.max_seconds,
            }
        } else {
            DelayPolicy::Fixed {
                min: self.min_seconds,
                max: self.max_seconds,
            }
        };
        policy.validate().context("invalid [delay] configuration")?;
        Ok(policy)
    }
}

/// `[fallback]` section: invite-link dispatch for non-addable accounts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Send invite links to accounts that could not be added directly.
    pub enabled: bool,
    /// Message template; `{title}` and `{link}` are substituted at send time.
    pub invite_message: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            invite_message: DEFAULT_INVITE_MESSAGE.to_owned(),
        }
    }
}

/// `[logging]` section: file log location and default level.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for rotated JSON log files.
    pub dir: String,
    /// Default level filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: "logs".to_owned(),
            level: "info".to_owned(),
        }
    }
}

impl ConvokeConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// Config file path: `$CONVOKE_CONFIG_PATH` or `./convoke.toml`.
    /// A missing file is not an error; defaults apply.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from the TOML file only, no env overrides.
    fn load_from_file() -> Result<Self> {
        let path = Self::config_path_with(|key| std::env::var(key).ok());
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                let config: ConvokeConfig =
                    toml::from_str(&contents).context("failed to parse config TOML")?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no config file found, using defaults");
                Ok(ConvokeConfig::default())
            }
            Err(e) => Err(anyhow::anyhow!("failed to read config file: {e}")),
        }
    }

    /// Resolve the config path using a custom env resolver (for testing).
    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        if let Some(p) = env("CONVOKE_CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("convoke.toml")
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability (avoids unsafe `set_var`
    /// in tests).
    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("CONVOKE_DELAY_MIN") {
            match v.parse() {
                Ok(n) => self.delay.min_seconds = n,
                Err(_) => warn_invalid("CONVOKE_DELAY_MIN", &v),
            }
        }
        if let Some(v) = env("CONVOKE_DELAY_MAX") {
            match v.parse() {
                Ok(n) => self.delay.max_seconds = n,
                Err(_) => warn_invalid("CONVOKE_DELAY_MAX", &v),
            }
        }
        if let Some(v) = env("CONVOKE_DELAY_ADAPTIVE") {
            match v.parse() {
                Ok(b) => self.delay.adaptive = b,
                Err(_) => warn_invalid("CONVOKE_DELAY_ADAPTIVE", &v),
            }
        }
        if let Some(v) = env("CONVOKE_FALLBACK_ENABLED") {
            match v.parse() {
                Ok(b) => self.fallback.enabled = b,
                Err(_) => warn_invalid("CONVOKE_FALLBACK_ENABLED", &v),
            }
        }
        if let Some(v) = env("CONVOKE_INVITE_MESSAGE") {
            self.fallback.invite_message = v;
        }
        if let Some(v) = env("CONVOKE_LOG_DIR") {
            self.logging.dir = v;
        }
        if let Some(v) = env("CONVOKE_LOG_LEVEL") {
            self.logging.level = v;
        }
    }
}

fn warn_invalid(var: &str, value: &str) {
    tracing::warn!(var, value, "ignoring invalid env override");
}
