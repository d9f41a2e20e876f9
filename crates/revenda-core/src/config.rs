//! Revenda configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, RevendaError};

/// Root configuration, loaded from `~/.revenda/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevendaConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

fn default_db_path() -> String {
    RevendaConfig::home_dir()
        .join("revenda.db")
        .to_string_lossy()
        .into_owned()
}

impl Default for RevendaConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            webhook: WebhookConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl RevendaConfig {
    /// Load config from the default path, or defaults if absent.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RevendaError::Config(format!("failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| RevendaError::Config(format!("failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| RevendaError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".revenda")
    }
}

/// Outbound webhook settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Per-request timeout. Matches the connection-management webhooks
    /// elsewhere in the panel.
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
}

fn default_webhook_timeout() -> u64 {
    15
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_webhook_timeout(),
        }
    }
}

/// Scheduler loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Wake times used only when no active automation config exists to
    /// derive the set from. `HH:MM`, civil (GMT-3).
    #[serde(default = "default_fallback_wake_times")]
    pub fallback_wake_times: Vec<String>,
}

fn default_fallback_wake_times() -> Vec<String> {
    vec!["09:30".into(), "10:00".into(), "19:30".into()]
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fallback_wake_times: default_fallback_wake_times(),
        }
    }
}
