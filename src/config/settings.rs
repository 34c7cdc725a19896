use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{Result, WardenError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub store: StoreConfig,
    pub staleness: StalenessConfig,
    pub registry: RegistryConfig,
    pub guidance: GuidanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Seconds to wait for the writer lock before giving up.
    pub lock_timeout_secs: u64,
    /// Access-history entries retained per task.
    pub history_cap: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout_secs: 5,
            history_cap: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StalenessConfig {
    pub threshold_minutes: u64,
}

impl Default for StalenessConfig {
    fn default() -> Self {
        Self {
            threshold_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub inactive_minutes: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            inactive_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidanceConfig {
    pub repetition_window_minutes: u64,
    pub repetition_threshold: usize,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            repetition_window_minutes: 60,
            repetition_threshold: 3,
        }
    }
}

impl WardenConfig {
    pub async fn load(warden_dir: &Path) -> Result<Self> {
        let config_path = warden_dir.join("config.toml");
        let config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).await?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, warden_dir: &Path) -> Result<()> {
        self.validate()?;
        let config_path = warden_dir.join("config.toml");
        let content =
            toml::to_string_pretty(self).map_err(|e| WardenError::Config(e.to_string()))?;
        fs::write(&config_path, content).await?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.store.lock_timeout_secs == 0 {
            errors.push("store.lock_timeout_secs must be greater than 0");
        }
        if self.store.history_cap == 0 {
            errors.push("store.history_cap must be greater than 0");
        }
        if self.staleness.threshold_minutes == 0 {
            errors.push("staleness.threshold_minutes must be greater than 0");
        }
        if self.registry.inactive_minutes == 0 {
            errors.push("registry.inactive_minutes must be greater than 0");
        }
        if self.guidance.repetition_window_minutes == 0 {
            errors.push("guidance.repetition_window_minutes must be greater than 0");
        }
        if self.guidance.repetition_threshold < 2 {
            errors.push("guidance.repetition_threshold must be at least 2");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(WardenError::Config(errors.join("; ")))
        }
    }
}
