//! Server configuration loaded from TOML or JSON.

use chrono::TimeDelta;
use lfsmon_core::ServiceSettings;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Ten years of minutes.
const MAX_JOB_RETENTION_MINUTES: i64 = 10 * 365 * 24 * 60;

/// Monitor server settings; every field has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Listen address.
    pub bind_addr: SocketAddr,
    /// Bearer token for the read API; none disables auth.
    pub admin_token: Option<String>,
    /// JSON inventory snapshot used to seed the store at startup.
    pub inventory_path: Option<PathBuf>,
    /// How long finished jobs stay listed.
    pub job_retention_minutes: i64,
    /// Page size for listings that omit one.
    pub default_page_size: Option<usize>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8443)),
            admin_token: None,
            inventory_path: None,
            job_retention_minutes: 60,
            default_page_size: None,
        }
    }
}

impl MonitorConfig {
    /// Parses the file by extension and checks the values.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        let config: MonitorConfig = match ext.to_lowercase().as_str() {
            "toml" => toml::from_str(&contents)?,
            "json" => serde_json::from_str(&contents)?,
            _ => anyhow::bail!("Unsupported config file extension: {}", ext),
        };
        config.job_retention()?;
        Ok(config)
    }

    /// Loads the file when it exists, otherwise falls back to defaults.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::warn!("Config file not found, using defaults: {}", path.display());
            Ok(Self::default())
        }
    }

    fn job_retention(&self) -> anyhow::Result<TimeDelta> {
        let minutes = self.job_retention_minutes;
        if !(0..=MAX_JOB_RETENTION_MINUTES).contains(&minutes) {
            anyhow::bail!(
                "job_retention_minutes must be between 0 and {} (got {})",
                MAX_JOB_RETENTION_MINUTES,
                minutes
            );
        }
        TimeDelta::try_minutes(minutes)
            .ok_or_else(|| anyhow::anyhow!("job_retention_minutes out of range: {}", minutes))
    }

    /// Core tunables derived from this config.
    pub fn service_settings(&self) -> anyhow::Result<ServiceSettings> {
        Ok(ServiceSettings {
            job_retention: self.job_retention()?,
            default_page_size: self.default_page_size,
        })
    }
}
