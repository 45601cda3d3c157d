//! Persistent CLI settings

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use nuvo_control::{ControllerConfig, SerialSettings};
use nuvo_sim::VirtualAmplifierConfig;
use serde::{Deserialize, Serialize};

/// How `nuvoctl` reaches the amplifier
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    #[default]
    Serial,
    Simulated,
}

/// Settings loaded from `settings.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub connection_type: ConnectionType,
    /// Serial port path (if connection_type is "serial")
    pub port: String,
    pub baud_rate: u32,
    /// Per-byte serial read timeout
    pub read_timeout_ms: u64,
    /// Deadline for each reply
    pub response_timeout_ms: u64,
    /// Extra status attempts after the first
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Amplifier to emulate (if connection_type is "simulated")
    pub simulator: VirtualAmplifierConfig,
}

impl Default for Settings {
    fn default() -> Self {
        let serial = SerialSettings::new("");
        let controller = ControllerConfig::default();
        Self {
            connection_type: ConnectionType::Serial,
            port: serial.port,
            baud_rate: serial.baud_rate,
            read_timeout_ms: serial.read_timeout.as_millis() as u64,
            response_timeout_ms: controller.response_timeout.as_millis() as u64,
            max_retries: controller.max_retries,
            retry_delay_ms: controller.retry_delay.as_millis() as u64,
            simulator: VirtualAmplifierConfig::default(),
        }
    }
}

impl Settings {
    /// Get the XDG config directory for nuvo
    /// Uses $XDG_CONFIG_HOME/nuvo on Linux/macOS, falls back to ~/.config/nuvo
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("nuvo"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("nuvo"))
    }

    /// Default settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings, falling back to defaults if the file is missing or unreadable
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| match serde_json::from_str(&s) {
                Ok(settings) => Some(settings),
                Err(e) => {
                    tracing::warn!("Ignoring invalid settings file {}: {}", path.display(), e);
                    None
                }
            })
            .unwrap_or_default()
    }

    /// Save settings to disk
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create settings directory {}", parent.display())
            })?;
        }

        let json = serde_json::to_string_pretty(self).context("failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write settings to {}", path.display()))?;

        Ok(())
    }

    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings {
            port: self.port.clone(),
            baud_rate: self.baud_rate,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            response_timeout: Duration::from_millis(self.response_timeout_ms),
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}
