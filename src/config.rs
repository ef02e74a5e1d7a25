//! Runtime configuration for the monitor
//!
//! The heart-rate threshold, phase length and haptic cooldown are fixed
//! constants in [`crate::breathing`]; only plumbing and the cue policy are
//! configurable here.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// What drives the haptic gate while a session is active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HapticCue {
    /// At most one pulse per heart-rate reading that passes the gate.
    #[default]
    OnReading,
    /// A cue timer at the phase's pulse rate drives the gate; readings
    /// never pulse.
    Paced,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub haptic_cue: HapticCue,
    /// Capacity of the command channel feeding the update task.
    pub command_capacity: usize,
    /// Start sampling as soon as authorization is granted.
    pub auto_start: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            haptic_cue: HapticCue::OnReading,
            command_capacity: 64,
            auto_start: true,
        }
    }
}

impl MonitorConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = std::fs::read(path)?;
        let config: MonitorConfig = serde_json::from_slice(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_capacity == 0 {
            return Err(ConfigError::Invalid(
                "command_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn with_haptic_cue(mut self, cue: HapticCue) -> Self {
        self.haptic_cue = cue;
        self
    }
}
