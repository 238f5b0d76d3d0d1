//! Configuration resolution for the bridge.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (`<config dir>/vhbridge/settings.json`)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables
//! 5. CLI arguments (applied by the binary)
//!
//! Files are merged key by key, so an overlay only needs the fields it
//! changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::codec::{ActorRegistry, GazeGeometry};
use crate::error::{Error, Result};

/// Complete bridge configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Characters the translator can address.
    pub actors: ActorRegistry,
    /// Calibration for spatial → gaze translation.
    pub gaze: GazeGeometry,
    pub topics: TopicConfig,
    pub launcher: LauncherConfig,
}

/// Topic names on the PSI side and control prefixes on the VHT side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    /// Topic carrying `multimodal:false` utterances.
    pub text: String,
    /// Topic carrying `multimodal:true` positions.
    pub location: String,
    /// Topics routed to the launcher control queue instead of the relay.
    pub control: Vec<String>,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            text: "PSI_VHT_Text".to_string(),
            location: "PSI_NVBG_Location".to_string(),
            control: vec!["launcher".to_string(), "vrProcEnd".to_string()],
        }
    }
}

impl TopicConfig {
    pub fn is_control(&self, topic: &str) -> bool {
        self.control.iter().any(|t| t == topic)
    }
}

/// Character selection and launcher control settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Character addressed until a launcher reply says otherwise.
    pub default_character: String,
    /// How long to wait for a `launcher char` reply.
    pub character_query_timeout_ms: u64,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            default_character: "Brad".to_string(),
            character_query_timeout_ms: 5_000,
        }
    }
}

impl LauncherConfig {
    pub const fn character_query_timeout(&self) -> Duration {
        Duration::from_millis(self.character_query_timeout_ms)
    }
}

impl Config {
    /// Reject combinations the relay cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !self.actors.contains(&self.launcher.default_character) {
            return Err(Error::Config(format!(
                "default character {:?} is not a configured actor",
                self.launcher.default_character
            )));
        }
        if !self.gaze.calibration_offset.is_finite() || !self.gaze.distance.is_finite() {
            return Err(Error::Config("gaze geometry must be finite".into()));
        }
        if self.topics.text.is_empty() || self.topics.location.is_empty() {
            return Err(Error::Config("topic names must not be empty".into()));
        }
        Ok(())
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut merged = serde_json::to_value(Config::default())?;

    if let Some(global_path) = global_config_path()
        && global_path.exists()
    {
        debug!(path = %global_path.display(), "Loading global config");
        merge_value(&mut merged, load_config_file(&global_path)?);
    }

    if let Some(path) = explicit {
        debug!(path = %path.display(), "Loading config file");
        merge_value(&mut merged, load_config_file(path)?);
    }

    let mut config: Config = serde_json::from_value(merged)
        .map_err(|e| Error::Config(format!("Invalid configuration: {e}")))?;
    apply_env_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("vhbridge").join("settings.json"))
}

fn load_config_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

/// Recursively overlay objects; any non-object value replaces the base.
fn merge_value(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_value(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn apply_env_overrides(config: &mut Config) {
    apply_overrides(config, |key| std::env::var(key).ok());
}

fn apply_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(val) = var("VHBRIDGE_CHARACTER") {
        config.launcher.default_character = val;
    }
    if let Some(n) = var("VHBRIDGE_CALIBRATION_OFFSET").and_then(|v| v.parse().ok()) {
        config.gaze.calibration_offset = n;
    }
    if let Some(n) = var("VHBRIDGE_DISTANCE").and_then(|v| v.parse().ok()) {
        config.gaze.distance = n;
    }
    if let Some(val) = var("VHBRIDGE_TEXT_TOPIC") {
        config.topics.text = val;
    }
    if let Some(val) = var("VHBRIDGE_LOCATION_TOPIC") {
        config.topics.location = val;
    }
}
