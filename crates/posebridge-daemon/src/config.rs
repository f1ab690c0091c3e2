//! Configuration loading and validation

use anyhow::Result;
use posebridge_core::{
    FeederConfig, Universe, DEFAULT_SELF_TRACKING_SYSTEM, DEFAULT_TICKS_PER_SECOND,
};
use posebridge_ipc::{default_socket_path, SocketBridgeConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feeder: FeederSection,
    #[serde(default)]
    pub actions: ActionsConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeederSection {
    /// Passes per second
    #[serde(default = "default_tps")]
    pub tps: u32,
    /// Tracking space poses are requested in
    #[serde(default)]
    pub universe: Universe,
    /// Driver name of the trackers the server itself creates
    #[serde(default = "default_self_tracking_system")]
    pub self_tracking_system: String,
    /// Reset delivery state when a role moves to another device
    #[serde(default)]
    pub reset_on_reassign: bool,
}

impl Default for FeederSection {
    fn default() -> Self {
        Self {
            tps: default_tps(),
            universe: Universe::default(),
            self_tracking_system: default_self_tracking_system(),
            reset_on_reassign: false,
        }
    }
}

fn default_tps() -> u32 {
    DEFAULT_TICKS_PER_SECOND
}

fn default_self_tracking_system() -> String {
    DEFAULT_SELF_TRACKING_SYSTEM.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionsConfig {
    /// Path to the action manifest handed to the runtime
    #[serde(default = "default_manifest")]
    pub manifest: String,
    #[serde(default = "default_action_set")]
    pub action_set: String,
    /// One-shot buttons forwarded as named events
    #[serde(default = "default_digital")]
    pub digital: Vec<DigitalActionConfig>,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            manifest: default_manifest(),
            action_set: default_action_set(),
            digital: default_digital(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigitalActionConfig {
    pub path: String,
    /// Event name sent on press; unnamed actions are read but not forwarded
    pub event: Option<String>,
}

fn default_manifest() -> String {
    "./bindings/actions.json".to_string()
}

fn default_action_set() -> String {
    "/actions/main".to_string()
}

fn default_digital() -> Vec<DigitalActionConfig> {
    vec![
        DigitalActionConfig {
            path: "/actions/main/in/request_calibration".to_string(),
            event: Some("calibrate".to_string()),
        },
        DigitalActionConfig {
            path: "/actions/main/in/confirm".to_string(),
            event: Some("Confirm".to_string()),
        },
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Server socket path
    #[serde(default = "default_socket_path")]
    pub socket: PathBuf,
    /// Delay between connection attempts in milliseconds
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_ms: u64,
    /// Outbound frames buffered while the server is slow
    #[serde(default = "default_queue_limit")]
    pub queue_limit: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            socket: default_socket_path(),
            reconnect_interval_ms: default_reconnect_interval(),
            queue_limit: default_queue_limit(),
        }
    }
}

fn default_reconnect_interval() -> u64 {
    1000
}

fn default_queue_limit() -> usize {
    1024
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Scene file for the simulated runtime
    #[serde(default)]
    pub scene: Option<PathBuf>,
}

impl Config {
    /// Convert to FeederConfig
    pub fn to_feeder_config(&self) -> FeederConfig {
        FeederConfig {
            universe: self.feeder.universe,
            action_manifest: self.actions.manifest.clone(),
            action_set: self.actions.action_set.clone(),
            self_tracking_system: self.feeder.self_tracking_system.clone(),
            reset_on_reassign: self.feeder.reset_on_reassign,
            digital_actions: self
                .actions
                .digital
                .iter()
                .map(|d| (d.path.clone(), d.event.clone()))
                .collect(),
        }
    }

    /// Convert to SocketBridgeConfig
    pub fn to_bridge_config(&self) -> SocketBridgeConfig {
        SocketBridgeConfig {
            path: self.bridge.socket.clone(),
            reconnect_interval: Duration::from_millis(self.bridge.reconnect_interval_ms),
            queue_limit: self.bridge.queue_limit,
        }
    }

    /// Write a pretty-printed default configuration
    pub fn save_default(path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(&Config::default())?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}
