//! Engine configuration, loaded from `canopy.yaml`.

use std::path::Path;

use anyhow::{Context, Result};
use canopy_tree::HashConfig;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "canopy.yaml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Node hash generation for trees created by the engine
    pub hashing: HashConfig,

    /// Defaults for every handler
    pub handler: HandlerConfig,
}

/// Per-handler execution settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Mixed with the agent id and tree id to seed the blackboard RNG
    pub seed: u64,

    /// Node ticks allowed per handler tick; unbounded when absent
    pub max_steps_per_tick: Option<u64>,

    /// Nested Transition jumps allowed within one tick
    #[serde(default = "default_max_transition_depth")]
    pub max_transition_depth: u32,

    /// Emit `bt.open` / `bt.close` / `bt.abandon` trace events
    pub trace_lifecycle: bool,

    /// Keep trace events in an in-memory log on the blackboard
    pub record_trace: bool,
}

fn default_max_transition_depth() -> u32 {
    16
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            max_steps_per_tick: None,
            max_transition_depth: default_max_transition_depth(),
            trace_lifecycle: false,
            record_trace: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        Ok(config)
    }

    /// Load `canopy.yaml` from `dir`, or defaults when there is none
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }
}
