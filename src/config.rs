use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::analysis::reachability::{ExplorationBudget, ExplorationMode, StateGraphConfig};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct PnConfig {
    #[serde(default)]
    pub mode: ExplorationMode,
    #[serde(default = "default_state_limit")]
    pub state_limit: Option<usize>,
    #[serde(default)]
    pub depth_limit: Option<usize>,
    /// Where `.dot` renderings of the net and its state graph are written.
    #[serde(default)]
    pub dot_dir: Option<PathBuf>,
}

impl Default for PnConfig {
    fn default() -> Self {
        Self {
            mode: ExplorationMode::default(),
            state_limit: default_state_limit(),
            depth_limit: None,
            dot_dir: None,
        }
    }
}

impl PnConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: PnConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    pub fn budget(&self) -> ExplorationBudget {
        ExplorationBudget {
            max_states: self.state_limit,
            max_depth: self.depth_limit,
        }
    }

    pub fn state_graph_config(&self) -> StateGraphConfig {
        StateGraphConfig {
            mode: self.mode,
            budget: self.budget(),
        }
    }
}

// Large enough for hand-drawn nets, small enough to stop a runaway
// reachability search on an unbounded one.
fn default_state_limit() -> Option<usize> {
    Some(100_000)
}
