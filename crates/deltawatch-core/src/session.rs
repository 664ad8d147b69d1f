//! Watch session state shared across run iterations.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::WatchConfig;
use crate::error::HotReloadError;

/// Environment variable listing startup hooks loaded by the target process
pub const STARTUP_HOOKS_VAR: &str = "DELTAWATCH_STARTUP_HOOKS";

/// Launch profile tag declared for the target; selects the delta applier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchProfile {
    /// Deltas are delivered to an in-process agent over a local channel
    #[default]
    Process,
    /// Deltas are delivered through the browser refresh transport
    Browser,
}

impl FromStr for LaunchProfile {
    type Err = HotReloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "process" => Ok(LaunchProfile::Process),
            "browser" => Ok(LaunchProfile::Browser),
            other => Err(HotReloadError::config(format!("Unknown launch profile: {}", other))),
        }
    }
}

impl fmt::Display for LaunchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchProfile::Process => write!(f, "process"),
            LaunchProfile::Browser => write!(f, "browser"),
        }
    }
}

/// Launch settings applied to the target process on the next start
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessLaunchConfig {
    env: BTreeMap<String, String>,
}

impl ProcessLaunchConfig {
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn get_env(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env.insert(key.into(), value.into());
    }

    /// Append `value` to a path-list variable
    pub fn append_env_path(&mut self, key: &str, value: &str) {
        let separator = if cfg!(windows) { ';' } else { ':' };
        match self.env.get_mut(key) {
            Some(existing) if !existing.is_empty() => {
                existing.push(separator);
                existing.push_str(value);
            }
            _ => {
                self.env.insert(key.to_string(), value.to_string());
            }
        }
    }
}

/// State of one watch invocation, spanning many run iterations
#[derive(Debug, Clone)]
pub struct WatchSession {
    config: WatchConfig,
    iteration: u32,
    launch: ProcessLaunchConfig,
    agent_hook_registered: bool,
}

impl WatchSession {
    pub fn new(config: WatchConfig) -> Self {
        Self {
            config,
            iteration: 0,
            launch: ProcessLaunchConfig::default(),
            agent_hook_registered: false,
        }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    pub fn launch_profile(&self) -> LaunchProfile {
        self.config.launch_profile
    }

    /// Zero-based index of the current run iteration
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn is_first_iteration(&self) -> bool {
        self.iteration == 0
    }

    /// Advance to the next run iteration (target restarted)
    pub fn begin_iteration(&mut self) -> u32 {
        self.iteration += 1;
        self.iteration
    }

    pub fn launch(&self) -> &ProcessLaunchConfig {
        &self.launch
    }

    pub fn launch_mut(&mut self) -> &mut ProcessLaunchConfig {
        &mut self.launch
    }

    pub fn agent_hook_registered(&self) -> bool {
        self.agent_hook_registered
    }

    /// Register the companion agent as a startup hook of the target.
    ///
    /// Only takes effect on the first run iteration, and only once. Returns
    /// whether the launch configuration was changed.
    pub fn register_agent_hook(&mut self, agent_path: &Path) -> bool {
        if !self.is_first_iteration() || self.agent_hook_registered {
            return false;
        }

        let agent = agent_path.to_string_lossy();
        self.launch.append_env_path(STARTUP_HOOKS_VAR, &agent);
        self.agent_hook_registered = true;
        debug!("Registered startup hook {} for the target process", agent);
        true
    }
}
