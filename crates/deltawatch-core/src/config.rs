use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HotReloadError, HotReloadResult};
use crate::session::LaunchProfile;

/// Well-known name of the channel the companion agent dials
pub const DEFAULT_CHANNEL_NAME: &str = "deltawatch-hotreload";

/// Default bound on the acknowledgment wait
pub const DEFAULT_ACK_TIMEOUT_MS: u64 = 2000;

/// Default configuration file name, looked up in the project root
pub const CONFIG_FILE_NAME: &str = "deltawatch.toml";

/// Configuration for a watch session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Name of the local channel shared with the target's agent
    pub channel_name: String,
    /// Declared launch profile; selects the delta applier variant
    pub launch_profile: LaunchProfile,
    /// Bound on the acknowledgment wait, in milliseconds
    pub ack_timeout_ms: u64,
    /// Companion agent registered as a startup hook of the target process
    pub agent_path: Option<PathBuf>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            channel_name: DEFAULT_CHANNEL_NAME.to_string(),
            launch_profile: LaunchProfile::default(),
            ack_timeout_ms: DEFAULT_ACK_TIMEOUT_MS,
            agent_path: None,
        }
    }
}

impl WatchConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> HotReloadResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `deltawatch.toml` from `root` if present, defaults otherwise
    pub fn discover<P: AsRef<Path>>(root: P) -> HotReloadResult<Self> {
        let path = root.as_ref().join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> HotReloadResult<Self> {
        toml::from_str(content)
            .map_err(|e| HotReloadError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn to_toml(&self) -> HotReloadResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> HotReloadResult<()> {
        if self.channel_name.trim().is_empty() {
            return Err(HotReloadError::config("Channel name must not be empty"));
        }

        if self.channel_name.contains(['/', '\\']) {
            return Err(HotReloadError::config(format!(
                "Channel name must not contain path separators: {}",
                self.channel_name
            )));
        }

        if self.ack_timeout_ms == 0 {
            return Err(HotReloadError::config("Acknowledgment timeout must be positive"));
        }

        Ok(())
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }
}
