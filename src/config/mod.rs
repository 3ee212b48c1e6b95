use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::events::{LineClassifier, DEFAULT_TRIGGER_WORD};
use crate::subprocess::ServerCommand;

pub mod loader;

#[cfg(test)]
mod tests;

pub use loader::load_config;

/// Discord caps a message at 2000 characters; console relays default to that.
pub const DEFAULT_CHUNK_LIMIT: usize = 2000;

/// Front-end settings, usually read from `mcsync.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Shell-style command line that starts the server
    pub launch_command: Option<String>,
    /// Directory the server is started in
    pub working_dir: Option<PathBuf>,
    /// Extra environment for the server process
    pub env: HashMap<String, String>,
    /// Chat questions starting with this word become AI questions
    pub trigger_word: String,
    /// Stop the server after this long with nobody online. 0 disables.
    pub inactive_shutdown_seconds: u64,
    /// How often the idle monitor asks the server for its player list
    pub list_interval_seconds: u64,
    /// Maximum characters per relayed console chunk
    pub chunk_limit: usize,
    /// How often buffered console output is relayed
    pub relay_interval_millis: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            launch_command: None,
            working_dir: None,
            env: HashMap::new(),
            trigger_word: DEFAULT_TRIGGER_WORD.to_string(),
            inactive_shutdown_seconds: 10 * 60,
            list_interval_seconds: 60,
            chunk_limit: DEFAULT_CHUNK_LIMIT,
            relay_interval_millis: 1000,
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SyncConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn merge_env_vars(&mut self) {
        self.merge_env_from(|key| std::env::var(key).ok());
    }

    /// Apply `MCSYNC_*` overrides using the given variable lookup
    pub fn merge_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(command) = lookup("MCSYNC_LAUNCH_COMMAND") {
            self.launch_command = Some(command);
        }

        if let Some(word) = lookup("MCSYNC_TRIGGER_WORD") {
            self.trigger_word = word;
        }

        if let Some(seconds) = lookup("MCSYNC_INACTIVE_SHUTDOWN_SECONDS") {
            match seconds.parse::<u64>() {
                Ok(value) => self.inactive_shutdown_seconds = value,
                Err(_) => tracing::warn!(
                    value = %seconds,
                    "Ignoring invalid MCSYNC_INACTIVE_SHUTDOWN_SECONDS"
                ),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.trigger_word.trim().is_empty() {
            return Err(anyhow!("trigger_word must not be empty"));
        }
        if self.chunk_limit == 0 {
            return Err(anyhow!("chunk_limit must be greater than zero"));
        }
        if self.list_interval_seconds == 0 {
            return Err(anyhow!("list_interval_seconds must be greater than zero"));
        }
        if self.relay_interval_millis == 0 {
            return Err(anyhow!("relay_interval_millis must be greater than zero"));
        }
        Ok(())
    }

    /// Launch command with working directory and environment applied
    pub fn server_command(&self) -> Result<ServerCommand> {
        let launch = self
            .launch_command
            .as_deref()
            .ok_or_else(|| anyhow!("No launch command configured"))?;
        let mut command = ServerCommand::parse(launch)?;
        command.working_dir = self.working_dir.clone();
        command.env.extend(self.env.clone());
        Ok(command)
    }

    pub fn classifier(&self) -> LineClassifier {
        LineClassifier::new(self.trigger_word.clone())
    }

    /// `None` when idle shutdown is disabled
    pub fn idle_shutdown(&self) -> Option<Duration> {
        (self.inactive_shutdown_seconds > 0)
            .then(|| Duration::from_secs(self.inactive_shutdown_seconds))
    }

    pub fn list_interval(&self) -> Duration {
        Duration::from_secs(self.list_interval_seconds)
    }

    pub fn relay_interval(&self) -> Duration {
        Duration::from_millis(self.relay_interval_millis)
    }
}
