//! Configuration types and validation for the sandbox launcher

use crate::error::{Result, SandboxError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime registered for gVisor by default
pub const DEFAULT_RUNTIME_NAME: &str = "runsc";

/// Where the gVisor binary is installed by default
pub const DEFAULT_RUNTIME_PATH: &str = "/usr/local/bin/runsc";

/// The sandbox every container must run under.
///
/// Built once before any launch and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfiguration {
    required_runtime_name: String,
    required_binary_path: PathBuf,
}

impl SandboxConfiguration {
    /// Require `runtime_name`, backed by the binary at `binary_path`
    pub fn new(runtime_name: impl Into<String>, binary_path: impl Into<PathBuf>) -> Self {
        Self {
            required_runtime_name: runtime_name.into(),
            required_binary_path: binary_path.into(),
        }
    }

    /// Runtime name the engine must assign
    pub fn required_runtime_name(&self) -> &str {
        &self.required_runtime_name
    }

    /// Binary the runtime must be registered with
    pub fn required_binary_path(&self) -> &Path {
        &self.required_binary_path
    }
}

/// Main launcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LauncherConfig {
    /// Required sandbox runtime
    #[serde(default)]
    pub sandbox: SandboxSettings,

    /// Runtime monitor settings
    #[serde(default)]
    pub monitor: MonitorSettings,

    /// Log retrieval limits
    #[serde(default)]
    pub logs: LogSettings,

    /// Give up on a container that runs longer than this
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_timeout_secs: Option<u64>,

    /// Remove the container after a normal exit
    #[serde(default = "default_true")]
    pub remove_on_exit: bool,
}

/// Sandbox runtime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxSettings {
    /// Name the runtime is registered under
    #[serde(default = "default_runtime_name")]
    pub runtime_name: String,

    /// Path of the runtime binary (`~` is expanded)
    #[serde(default = "default_runtime_path")]
    pub binary_path: String,
}

/// Runtime monitor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSettings {
    /// Sampling interval in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

/// Log retrieval limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSettings {
    /// Stop reading after this many bytes
    #[serde(default = "default_max_log_bytes")]
    pub max_bytes: usize,

    /// Stop reading after this many milliseconds
    #[serde(default = "default_log_timeout_ms")]
    pub read_timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_runtime_name() -> String {
    DEFAULT_RUNTIME_NAME.to_string()
}

fn default_runtime_path() -> String {
    DEFAULT_RUNTIME_PATH.to_string()
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_max_log_bytes() -> usize {
    1024 * 1024
}

fn default_log_timeout_ms() -> u64 {
    5000
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            sandbox: SandboxSettings::default(),
            monitor: MonitorSettings::default(),
            logs: LogSettings::default(),
            wait_timeout_secs: None,
            remove_on_exit: default_true(),
        }
    }
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            runtime_name: default_runtime_name(),
            binary_path: default_runtime_path(),
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            max_bytes: default_max_log_bytes(),
            read_timeout_ms: default_log_timeout_ms(),
        }
    }
}

impl MonitorSettings {
    /// Sampling interval
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl LogSettings {
    /// Deadline for draining logs
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl LauncherConfig {
    /// Load configuration from a JSON or TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.sandbox.runtime_name.trim().is_empty() {
            return Err(SandboxError::Config(
                "sandbox runtime name must not be empty".to_string(),
            ));
        }

        let binary_path = expand_path(&self.sandbox.binary_path)?;
        if !binary_path.is_absolute() {
            return Err(SandboxError::Config(format!(
                "sandbox binary path must be absolute: {}",
                binary_path.display()
            )));
        }

        if self.monitor.interval_ms == 0 {
            return Err(SandboxError::Config(
                "monitor interval must be greater than zero".to_string(),
            ));
        }

        if self.logs.max_bytes == 0 || self.logs.read_timeout_ms == 0 {
            return Err(SandboxError::Config(
                "log limits must be greater than zero".to_string(),
            ));
        }

        if self.wait_timeout_secs == Some(0) {
            return Err(SandboxError::Config(
                "wait timeout must be greater than zero".to_string(),
            ));
        }

        if self.wait_timeout_secs.is_none() {
            tracing::debug!("No wait timeout configured; a hung container blocks until interrupted");
        }

        Ok(())
    }

    /// Build the process-wide sandbox requirement
    pub fn sandbox_configuration(&self) -> Result<SandboxConfiguration> {
        Ok(SandboxConfiguration::new(
            self.sandbox.runtime_name.clone(),
            expand_path(&self.sandbox.binary_path)?,
        ))
    }

    /// Wait deadline, if any
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_secs.map(Duration::from_secs)
    }

    /// Get default settings path
    pub fn default_settings_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sandbox-launcher.json")
    }
}

/// Expand path with shell expansion
fn expand_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path)
        .map_err(|e| SandboxError::Config(format!("Failed to expand path {}: {}", path, e)))?;

    Ok(PathBuf::from(expanded.as_ref()))
}
