//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `host.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - NodeConfig: which components this process runs.
//!     - ServerConfig: Reading store listener, CORS origin, response delay.
//!     - PollingConfig: Where and how often the dashboard polls.
//!     - HistoryConfig: Retention policy for the history buffer.
//!     - DashboardConfig: Dashboard listener.
//!     - SensorConfig: Simulated sensor node target and cadence.
//!
//! every section is `#[serde(default)]` so a partial file only overrides
//! what it names.
//!
//! ==============================================================================

use crate::history::RetentionPolicy;
use anyhow::{bail, Context};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HostConfig {
    pub node: NodeConfig,
    pub server: ServerConfig,
    pub polling: PollingConfig,
    pub history: HistoryConfig,
    pub dashboard: DashboardConfig,
    pub sensor: SensorConfig,
    pub logging: LoggingConfig,
}

/// which components run in this process
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    ReadingStore,
    Dashboard,
    Sensor,
    #[default]
    All,
}

impl Role {
    pub fn runs_store(self) -> bool {
        matches!(self, Role::ReadingStore | Role::All)
    }

    pub fn runs_dashboard(self) -> bool {
        matches!(self, Role::Dashboard | Role::All)
    }

    pub fn runs_sensor(self) -> bool {
        matches!(self, Role::Sensor | Role::All)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct NodeConfig {
    pub role: Role,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// fixed latency added before answering a snapshot read
    pub response_delay_ms: u64,
    /// dashboard origin allowed with credentials, "*" for any
    pub allowed_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3001".to_string(),
            response_delay_ms: 0,
            allowed_origin: "http://localhost:5173".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub server_url: String,
    pub interval_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3001/api/sensor-data".to_string(),
            interval_ms: 2000,
            request_timeout_ms: 5000,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RetentionKind {
    #[default]
    FixedWindow,
    AgeTiered,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistoryConfig {
    pub retention: RetentionKind,
    /// only used by fixed-window retention
    pub max_points: usize,
    pub seed_placeholder: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retention: RetentionKind::FixedWindow,
            max_points: 20,
            seed_placeholder: true,
        }
    }
}

impl HistoryConfig {
    pub fn policy(&self) -> RetentionPolicy {
        match self.retention {
            RetentionKind::FixedWindow => RetentionPolicy::FixedWindow {
                max_points: self.max_points,
            },
            RetentionKind::AgeTiered => RetentionPolicy::AgeTiered,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub bind: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SensorConfig {
    pub push_url: String,
    pub interval_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            push_url: "http://127.0.0.1:3001/api/nodeMCU-data".to_string(),
            interval_ms: 2000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_sensor_data: true,
        }
    }
}

impl HostConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse and validate toml text
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: HostConfig = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.polling.interval_ms == 0 {
            bail!("polling.interval_ms must be greater than zero");
        }
        if self.sensor.interval_ms == 0 {
            bail!("sensor.interval_ms must be greater than zero");
        }
        if self.history.retention == RetentionKind::FixedWindow && self.history.max_points == 0 {
            bail!("history.max_points must be greater than zero");
        }
        Ok(())
    }

    /// Load with default fallback
    ///
    /// an explicit path is tried first, then `config/host.toml` and
    /// `../config/host.toml`. runs before the subscriber exists, so the
    /// chosen file and any problems come back for the caller to log.
    pub fn load_or_default(explicit: Option<&Path>) -> (Self, Option<PathBuf>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut paths = Vec::new();
        if let Some(p) = explicit {
            paths.push(p.to_path_buf());
        }
        paths.push(PathBuf::from("config").join("host.toml"));
        paths.push(PathBuf::from("..").join("config").join("host.toml"));

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => return (config, Some(path.clone()), warnings),
                    Err(e) => {
                        warnings.push(format!("Failed to load {}: {:#}", path.display(), e));
                    }
                }
            }
        }

        warnings.push("No usable config file found - using defaults".to_string());
        (Self::default(), None, warnings)
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        tracing::info!(role = ?self.node.role, "host configuration");
        if self.node.role.runs_store() {
            tracing::info!(
                bind = %self.server.bind,
                delay_ms = self.server.response_delay_ms,
                origin = %self.server.allowed_origin,
                "reading store"
            );
        }
        if self.node.role.runs_dashboard() {
            tracing::info!(
                bind = %self.dashboard.bind,
                url = %self.polling.server_url,
                interval_ms = self.polling.interval_ms,
                retention = ?self.history.policy(),
                "dashboard"
            );
        }
        if self.node.role.runs_sensor() {
            tracing::info!(
                url = %self.sensor.push_url,
                interval_ms = self.sensor.interval_ms,
                "simulated sensor"
            );
        }
    }
}
