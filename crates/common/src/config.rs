//! Configuration structures for FarmDispatch
//!
//! This module defines the configuration types used by the coordinator and workers.
//! Configurations are loaded from YAML files and can be overridden by environment variables.

use crate::error::{DispatchError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration for FarmDispatch components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmDispatchConfig {
    /// Mode: either "worker" or "coordinator"
    pub mode: String,

    /// Server binding address
    pub bind_address: String,

    /// Server port
    pub port: u16,

    /// Coordinator-specific configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinator: Option<CoordinatorConfig>,

    /// Worker-specific configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<WorkerConfig>,

    /// Observability configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

/// Coordinator-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// CSV file with one `host,render_port,scheduler_port` row per backend
    #[serde(default = "default_pool_path")]
    pub pool_path: PathBuf,

    /// Upper bound on the forwarding call to a backend scheduler
    #[serde(default = "default_forward_timeout")]
    pub forward_timeout_ms: u64,

    /// Upper bound on opening the transient channel to a backend
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            pool_path: default_pool_path(),
            forward_timeout_ms: default_forward_timeout(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

/// Worker-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum concurrently open sessions (0 = unlimited)
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Sessions idle for longer than this are dropped
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// How often the reaper scans for idle sessions
    #[serde(default = "default_reap_interval")]
    pub reap_interval_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            session_ttl_secs: default_session_ttl(),
            reap_interval_secs: default_reap_interval(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Enable Prometheus metrics
    #[serde(default = "default_metrics")]
    pub enable_metrics: bool,
}

/// Default value functions
fn default_pool_path() -> PathBuf {
    PathBuf::from("servers.csv")
}

fn default_forward_timeout() -> u64 {
    1000
}

fn default_connect_timeout() -> u64 {
    500
}

fn default_max_sessions() -> usize {
    8
}

fn default_session_ttl() -> u64 {
    30
}

fn default_reap_interval() -> u64 {
    5
}

fn default_metrics() -> bool {
    true
}

impl FarmDispatchConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| DispatchError::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;

        Self::from_yaml(&content)
            .map_err(|e| DispatchError::Config(format!("Invalid config file {}: {}", path.display(), e)))
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let mut config: FarmDispatchConfig = serde_yaml::from_str(content)
            .map_err(|e| DispatchError::Config(format!("Failed to parse config: {}", e)))?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration for `mode` from environment variables and defaults
    pub fn from_env(mode: &str) -> Result<Self> {
        let mut config = FarmDispatchConfig {
            mode: mode.to_string(),
            bind_address: "0.0.0.0".to_string(),
            port: 50051,
            coordinator: None,
            worker: None,
            observability: None,
        };
        match mode {
            "coordinator" => config.coordinator = Some(CoordinatorConfig::default()),
            "worker" => config.worker = Some(WorkerConfig::default()),
            _ => {}
        }
        config.apply_env_overrides()?;

        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to [`FarmDispatchConfig::from_env`]
    pub fn load_or_env<P: AsRef<Path>>(path: P, mode: &str) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            Self::from_env(mode)
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(mode) = std::env::var("FARMDISPATCH_MODE") {
            self.mode = mode;
        }
        if let Ok(bind_address) = std::env::var("FARMDISPATCH_BIND_ADDRESS") {
            self.bind_address = bind_address;
        }
        if let Ok(port) = std::env::var("FARMDISPATCH_PORT") {
            self.port = port
                .parse()
                .map_err(|_| DispatchError::Config(format!("Invalid port number: {}", port)))?;
        }
        if let Ok(pool_path) = std::env::var("FARMDISPATCH_POOL_PATH") {
            if let Some(coordinator) = self.coordinator.as_mut() {
                coordinator.pool_path = PathBuf::from(pool_path);
            }
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        match self.mode.as_str() {
            "coordinator" => {
                let coordinator = self.coordinator.as_ref()
                    .ok_or_else(|| DispatchError::config("Coordinator config required for coordinator mode"))?;
                if coordinator.forward_timeout_ms == 0 {
                    return Err(DispatchError::config("forward_timeout_ms must be greater than zero"));
                }
            }
            "worker" => {
                if self.worker.is_none() {
                    return Err(DispatchError::config("Worker config required for worker mode"));
                }
            }
            _ => {
                return Err(DispatchError::config(format!("Invalid mode: {}", self.mode)));
            }
        }
        Ok(())
    }

    /// Listen address as `host:port`
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Get forwarding timeout as Duration
    pub fn forward_timeout(&self) -> Result<Duration> {
        let coordinator = self.coordinator.as_ref()
            .ok_or_else(|| DispatchError::config("Coordinator config not found"))?;

        Ok(Duration::from_millis(coordinator.forward_timeout_ms))
    }

    /// Get connect timeout as Duration
    pub fn connect_timeout(&self) -> Result<Duration> {
        let coordinator = self.coordinator.as_ref()
            .ok_or_else(|| DispatchError::config("Coordinator config not found"))?;

        Ok(Duration::from_millis(coordinator.connect_timeout_ms))
    }
}
