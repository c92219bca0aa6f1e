//! Agent configuration.
//!
//! Every field has a default, so an empty (or absent) TOML file yields a
//! working agent that connects to the `TaskmanagerD` abstract socket.
//!
//! ```toml
//! endpoint = "unix:/run/taskd/supervisor.sock"
//! cpu_sample_interval_ms = 200
//! poll_timeout_ms = 1000
//! foreground_threshold = 100
//! force_stop_command = ["am", "force-stop"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use taskd_core::{OomScoreThreshold, DEFAULT_FOREGROUND_THRESHOLD};
use thiserror::Error;

use crate::connection::{Endpoint, DEFAULT_POLL_TIMEOUT};
use crate::dispatch::{Dispatcher, SystemControl, DEFAULT_FORCE_STOP_COMMAND};
use crate::snapshot::{SnapshotReader, DEFAULT_CPU_SAMPLE_INTERVAL, DEFAULT_PROC_ROOT, DEFAULT_SYS_ROOT};

/// Environment variable overriding the configured endpoint.
pub const ENDPOINT_ENV: &str = "TASKD_ENDPOINT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid endpoint {0:?}")]
    Endpoint(String),

    #[error("force_stop_command must name a program")]
    EmptyForceStopCommand,

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// `abstract:NAME`, `unix:/path` or `tcp:HOST:PORT`
    pub endpoint: String,
    pub proc_root: PathBuf,
    pub sys_root: PathBuf,
    pub cpu_sample_interval_ms: u64,
    pub poll_timeout_ms: u64,
    /// `oom_score_adj` at or below this counts as foreground
    pub foreground_threshold: i32,
    /// Program and leading arguments; the package name is appended
    pub force_stop_command: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default().to_string(),
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
            sys_root: PathBuf::from(DEFAULT_SYS_ROOT),
            cpu_sample_interval_ms: DEFAULT_CPU_SAMPLE_INTERVAL.as_millis() as u64,
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT.as_millis() as u64,
            foreground_threshold: DEFAULT_FOREGROUND_THRESHOLD,
            force_stop_command: DEFAULT_FORCE_STOP_COMMAND
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl AgentConfig {
    /// Parses a TOML document.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, path)
    }

    /// Applies the environment and command-line endpoint overrides,
    /// in that order (the flag wins).
    pub fn with_overrides(
        mut self,
        env_endpoint: Option<String>,
        flag_endpoint: Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(endpoint) = flag_endpoint.or(env_endpoint) {
            self.endpoint = endpoint;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoint()?;
        if self.force_stop_command.is_empty() {
            return Err(ConfigError::EmptyForceStopCommand);
        }
        if self.cpu_sample_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("cpu_sample_interval_ms"));
        }
        if self.poll_timeout_ms == 0 {
            return Err(ConfigError::ZeroInterval("poll_timeout_ms"));
        }
        Ok(())
    }

    pub fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        self.endpoint
            .parse()
            .map_err(|_| ConfigError::Endpoint(self.endpoint.clone()))
    }

    pub fn cpu_sample_interval(&self) -> Duration {
        Duration::from_millis(self.cpu_sample_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Builds the snapshot reader described by this config.
    pub fn snapshot_reader(&self) -> SnapshotReader {
        SnapshotReader::new(&self.proc_root, &self.sys_root)
            .with_cpu_interval(self.cpu_sample_interval())
            .with_policy(OomScoreThreshold::new(self.foreground_threshold))
    }

    /// Builds a dispatcher backed by the real process controls.
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(
            Arc::new(self.snapshot_reader()),
            SystemControl::new(self.force_stop_command.clone()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        let config = AgentConfig::from_toml("", Path::new("taskd.toml")).unwrap();
        assert_eq!(config, AgentConfig::default());
        assert_eq!(config.endpoint().unwrap(), Endpoint::default());
        assert_eq!(config.cpu_sample_interval(), Duration::from_millis(200));
        assert_eq!(config.poll_timeout(), Duration::from_secs(1));
        assert_eq!(config.foreground_threshold, 100);
        assert_eq!(config.force_stop_command, vec!["am", "force-stop"]);
    }

    #[test]
    fn test_partial_file() {
        let config = AgentConfig::from_toml(
            "endpoint = \"tcp:127.0.0.1:7878\"\nforeground_threshold = 0\n",
            Path::new("taskd.toml"),
        )
        .unwrap();
        assert_eq!(config.endpoint, "tcp:127.0.0.1:7878");
        assert_eq!(config.foreground_threshold, 0);
        assert_eq!(config.proc_root, PathBuf::from("/proc"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = AgentConfig::from_toml("endpont = \"x\"", Path::new("taskd.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_bad_endpoint_rejected() {
        let err = AgentConfig::from_toml("endpoint = \"carrier-pigeon\"", Path::new("x.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Endpoint(_)));
    }

    #[test]
    fn test_empty_force_stop_command_rejected() {
        let err = AgentConfig::from_toml("force_stop_command = []", Path::new("x.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyForceStopCommand));
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let err = AgentConfig::from_toml("poll_timeout_ms = 0", Path::new("x.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroInterval("poll_timeout_ms")));

        let err = AgentConfig::from_toml("cpu_sample_interval_ms = 0", Path::new("x.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ZeroInterval("cpu_sample_interval_ms")));

        assert!(AgentConfig::from_toml("poll_timeout_ms = 1", Path::new("x.toml")).is_ok());
    }

    #[test]
    fn test_override_precedence() {
        let base = AgentConfig::default();

        let env_only = base
            .clone()
            .with_overrides(Some("unix:/env.sock".into()), None)
            .unwrap();
        assert_eq!(env_only.endpoint, "unix:/env.sock");

        let both = base
            .clone()
            .with_overrides(Some("unix:/env.sock".into()), Some("unix:/flag.sock".into()))
            .unwrap();
        assert_eq!(both.endpoint, "unix:/flag.sock");

        assert!(base.with_overrides(None, Some("nope".into())).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AgentConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
