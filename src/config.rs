/*!
 * Configuration types for the BlockTrace client
 */

use blocktrace_connect::{ClientOptions, EndpointOverrides};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{BlockTraceError, Result};

/// Client configuration, usually read from `config.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Ledger host override (e.g. "http://127.0.0.1:8081")
    #[serde(default)]
    pub host: Option<String>,

    /// Ledger service identifier override
    #[serde(default)]
    pub service_id: Option<String>,

    /// Hex-encoded root key the ledger must present during handshake
    #[serde(default)]
    pub trusted_root_key: Option<String>,

    /// Budget for dial, trust bootstrap and liveness probe, in milliseconds
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,

    /// Budget for each remote call, in milliseconds
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// History queries in flight while computing a summary
    #[serde(default = "default_fan_out")]
    pub fan_out: usize,

    #[serde(default)]
    pub log_level: LogLevel,

    /// Write JSON logs to this file instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    #[serde(default)]
    pub verbose: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: None,
            service_id: None,
            trusted_root_key: None,
            handshake_timeout_ms: default_handshake_timeout_ms(),
            call_timeout_ms: default_call_timeout_ms(),
            fan_out: default_fan_out(),
            log_level: LogLevel::default(),
            log_file: None,
            verbose: false,
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

fn default_call_timeout_ms() -> u64 {
    30_000
}

fn default_fan_out() -> usize {
    8
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            BlockTraceError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents)
            .map_err(|e| BlockTraceError::Config(format!("Invalid {}: {}", path.display(), e)))
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| BlockTraceError::Config(format!("Cannot encode config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// `<config dir>/blocktrace/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("blocktrace").join("config.toml"))
    }

    /// Load from an explicit path (must exist), else from the default path
    /// when present, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn endpoint_overrides(&self) -> EndpointOverrides {
        EndpointOverrides {
            host: self.host.clone(),
            service_id: self.service_id.clone(),
        }
    }

    pub fn client_options(&self) -> Result<ClientOptions> {
        let pinned_root_key = match self.trusted_root_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Some(hex::decode(key).map_err(|e| {
                BlockTraceError::Config(format!("trusted_root_key is not valid hex: {}", e))
            })?),
            _ => None,
        };

        if self.handshake_timeout_ms == 0 || self.call_timeout_ms == 0 {
            return Err(BlockTraceError::Config(
                "Timeouts must be greater than zero".to_string(),
            ));
        }

        Ok(ClientOptions {
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
            call_timeout: Duration::from_millis(self.call_timeout_ms),
            fan_out: self.fan_out,
            pinned_root_key,
        })
    }
}
