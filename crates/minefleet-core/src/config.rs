//! Configuration types for a minefleet agent.
//!
//! Loaded from a TOML file in which every section and every key is
//! optional; missing values fall back to the defaults below.
//!
//! ```toml
//! [server]
//! host = "play.example.net"
//! port = 19132
//! username = "digger-01"
//! offline = true
//!
//! [connection]
//! max_retries = 5
//! keep_alive_ms = 10000
//! backoff_base_ms = 1000
//! backoff_cap_ms = 16000
//!
//! [engine]
//! tick_ms = 50
//! ack = "immediate"        # or "await_event"
//! report_mined = true
//!
//! [messages]
//! templates_dir = "./templates"
//! ```

use crate::engine::AckStrategy;
use crate::error::{FleetError, Result};
use crate::ports::session::ConnectParams;
use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Main agent configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FleetConfig {
    /// Server to connect to.
    pub server: ServerConfig,

    /// Reconnect and keep-alive behavior.
    pub connection: ConnectionConfig,

    /// Mining engine behavior.
    pub engine: EngineConfig,

    /// Announcement template overrides.
    pub messages: MessagesConfig,
}

impl FleetConfig {
    /// Loads configuration from `path`.
    ///
    /// # Returns
    ///
    /// The parsed configuration, or the defaults if `path` does not exist.
    ///
    /// # Errors
    ///
    /// Returns `FleetError::ConfigParseError` for malformed TOML,
    /// `FleetError::InvalidConfig` for out-of-range values, or
    /// `FleetError::Anyhow` if the file exists but cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "config file missing, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates an in-memory TOML document.
    ///
    /// # Errors
    ///
    /// Same as [`FleetConfig::load`], minus the IO cases.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| FleetError::ConfigParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `FleetError::InvalidConfig` naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(FleetError::InvalidConfig(msg.to_string()));

        if self.server.host.trim().is_empty() {
            return invalid("server.host must not be empty");
        }
        if self.server.port == 0 {
            return invalid("server.port must be non-zero");
        }
        if self.connection.keep_alive_ms == 0 {
            return invalid("connection.keep_alive_ms must be positive");
        }
        if self.connection.backoff_base_ms == 0 {
            return invalid("connection.backoff_base_ms must be positive");
        }
        if self.connection.backoff_cap_ms < self.connection.backoff_base_ms {
            return invalid("connection.backoff_cap_ms must be at least backoff_base_ms");
        }
        if self.engine.tick_ms == 0 {
            return invalid("engine.tick_ms must be positive");
        }
        Ok(())
    }

    /// Session parameters derived from the `[server]` section.
    pub fn connect_params(&self) -> ConnectParams {
        ConnectParams {
            host: self.server.host.clone(),
            port: self.server.port,
            username: self.server.username.clone(),
            offline: self.server.offline,
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,

    /// Log in without authentication.
    pub offline: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let params = ConnectParams::default();
        Self {
            host: params.host,
            port: params.port,
            username: params.username,
            offline: params.offline,
        }
    }
}

/// `[connection]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Attempts per reconnect cycle before giving up.
    pub max_retries: u32,

    /// Keep-alive check interval. The session times out after twice this
    /// long without a liveness signal.
    pub keep_alive_ms: u64,

    /// Delay before the first reconnect attempt; doubles per failure.
    pub backoff_base_ms: u64,

    /// Upper bound on the reconnect delay.
    pub backoff_cap_ms: u64,
}

impl ConnectionConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.keep_alive_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            keep_alive_ms: 10_000,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 16_000,
        }
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Interval between engine steps.
    pub tick_ms: u64,

    /// How extraction completion is detected.
    pub ack: AckStrategy,

    /// Report mined blocks to the state store.
    pub report_mined: bool,
}

impl EngineConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_ms: 50,
            ack: AckStrategy::Immediate,
            report_mined: true,
        }
    }
}

/// `[messages]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MessagesConfig {
    /// Directory of `.j2` files replacing the built-in announcements.
    pub templates_dir: Option<PathBuf>,
}
