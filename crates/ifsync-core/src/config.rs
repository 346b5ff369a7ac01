//! Configuration types for the interface configurator
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

/// Main ifsync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfsyncConfig {
    /// Telemetry session configuration
    pub session: SessionConfig,

    /// Address pool configuration
    pub pool: PoolConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl IfsyncConfig {
    /// Create a new configuration with defaults
    pub fn new(session: SessionConfig) -> Self {
        Self {
            session,
            pool: PoolConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.session.validate()?;
        self.pool.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Connection settings for the telemetry session
///
/// Consumed once at startup by the transport crate; the core never reads
/// these fields after session construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Address of the telemetry/config endpoint (host:port)
    pub addr: String,

    /// Username to authenticate with
    #[serde(default)]
    pub username: Option<String>,

    /// Password to authenticate with
    #[serde(default)]
    pub password: Option<String>,

    /// Enable TLS
    #[serde(default)]
    pub tls: bool,

    /// Path to server CA certificate file
    #[serde(default)]
    pub ca_file: Option<String>,

    /// Path to client TLS certificate file
    #[serde(default)]
    pub cert_file: Option<String>,

    /// Path to client TLS private key file
    #[serde(default)]
    pub key_file: Option<String>,
}

impl SessionConfig {
    /// Validate the session configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.addr.is_empty() {
            return Err(crate::Error::config("session address cannot be empty"));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(crate::Error::config("password given without username"));
        }
        Ok(())
    }
}

/// Address pool startup parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of synthetic addresses to seed the pool with
    #[serde(default = "default_pool_size")]
    pub size: usize,

    /// Prefix length shared by every allocation
    #[serde(default = "default_prefix_len")]
    pub prefix_len: u8,
}

impl PoolConfig {
    /// Validate the pool configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !(1..=254).contains(&self.size) {
            return Err(crate::Error::config(format!(
                "pool size must be between 1 and 254, got {}",
                self.size
            )));
        }
        if !(1..=32).contains(&self.prefix_len) {
            return Err(crate::Error::config(format!(
                "prefix length must be between 1 and 32, got {}",
                self.prefix_len
            )));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: default_pool_size(),
            prefix_len: default_prefix_len(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Grace period in milliseconds
    ///
    /// After an interface goes administratively up with an incomplete set of
    /// configuration fragments, the engine waits this long for the missing
    /// fragments before configuring the interface anyway.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Capacity of the monitoring event channel
    ///
    /// When full, new engine events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.grace_period_ms == 0 {
            return Err(crate::Error::config("grace period must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event channel capacity must be > 0"));
        }
        Ok(())
    }

    /// The grace period as a [`std::time::Duration`]
    pub fn grace_period(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.grace_period_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_pool_size() -> usize {
    200
}

fn default_prefix_len() -> u8 {
    24
}

fn default_grace_period_ms() -> u64 {
    20_000
}

fn default_event_channel_capacity() -> usize {
    1000
}
