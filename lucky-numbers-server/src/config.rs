//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated
//! configuration. Table tiers are not configurable at runtime; see
//! [`GameConfig::default_tiers`](crate::game::GameConfig::default_tiers).

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::game::timer::RoundTiming;

/// Bind address variable.
pub const ENV_BIND: &str = "LUCKY_BIND";
/// Connection limit variable.
pub const ENV_MAX_CONNECTIONS: &str = "LUCKY_MAX_CONNECTIONS";
/// Heartbeat period variable (milliseconds).
pub const ENV_HEARTBEAT_MS: &str = "LUCKY_HEARTBEAT_MS";
/// Round duration variable (seconds).
pub const ENV_ROUND_SECS: &str = "LUCKY_ROUND_SECS";
/// Outbound queue size variable.
pub const ENV_CHANNEL_CAPACITY: &str = "LUCKY_CHANNEL_CAPACITY";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Round cadences.
    pub timing: RoundTiming,
    /// Outbound message queue per connection.
    pub channel_capacity: usize,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            max_connections: 1000,
            timing: RoundTiming::default(),
            channel_capacity: 64,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A variable could not be parsed.
    #[error("Invalid value {value:?} for {var}: {reason}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
        /// Parse failure.
        reason: String,
    },

    /// Values parse but contradict each other.
    #[error("Inconsistent configuration: {0}")]
    Inconsistent(String),
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind_addr = parse_var(&lookup, ENV_BIND)?.unwrap_or(defaults.bind_addr);
        let max_connections = parse_var(&lookup, ENV_MAX_CONNECTIONS)?.unwrap_or(defaults.max_connections);
        let channel_capacity = parse_var(&lookup, ENV_CHANNEL_CAPACITY)?.unwrap_or(defaults.channel_capacity);

        let heartbeat_interval = parse_var::<u64, _>(&lookup, ENV_HEARTBEAT_MS)?
            .map(Duration::from_millis)
            .unwrap_or(defaults.timing.heartbeat_interval);
        let round_duration = parse_var::<u64, _>(&lookup, ENV_ROUND_SECS)?
            .map(Duration::from_secs)
            .unwrap_or(defaults.timing.round_duration);

        let config = Self {
            bind_addr,
            max_connections,
            timing: RoundTiming {
                round_duration,
                heartbeat_interval,
            },
            channel_capacity,
            version: defaults.version,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timing.round_duration.is_zero() || self.timing.heartbeat_interval.is_zero() {
            return Err(ConfigError::Inconsistent(
                "round duration and heartbeat interval must be non-zero".to_string(),
            ));
        }
        if self.timing.heartbeat_interval > self.timing.round_duration {
            return Err(ConfigError::Inconsistent(format!(
                "heartbeat {:?} is longer than round duration {:?}",
                self.timing.heartbeat_interval, self.timing.round_duration
            )));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Inconsistent("channel capacity must be non-zero".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value.trim().parse::<T>().map(Some).map_err(|e| ConfigError::Invalid {
            var,
            value: value.clone(),
            reason: e.to_string(),
        }),
    }
}
