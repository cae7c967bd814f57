//! Server, client and logging configuration.
//!
//! Configuration is plain data: [`ServerConfig`] and [`ClientConfig`] carry
//! documented defaults and `with_*` builder methods, and [`Settings`] loads
//! both from a TOML file. Durations are written in milliseconds in the file
//! (`read_timeout_ms = 30000`) and held as [`Duration`] in memory.
//!
//! ```toml
//! [server]
//! address = "0.0.0.0:8080"
//! max_connections = 256
//!
//! [client]
//! address = "127.0.0.1:8080"
//! max_retries = 2
//! ```

use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{DEFAULT_MAX_MESSAGE_SIZE, clamp_message_size};

/// Default listen and dial address.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:8080";

mod millis {
    //! Serde adapter storing a [`Duration`] as whole milliseconds.

    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Errors raised while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that was requested.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML for [`Settings`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Server configuration.
///
/// # Default Values
/// - `address`: `127.0.0.1:8080`
/// - `max_connections`: 1000
/// - `max_message_size`: 1 MiB
/// - `read_timeout`: 30 seconds
/// - `write_timeout`: 30 seconds
/// - `idle_timeout`: 5 minutes
/// - `shutdown_timeout`: 30 seconds
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub address: String,
    /// Maximum number of concurrent sessions; extra connections are refused.
    pub max_connections: usize,
    /// Maximum length of one request line in bytes.
    pub max_message_size: usize,
    /// Time allowed to receive the next request line.
    #[serde(rename = "read_timeout_ms", with = "millis")]
    pub read_timeout: Duration,
    /// Time allowed to write one response.
    #[serde(rename = "write_timeout_ms", with = "millis")]
    pub write_timeout: Duration,
    /// Time a session may stay without a valid request before it is closed.
    #[serde(rename = "idle_timeout_ms", with = "millis")]
    pub idle_timeout: Duration,
    /// Time [`Server::shutdown`](crate::server::Server::shutdown) waits for
    /// sessions to drain.
    #[serde(rename = "shutdown_timeout_ms", with = "millis")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_owned(),
            max_connections: 1000,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(5 * 60),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Set the listen address.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Set the admission limit. Values below one are raised to one.
    #[must_use]
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    /// Set the message size limit, clamped to the codec bounds.
    #[must_use]
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = clamp_message_size(max_message_size);
        self
    }

    /// Set the per-request read timeout.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the response write timeout.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the session idle timeout.
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the shutdown drain timeout.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Apply the same bounds as the builder methods to values read from a file.
    #[must_use]
    pub fn normalized(self) -> Self {
        let max_connections = self.max_connections;
        let max_message_size = self.max_message_size;
        self.with_max_connections(max_connections)
            .with_max_message_size(max_message_size)
    }
}

/// Client configuration.
///
/// # Default Values
/// - `address`: `127.0.0.1:8080`
/// - `connect_timeout`: 10 seconds
/// - `read_timeout`: 30 seconds
/// - `write_timeout`: 30 seconds
/// - `max_retries`: 3
/// - `retry_delay`: 1 second
/// - `keep_alive`: enabled, with a 30 second period
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Address to dial.
    pub address: String,
    /// Time allowed to establish the connection.
    #[serde(rename = "connect_timeout_ms", with = "millis")]
    pub connect_timeout: Duration,
    /// Time allowed to read a response when the caller sets no deadline.
    #[serde(rename = "read_timeout_ms", with = "millis")]
    pub read_timeout: Duration,
    /// Time allowed to write a request when the caller sets no deadline.
    #[serde(rename = "write_timeout_ms", with = "millis")]
    pub write_timeout: Duration,
    /// Retries after the first attempt; `send` makes at most `max_retries + 1`
    /// attempts.
    pub max_retries: u32,
    /// Fixed wait between attempts.
    #[serde(rename = "retry_delay_ms", with = "millis")]
    pub retry_delay: Duration,
    /// Enable TCP keep-alive probes.
    pub keep_alive: bool,
    /// Idle time before keep-alive probes start.
    #[serde(rename = "keep_alive_period_ms", with = "millis")]
    pub keep_alive_period: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_owned(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            keep_alive: true,
            keep_alive_period: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Set the address to dial.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the default read timeout.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the default write timeout.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the number of retries after the first attempt.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the fixed delay between attempts.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Enable or disable keep-alive; `Some(period)` enables it with the given
    /// idle period.
    #[must_use]
    pub fn with_keep_alive(mut self, period: Option<Duration>) -> Self {
        match period {
            Some(period) => {
                self.keep_alive = true;
                self.keep_alive_period = period;
            }
            None => self.keep_alive = false,
        }
        self
    }
}

/// Output format for the binary's log subscriber.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human readable output.
    #[default]
    Pretty,
    /// Single-line human readable output.
    Compact,
    /// Newline-delimited JSON records.
    Json,
}

/// Logging configuration for the binary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::default(),
        }
    }
}

/// Complete configuration file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server section.
    pub server: ServerConfig,
    /// Client section.
    pub client: ClientConfig,
    /// Logging section.
    pub logging: LoggingConfig,
}

impl Settings {
    /// Load settings from a TOML file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if `text` is not valid.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let mut settings: Self = toml::from_str(text)?;
        settings.server = settings.server.normalized();
        Ok(settings)
    }
}
