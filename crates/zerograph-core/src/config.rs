//! Configuration management for Zerograph clients.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`ZEROGRAPH_CLIENT__` prefix, e.g. `ZEROGRAPH_CLIENT__PORT`)
//! 2. Config file (`<prefix>.toml`, `[client]` section)
//! 3. Defaults

use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

/// Port on which the root Zerograph service listens.
pub const DEFAULT_PORT: u16 = 47470;

/// Connection settings for one graph service.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// Host name or address of the service.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port of the service.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound on establishing the connection, in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Upper bound on waiting for each reply frame, in milliseconds.
    #[serde(default = "default_receive_timeout")]
    pub receive_timeout_ms: u64,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_connect_timeout() -> u64 {
    30_000
}

fn default_receive_timeout() -> u64 {
    120_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_ms: default_connect_timeout(),
            receive_timeout_ms: default_receive_timeout(),
        }
    }
}

impl ClientConfig {
    /// Load the `[client]` section from `<file_prefix>.toml` and the environment.
    ///
    /// A missing file or a missing section yields the defaults; a malformed
    /// file or an unparseable value is an error.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("ZEROGRAPH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        match cfg.get::<ClientConfig>("client") {
            Ok(c) => Ok(c),
            Err(config::ConfigError::NotFound(_)) => Ok(ClientConfig::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Same host and timeouts, different port.
    pub fn with_port(&self, port: u16) -> Self {
        Self {
            port,
            ..self.clone()
        }
    }

    /// ZeroMQ endpoint for this service.
    pub fn endpoint(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 47470);
        assert_eq!(config.receive_timeout(), Duration::from_secs(120));
        assert_eq!(config.endpoint(), "tcp://localhost:47470");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ClientConfig::load("definitely-not-a-zerograph-config-file").unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_partial_section_fills_defaults() {
        let cfg = config::Config::builder()
            .add_source(config::File::from_str(
                "[client]\nhost = \"db.internal\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let client: ClientConfig = cfg.get("client").unwrap();
        assert_eq!(client.host, "db.internal");
        assert_eq!(client.port, DEFAULT_PORT);
        assert_eq!(client.with_port(47471).endpoint(), "tcp://db.internal:47471");
    }
}
