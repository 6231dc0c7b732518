//! Service Configuration Settings
//!
//! Configuration types for the greet service, loaded from environment variables.

use std::net::{IpAddr, SocketAddr};

/// Server address settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSettings {
    /// Host the gRPC listener binds to.
    pub grpc_host: IpAddr,
    /// gRPC (and gRPC-Web) server port.
    pub grpc_port: u16,
    /// Health check and metrics HTTP port (0 = disabled).
    pub health_port: u16,
}

impl ServerSettings {
    /// Socket address for the gRPC listener.
    #[must_use]
    pub const fn grpc_addr(&self) -> SocketAddr {
        SocketAddr::new(self.grpc_host, self.grpc_port)
    }

    /// Socket address for the health server, `None` when disabled.
    #[must_use]
    pub const fn health_addr(&self) -> Option<SocketAddr> {
        if self.health_port == 0 {
            None
        } else {
            Some(SocketAddr::new(self.grpc_host, self.health_port))
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            grpc_host: IpAddr::from([127, 0, 0, 1]),
            grpc_port: 8080,
            health_port: 8081,
        }
    }
}

/// Broadcaster settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastSettings {
    /// Values buffered per subscriber before new ones are dropped.
    pub subscriber_capacity: usize,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            subscriber_capacity: 10,
        }
    }
}

/// Per-call stream settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    /// Response queue depth between an extraction task and its transport.
    ///
    /// Stream calls read straight from their subscriber queue and do not
    /// use this.
    pub outbound_capacity: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            outbound_capacity: 16,
        }
    }
}

/// Extraction engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionSettings {
    /// Largest request text the engine accepts, in bytes.
    pub max_input_bytes: usize,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            max_input_bytes: 64 * 1024,
        }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Listener settings.
    pub server: ServerSettings,
    /// Broadcaster settings.
    pub broadcast: BroadcastSettings,
    /// Per-call stream settings.
    pub stream: StreamSettings,
    /// Extraction engine settings.
    pub extraction: ExtractionSettings,
}

impl ServiceConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is not an IP address or a capacity is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// Unparseable numbers fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is not an IP address or a capacity is zero.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let grpc_host = match lookup("GREET_GRPC_HOST") {
            Some(host) => host
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidHost(host))?,
            None => defaults.server.grpc_host,
        };

        let server = ServerSettings {
            grpc_host,
            grpc_port: parse_env(&lookup, "GREET_GRPC_PORT", defaults.server.grpc_port),
            health_port: parse_env(&lookup, "GREET_HEALTH_PORT", defaults.server.health_port),
        };

        let broadcast = BroadcastSettings {
            subscriber_capacity: parse_capacity(
                &lookup,
                "GREET_SUBSCRIBER_CAPACITY",
                defaults.broadcast.subscriber_capacity,
            )?,
        };

        let stream = StreamSettings {
            outbound_capacity: parse_capacity(
                &lookup,
                "GREET_OUTBOUND_CAPACITY",
                defaults.stream.outbound_capacity,
            )?,
        };

        let extraction = ExtractionSettings {
            max_input_bytes: parse_env(
                &lookup,
                "GREET_EXTRACTION_MAX_INPUT_BYTES",
                defaults.extraction.max_input_bytes,
            ),
        };

        Ok(Self {
            server,
            broadcast,
            stream,
            extraction,
        })
    }
}

/// Configuration error.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Listen host is not an IP address.
    #[error("invalid listen host: {0}")]
    InvalidHost(String),
    /// A queue capacity was configured as zero.
    #[error("environment variable {0} must be greater than zero")]
    ZeroCapacity(String),
}

fn parse_env<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_capacity<F>(lookup: &F, key: &str, default: usize) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_env(lookup, key, default) {
        0 => Err(ConfigError::ZeroCapacity(key.to_string())),
        n => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.server.grpc_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.broadcast.subscriber_capacity, 10);
        assert_eq!(config.stream.outbound_capacity, 16);
        assert_eq!(config.extraction.max_input_bytes, 65_536);
    }

    #[test]
    fn reads_overrides() {
        let config = load(&[
            ("GREET_GRPC_HOST", "0.0.0.0"),
            ("GREET_GRPC_PORT", "50051"),
            ("GREET_HEALTH_PORT", "9000"),
            ("GREET_SUBSCRIBER_CAPACITY", "32"),
            ("GREET_OUTBOUND_CAPACITY", " 4 "),
            ("GREET_EXTRACTION_MAX_INPUT_BYTES", "1024"),
        ])
        .unwrap();

        assert_eq!(config.server.grpc_addr().to_string(), "0.0.0.0:50051");
        assert_eq!(
            config.server.health_addr().map(|a| a.port()),
            Some(9000)
        );
        assert_eq!(config.broadcast.subscriber_capacity, 32);
        assert_eq!(config.stream.outbound_capacity, 4);
        assert_eq!(config.extraction.max_input_bytes, 1024);
    }

    #[test]
    fn bad_numbers_fall_back_to_defaults() {
        let config = load(&[
            ("GREET_GRPC_PORT", "eighty"),
            ("GREET_SUBSCRIBER_CAPACITY", "-3"),
        ])
        .unwrap();
        assert_eq!(config.server.grpc_port, 8080);
        assert_eq!(config.broadcast.subscriber_capacity, 10);
    }

    #[test]
    fn zero_health_port_disables_health_server() {
        let config = load(&[("GREET_HEALTH_PORT", "0")]).unwrap();
        assert_eq!(config.server.health_addr(), None);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = load(&[("GREET_SUBSCRIBER_CAPACITY", "0")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::ZeroCapacity("GREET_SUBSCRIBER_CAPACITY".to_string())
        );

        let err = load(&[("GREET_OUTBOUND_CAPACITY", "0")]).unwrap_err();
        assert!(err.to_string().contains("GREET_OUTBOUND_CAPACITY"));
    }

    #[test]
    fn invalid_host_is_rejected() {
        let err = load(&[("GREET_GRPC_HOST", "localhost:80")]).unwrap_err();
        assert_eq!(err, ConfigError::InvalidHost("localhost:80".to_string()));
    }

    #[test]
    fn ipv6_host() {
        let config = load(&[("GREET_GRPC_HOST", "::1")]).unwrap();
        assert_eq!(config.server.grpc_addr().to_string(), "[::1]:8080");
    }
}
