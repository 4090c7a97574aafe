// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;
use std::net::ToSocketAddrs;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    pub dev: DevConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    pub show_headers: bool,
    /// Access log format (combined, common, json, or custom pattern)
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    /// Serve more than one request per connection
    pub keep_alive: bool,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
}

/// Development server switches
#[derive(Debug, Deserialize, Clone)]
pub struct DevConfig {
    /// Verbose logging: debug level plus request header logging
    pub debug: bool,
    /// Re-read configuration on SIGHUP
    pub reload: bool,
}

/// Settings that a reload can change without rebinding the listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSettings {
    pub level: String,
    pub access_log: bool,
    pub show_headers: bool,
    pub access_log_format: String,
}

/// Listen address pair used when a reload asks for a rebind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenAddress {
    pub host: String,
    pub port: u16,
}

impl ListenAddress {
    /// Resolve to a bindable socket address.
    ///
    /// The host may be an IPv4 or IPv6 literal or a hostname; the first
    /// resolved address wins.
    pub fn resolve(&self) -> std::io::Result<std::net::SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    format!("no address found for host '{}'", self.host),
                )
            })
    }
}

impl std::fmt::Display for ListenAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
