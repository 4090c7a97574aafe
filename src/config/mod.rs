// Configuration module entry point
// Layered configuration loading and shared runtime state

mod state;
mod types;

use std::net::SocketAddr;

use crate::logger;
use types::{ListenAddress, LiveSettings};

// Re-export public types
pub use state::AppState;
pub use types::Config;

/// Base name of the configuration file looked up when none is given
pub const DEFAULT_CONFIG_PATH: &str = "config";

/// Prefix for environment overrides, e.g. `PLACEHOLDER_SERVER__PORT=9000`
const ENV_PREFIX: &str = "PLACEHOLDER";

impl Config {
    /// Load configuration and apply the hosting platform's `PORT` override
    pub fn load(config_path: &str) -> Result<Self, config::ConfigError> {
        let mut cfg = Self::load_from(config_path)?;
        cfg.apply_port_override(std::env::var("PORT").ok().as_deref());
        Ok(cfg)
    }

    /// Load configuration from specified file path (extension optional).
    /// A missing file is not an error: defaults and environment still apply.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        Self::load_with_env(config_path, None)
    }

    /// Same as `load_from`, reading overrides from `env` instead of the
    /// process environment when given.
    pub fn load_with_env(
        config_path: &str,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5000)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.show_headers", false)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "static-placeholder")?
            .set_default("dev.debug", true)?
            .set_default("dev.reload", true)?
            .build()?;

        settings.try_deserialize()
    }

    /// Override `server.port` from a `PORT`-style value.
    /// Unparseable values are reported and ignored.
    pub fn apply_port_override(&mut self, value: Option<&str>) {
        let Some(raw) = value else {
            return;
        };
        match raw.trim().parse::<u16>() {
            Ok(port) => self.server.port = port,
            Err(e) => logger::log_warning(&format!(
                "Ignoring PORT value '{raw}': {e}, keeping port {}",
                self.server.port
            )),
        }
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        let addr = self.listen_address();
        addr.resolve()
            .map_err(|e| format!("Invalid address '{addr}': {e}"))
    }

    pub fn listen_address(&self) -> ListenAddress {
        ListenAddress {
            host: self.server.host.clone(),
            port: self.server.port,
        }
    }

    /// Settings applied on every request; debug mode turns on verbose output
    pub fn live_settings(&self) -> LiveSettings {
        let debug = self.dev.debug;
        LiveSettings {
            level: if debug {
                "debug".to_string()
            } else {
                self.logging.level.clone()
            },
            access_log: self.logging.access_log,
            show_headers: self.logging.show_headers || debug,
            access_log_format: self.logging.access_log_format.clone(),
        }
    }
}
