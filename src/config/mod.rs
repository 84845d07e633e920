// Configuration module entry point
// Layers defaults, config file, environment and CLI overrides

mod state;
mod types;

use std::net::SocketAddr;

use crate::error::ServerError;

pub use state::AppState;
pub use types::{Config, Overrides, SiteConfig};

/// Prefix for environment overrides, e.g. `FRAME_SITE_SERVER__PORT=8080`
const ENV_PREFIX: &str = "FRAME_SITE";

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str, overrides: &Overrides) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5001)?
            .set_default("server.backlog", 128)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.show_headers", false)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("performance.shutdown_grace", 5)?
            .set_default("http.server_name", "frame-site/0.1")?
            .set_default("http.enable_cors", false)?
            .set_default("site.static_dir", "static")?;

        if let Some(host) = &overrides.host {
            builder = builder.set_override("server.host", host.as_str())?;
        }
        if let Some(port) = overrides.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, ServerError> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse()
            .map_err(|source| ServerError::Address { addr, source })
    }

    /// Keep-alive is a switch: 0 turns it off, any other value turns it on.
    /// Idle keep-alive connections are still bounded by `connection_timeout`.
    pub const fn keep_alive_enabled(&self) -> bool {
        self.performance.keep_alive_timeout > 0
    }

    /// Duration after which a connection is forcibly closed
    pub fn connection_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(std::cmp::max(
            self.performance.read_timeout,
            self.performance.write_timeout,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_defaults() -> Config {
        Config::load_from("does-not-exist", &Overrides::default()).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cfg = load_defaults();
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.server.port, 5001);
        assert_eq!(cfg.server.workers, None);
        assert_eq!(cfg.logging.access_log_format, "combined");
        assert_eq!(cfg.site.static_dir, "static");
        assert!(cfg.site.health.enabled);
        assert_eq!(cfg.site.health.path, "/healthz");
        assert_eq!(cfg.http.max_body_size, None);
    }

    #[test]
    fn test_cli_overrides_win() {
        let overrides = Overrides {
            host: Some("0.0.0.0".to_string()),
            port: Some(9090),
        };
        let cfg = Config::load_from("does-not-exist", &overrides).unwrap();
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(
            cfg.get_socket_addr().unwrap(),
            "0.0.0.0:9090".parse().unwrap()
        );
    }

    #[test]
    fn test_invalid_host_is_reported() {
        let mut cfg = load_defaults();
        cfg.server.host = "not an address".to_string();
        let err = cfg.get_socket_addr().unwrap_err();
        assert!(err.to_string().contains("not an address"));
    }

    #[test]
    fn test_connection_timeout_uses_larger_value() {
        let mut cfg = load_defaults();
        cfg.performance.read_timeout = 10;
        cfg.performance.write_timeout = 45;
        assert_eq!(cfg.connection_timeout().as_secs(), 45);
    }

    #[test]
    fn test_keep_alive_switch() {
        let mut cfg = load_defaults();
        assert!(cfg.keep_alive_enabled());
        cfg.performance.keep_alive_timeout = 0;
        assert!(!cfg.keep_alive_enabled());
    }
}
