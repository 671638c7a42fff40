//! `[serve]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [serve]
//! interface = "127.0.0.1"   # Network interface (0.0.0.0 = LAN accessible)
//! port = 8088               # HTTP port number
//! hostname = "devbox.lan"   # Host written into the lite userscript's @require
//! watch = true              # Rebuild on file changes
//! ```

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

/// Userscript server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Network interface to bind.
    pub interface: IpAddr,

    /// HTTP port number.
    pub port: u16,

    /// Hostname advertised to userscript managers.
    /// Defaults to `$HOSTNAME`, then `localhost`.
    pub hostname: Option<String>,

    /// Enable file watcher for live rebuilds.
    pub watch: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 8088,
            hostname: None,
            watch: true,
        }
    }
}

impl ServeConfig {
    /// Hostname used in generated userscript headers.
    pub fn advertised_host(&self) -> String {
        self.hostname
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty()))
            .unwrap_or_else(|| "localhost".to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use crate::config::test_parse_config;

    #[test]
    fn test_serve_config() {
        let config = test_parse_config(
            "[serve]\ninterface = \"0.0.0.0\"\nport = 9000\nwatch = false\nhostname = \"box\"",
        );

        assert_eq!(config.serve.interface, IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        assert_eq!(config.serve.port, 9000);
        assert!(!config.serve.watch);
        assert_eq!(config.serve.advertised_host(), "box");
    }

    #[test]
    fn test_serve_config_defaults() {
        let config = test_parse_config("");

        assert_eq!(
            config.serve.interface,
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
        );
        assert_eq!(config.serve.port, 8088);
        assert!(config.serve.watch);
        assert!(config.serve.hostname.is_none());
    }
}
