//! Reads the server settings from the environment.
//!
//! | variable | default | meaning |
//! |---|---|---|
//! | `PORT` | `8080` | the port for web sockets and static files |
//! | `BIND_ADDRESS` | `127.0.0.1` | the interface to listen on |
//! | `STATIC_DIR` | `public` | the directory the browser client is served from |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// The settings the relay server is started with.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
            static_dir: PathBuf::from("public"),
        }
    }
}

impl ServerConfig {
    /// Reads the settings from the process environment.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the settings through the lookup, unset or empty variables keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut config = ServerConfig::default();
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(port) = read("PORT") {
            config.port = port
                .trim()
                .parse()
                .map_err(|e| format!("Invalid PORT {port:?}: {e}"))?;
        }
        if let Some(address) = read("BIND_ADDRESS") {
            config.bind_address = address
                .trim()
                .parse()
                .map_err(|e| format!("Invalid BIND_ADDRESS {address:?}: {e}"))?;
        }
        if let Some(dir) = read("STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}
