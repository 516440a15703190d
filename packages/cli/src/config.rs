// ABOUTME: Server configuration for the crowbox binary
// ABOUTME: Bind address, CORS origin and database location read from the environment

use crowbox_config::constants::{
    CROWBOX_API_HOST, CROWBOX_API_PORT, CROWBOX_CORS_ORIGIN, CROWBOX_DATABASE_URL, PORT,
};
use crowbox_config::parse_env_string;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::num::ParseIntError;
use thiserror::Error;

pub const DEFAULT_API_PORT: u16 = 8080;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://crowbox.db";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid port number: {0}")]
    InvalidPort(#[from] ParseIntError),
    #[error("Port {0} is out of valid range (1-65535)")]
    PortOutOfRange(u16),
    #[error("Invalid bind host: {0}")]
    InvalidHost(String),
}

/// Database location, the only server setting the offline commands need
pub fn database_url_from_env() -> String {
    parse_env_string(CROWBOX_DATABASE_URL, DEFAULT_DATABASE_URL)
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub cors_origin: String,
    pub database_url: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // CROWBOX_API_PORT wins over the legacy PORT
        let port_str = env::var(CROWBOX_API_PORT)
            .or_else(|_| env::var(PORT))
            .unwrap_or_else(|_| DEFAULT_API_PORT.to_string());
        let port = port_str.trim().parse::<u16>()?;
        if port == 0 {
            return Err(ConfigError::PortOutOfRange(port));
        }

        let host_str = parse_env_string(CROWBOX_API_HOST, "127.0.0.1");
        let host = host_str
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::InvalidHost(host_str.clone()))?;

        Ok(Self {
            host,
            port,
            cors_origin: parse_env_string(CROWBOX_CORS_ORIGIN, "http://localhost:3000"),
            database_url: database_url_from_env(),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
