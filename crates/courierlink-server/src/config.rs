// Copyright (C) 2025 Courierlink Ltd.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Server configuration loaded from environment variables.

use std::net::SocketAddr;

/// Runtime configuration for the console server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Postgres connection string; absent means the in-memory store.
    pub database_url: Option<String>,
    /// Allow proxy targets on loopback/private ranges. Off outside tests
    /// and local development.
    pub allow_private_hosts: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port: u16 = std::env::var("COURIERLINK_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;
        let bind_addr = SocketAddr::from(([0, 0, 0, 0], port));

        let database_url = std::env::var("COURIERLINK_DATABASE_URL")
            .ok()
            .filter(|url| !url.is_empty());

        let allow_private_hosts = std::env::var("COURIERLINK_ALLOW_PRIVATE_HOSTS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            bind_addr,
            database_url,
            allow_private_hosts,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The port number is invalid.
    #[error("Invalid port number in COURIERLINK_PORT")]
    InvalidPort,
}
