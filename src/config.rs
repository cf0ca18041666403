// src/config.rs

//! Client configuration: loading and defaults.

use crate::connection::DEFAULT_BUFFER_SIZE;
use anyhow::{Context, Result};
use serde::Deserialize;

fn default_addr() -> String {
    "127.0.0.1:6379".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    2_000
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

/// Settings for establishing and buffering one connection.
///
/// Pooling, TLS, and credentials live with the host; this covers only what
/// the client itself needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// `host:port` of the server.
    #[serde(default = "default_addr")]
    pub addr: String,

    /// How long to wait for the TCP connect, in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Initial capacity of the input buffer, in bytes.
    #[serde(default = "default_buffer_size")]
    pub read_buffer_size: usize,

    /// Initial capacity of the output buffer, in bytes.
    #[serde(default = "default_buffer_size")]
    pub write_buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            connect_timeout_ms: default_connect_timeout_ms(),
            read_buffer_size: default_buffer_size(),
            write_buffer_size: default_buffer_size(),
        }
    }
}

impl ClientConfig {
    /// Loads settings from a TOML file, with `DILO_*` environment variables
    /// taking precedence over file values.
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("DILO"))
            .build()
            .with_context(|| format!("failed to read configuration from \"{path}\""))?;
        settings
            .try_deserialize()
            .context("invalid configuration values")
    }
}
