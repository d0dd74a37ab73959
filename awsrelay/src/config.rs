//! Configuration management

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use url::Url;

use awsrelay_core::RelayError;
use awsrelay_sqs::parse_upstream;

const DEFAULT_CONFIG_NAME: &str = "awsrelay";

/// Relay configuration, as read from file before command-line overrides
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_dashboard_addr")]
    pub dashboard_addr: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream_url: default_upstream_url(),
            listen_addr: default_listen_addr(),
            dashboard_addr: default_dashboard_addr(),
            log_level: default_log_level(),
        }
    }
}

fn default_upstream_url() -> String {
    "http://localstack:4566".to_string()
}

fn default_listen_addr() -> String {
    "0.0.0.0:4567".to_string()
}

fn default_dashboard_addr() -> String {
    "0.0.0.0:4568".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Validated settings the relay starts with
#[derive(Debug, Clone)]
pub struct Settings {
    pub upstream: Url,
    pub listen: SocketAddr,
    pub dashboard: SocketAddr,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// An explicitly named file must exist; the default `awsrelay.{toml,json,yaml}` is optional.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let source = match path {
            Some(path) => ::config::File::from(path).required(true),
            None => ::config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let config = ::config::Config::builder().add_source(source).build()?;
        Ok(config.try_deserialize::<Config>()?)
    }

    /// Apply command-line/environment values over the file values
    pub fn override_with(
        &mut self,
        upstream_url: Option<String>,
        listen_addr: Option<String>,
        dashboard_addr: Option<String>,
        log_level: Option<String>,
    ) {
        if let Some(v) = upstream_url {
            self.upstream_url = v;
        }
        if let Some(v) = listen_addr {
            self.listen_addr = v;
        }
        if let Some(v) = dashboard_addr {
            self.dashboard_addr = v;
        }
        if let Some(v) = log_level {
            self.log_level = v;
        }
    }

    /// Validate addresses and the upstream URL
    pub fn resolve(&self) -> Result<Settings, RelayError> {
        Ok(Settings {
            upstream: parse_upstream(&self.upstream_url)?,
            listen: parse_listen_addr(&self.listen_addr)?,
            dashboard: parse_listen_addr(&self.dashboard_addr)?,
        })
    }
}

/// Parse a listen address; `:4567` binds every interface
pub fn parse_listen_addr(addr: &str) -> Result<SocketAddr, RelayError> {
    let full = if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    };

    full.parse()
        .map_err(|e| RelayError::invalid_listen_addr(addr, e))
}
