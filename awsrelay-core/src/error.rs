//! Relay error types

use thiserror::Error;

/// Errors raised outside the observation path.
///
/// Codec and store problems never surface here: they are contained where they
/// happen. This type covers startup failures and upstream transport failures.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid upstream URL {url}: {reason}")]
    InvalidUpstream { url: String, reason: String },

    #[error("Invalid listen address {addr}: {reason}")]
    InvalidListenAddr { addr: String, reason: String },

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RelayError {
    pub fn invalid_upstream(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidUpstream {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_listen_addr(addr: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidListenAddr {
            addr: addr.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error happened while talking to the upstream endpoint
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }
}
