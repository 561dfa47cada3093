//! Remote store configuration

use std::time::Duration;

/// Configuration for [`RemoteStore`](crate::RemoteStore)
#[derive(Clone, Debug)]
pub struct Config {
    /// Storage endpoint URL
    pub endpoint: String,
    /// Bearer access token
    pub access_token: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:10000".to_string(),
            access_token: None,
            timeout: Duration::from_secs(30),
            user_agent: format!("cumulus-store/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    /// Create a new config with the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the access token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
