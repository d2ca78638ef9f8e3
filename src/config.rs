//! Client configuration.

use std::time::Duration;

use url::Url;

use crate::error::TransportError;

/// Default simulator host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default simulator port.
pub const DEFAULT_PORT: u16 = 8765;

/// Default time allowed for the WebSocket handshake (10 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// What to do after the connection drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectPolicy {
    /// Stay disconnected until `start()` is called again
    #[default]
    Never,
    /// Re-enter `Connecting` after a fixed delay
    After(Duration),
}

impl ReconnectPolicy {
    /// Delay before the next attempt, if retrying at all.
    pub fn delay(&self) -> Option<Duration> {
        match self {
            Self::Never => None,
            Self::After(delay) => Some(*delay),
        }
    }
}

/// Connection settings for the bout-state source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// WebSocket endpoint (`ws://` or `wss://`)
    pub endpoint: Url,

    /// Handshake deadline
    pub connect_timeout: Duration,

    /// Retry behaviour after a drop
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect: ReconnectPolicy::Never,
        }
    }
}

impl ClientConfig {
    /// Build a config pointing at `ws://{host}:{port}`.
    pub fn from_host_port(host: &str, port: u16) -> Result<Self, TransportError> {
        Self::from_url(&format!("ws://{}:{}", host, port))
    }

    /// Build a config from a full endpoint URL.
    pub fn from_url(raw: &str) -> Result<Self, TransportError> {
        let endpoint = Url::parse(raw).map_err(|err| TransportError::InvalidEndpoint {
            endpoint: raw.to_string(),
            reason: err.to_string(),
        })?;

        match endpoint.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(TransportError::InvalidEndpoint {
                    endpoint: raw.to_string(),
                    reason: format!("unsupported scheme '{}'", other),
                })
            }
        }
        if endpoint.host_str().is_none() {
            return Err(TransportError::InvalidEndpoint {
                endpoint: raw.to_string(),
                reason: "missing host".to_string(),
            });
        }

        Ok(Self {
            endpoint,
            ..Self::default()
        })
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}

fn default_endpoint() -> Url {
    Url::parse(&format!("ws://{}:{}", DEFAULT_HOST, DEFAULT_PORT)).expect("valid default endpoint")
}
