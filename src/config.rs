use crate::error::{EnclaveError, Result};
use std::fmt;
use std::time::Duration;
use url::Url;
use zeroize::Zeroizing;

pub const MAINNET_WS_URL: &str = "wss://api.enclave.market/ws";
pub const SANDBOX_WS_URL: &str = "wss://api-sandbox.enclave.market/ws";

const DEFAULT_PING_INTERVAL_SECS: u64 = 15;
const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 20;
const DEFAULT_RECONNECT_DELAY_MS: u64 = 1_000;
const DEFAULT_PING_PAYLOAD: &str = r#"{"op":"ping"}"#;

/// API key id and secret. Fixed for the lifetime of a client.
///
/// The secret is wiped from memory on drop and never shows up in `Debug` output.
#[derive(Clone)]
pub struct Credential {
    key: String,
    secret: Zeroizing<String>,
}

impl Credential {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: Zeroizing::new(secret.into()),
        }
    }

    /// Reads `ENCLAVE_KEY` and `ENCLAVE_SECRET`.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(
            required_env("ENCLAVE_KEY")?,
            required_env("ENCLAVE_SECRET")?,
        ))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String, // The ws:// or wss:// endpoint
    pub ping_interval: Duration, // Zero disables keep-alive pings
    pub login_timeout: Duration, // Bound on the wait for the login reply
    pub reconnect_delay: Duration, // Pause between connection attempts
    pub ping_payload: String, // Application data carried by transport pings
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: MAINNET_WS_URL.to_string(),
            ping_interval: Duration::from_secs(DEFAULT_PING_INTERVAL_SECS),
            login_timeout: Duration::from_secs(DEFAULT_LOGIN_TIMEOUT_SECS),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            ping_payload: DEFAULT_PING_PAYLOAD.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn sandbox() -> Self {
        Self {
            base_url: SANDBOX_WS_URL.to_string(),
            ..Self::default()
        }
    }

    /// Builds a config from the environment, falling back to defaults.
    ///
    /// Recognised variables: `ENCLAVE_WS_URL`, `ENCLAVE_PING_INTERVAL_SECS`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("ENCLAVE_WS_URL") {
            config = config.with_base_url(&url)?;
        }
        if let Ok(secs) = std::env::var("ENCLAVE_PING_INTERVAL_SECS") {
            let secs = secs.parse::<u64>().map_err(|e| {
                EnclaveError::ConfigError(format!(
                    "ENCLAVE_PING_INTERVAL_SECS must be an integer: {}",
                    e
                ))
            })?;
            config.ping_interval = Duration::from_secs(secs);
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, url: &str) -> Result<Self> {
        self.base_url = url.to_string();
        self.endpoint()?;
        Ok(self)
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_ping_payload(mut self, payload: impl Into<String>) -> Self {
        self.ping_payload = payload.into();
        self
    }

    /// Parses `base_url`, accepting only `ws` and `wss` schemes.
    pub fn endpoint(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url)?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(EnclaveError::ConfigError(format!(
                "Unsupported WebSocket scheme '{}' in {}",
                other, self.base_url
            ))),
        }
    }
}

fn required_env(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| EnclaveError::ConfigError(format!("{} environment variable not set", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, MAINNET_WS_URL);
        assert_eq!(config.ping_interval, Duration::from_secs(15));
        assert_eq!(config.login_timeout, Duration::from_secs(20));
        assert_eq!(config.ping_payload, r#"{"op":"ping"}"#);
        assert_ok!(config.endpoint());
    }

    #[test]
    fn test_sandbox_endpoint() {
        let url = ClientConfig::sandbox().endpoint().unwrap();
        assert_eq!(url.host_str(), Some("api-sandbox.enclave.market"));
    }

    #[test]
    fn test_rejects_non_websocket_scheme() {
        let result = ClientConfig::default().with_base_url("https://api.enclave.market/ws");
        assert!(matches!(result, Err(EnclaveError::ConfigError(_))));
        assert_err!(ClientConfig::default().with_base_url("not a url"));
        assert_ok!(ClientConfig::default().with_base_url("ws://127.0.0.1:9000"));
    }

    #[test]
    fn test_credential_debug_redacts_secret() {
        let credential = Credential::new("enclaveKeyId_abc", "enclaveApiSecret_xyz");
        let rendered = format!("{:?}", credential);
        assert!(rendered.contains("enclaveKeyId_abc"));
        assert!(!rendered.contains("enclaveApiSecret_xyz"));
        assert_eq!(credential.secret(), "enclaveApiSecret_xyz");
    }
}
