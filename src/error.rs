use thiserror::Error;
use url::ParseError;

pub type Result<T, E = EnclaveError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum EnclaveError {
    #[error("WebSocket Error: {0}")]
    WebsocketError(String),

    #[error("Connection Closed")]
    ConnectionClosed,

    #[error("Not Connected")]
    NotConnected,

    #[error("Authentication Error: {0}")]
    AuthenticationError(String),

    #[error("Callback Panic: channel={channel}, message={message}")]
    CallbackPanic { channel: String, message: String },

    #[error("Configuration Error: {0}")]
    ConfigError(String),

    #[error("Invalid Decimal: field '{field}' has value {value}")]
    InvalidDecimal { field: String, value: String },

    #[error("JSON Serialization/Deserialization Error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("URL Parsing Error: {0}")]
    UrlParseError(#[from] ParseError),
}

impl EnclaveError {
    /// Whether this error should end the reconnect loop instead of triggering another attempt.
    ///
    /// Only a rejected (or unanswered) login qualifies; retrying bad credentials forever would
    /// hide the problem from the caller.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EnclaveError::AuthenticationError(_))
    }
}
