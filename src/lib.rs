pub mod auth;
pub mod config;
pub mod error;
pub mod types;
pub mod websocket;
pub use config::{ClientConfig, Credential};
pub use error::{EnclaveError, Result};
pub use websocket::{Callback, Hooks, WebSocketClient};
