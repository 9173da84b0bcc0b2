//! Authenticated, auto-reconnecting WebSocket client for Enclave Markets streams.
//!
//! A single [`WebSocketClient`] owns one transport connection at a time and one desired
//! subscription set that outlives any individual connection.
//!
//! # Architecture
//!
//! - [`session`]: one live connection with `send`/`receive`/`close` and a keep-alive ping task
//! - [`handshake`]: the `login` exchange that must succeed before any subscription traffic
//! - [`registry`]: channel to callback map, replayed verbatim after every reconnect
//! - [`dispatcher`]: parses frames and routes `update`s to callbacks, isolating panics
//! - [`client`]: the reconnect loop tying these together
//!
//! Each cycle of the loop connects, logs in, publishes the session, resubscribes every
//! registered channel and then streams until the session closes. Only then does it wait and
//! reconnect. `close()` is the only way out, apart from a rejected login.
//!
//! # Usage
//!
//! ```no_run
//! use enclave_connector_rs::{Credential, Hooks, WebSocketClient};
//! use serde_json::Value;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = WebSocketClient::new(
//!         Credential::new("enclaveKeyId_...", "enclaveApiSecret_..."),
//!         "wss://api-sandbox.enclave.market/ws",
//!         Hooks::new().on_error(|e| eprintln!("ws error: {}", e)),
//!     )
//!     .expect("valid endpoint");
//!
//!     // Sent as soon as the first login succeeds
//!     client.add_pending_subscription("prices", Arc::new(|msg: &Value| println!("{}", msg)));
//!
//!     let runner = client.clone();
//!     tokio::spawn(async move {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for ctrl+c");
//!         runner.close().await;
//!     });
//!
//!     match client.run(15).await {
//!         Ok(_) => println!("stopped"),
//!         Err(e) => eprintln!("login failed: {}", e),
//!     }
//! }
//! ```
//!
//! # Message Handling
//!
//! Callbacks receive the whole parsed `update` frame, numbers included at full precision;
//! use [`crate::types::decimal_at`] or [`crate::types::Update`] to read decimal fields.
//! They run on the loop's task, so they should be quick. A panicking callback is reported
//! through `on_error` and the next frame is dispatched as usual.

pub mod client;
pub mod dispatcher;
pub mod handshake;
pub mod hooks;
pub mod registry;
pub mod session;

// Re-export the client types for easier access
pub use client::{ClientState, WebSocketClient};
pub use hooks::Hooks;
pub use registry::{Callback, SubscriptionRegistry};
pub use session::{KeepAlive, Session, SessionState};
