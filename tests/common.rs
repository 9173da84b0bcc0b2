// tests/common.rs
#![allow(dead_code)]

use enclave_connector_rs::{Callback, ClientConfig, Credential, Hooks, WebSocketClient};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use std::sync::Once;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{accept_async, tungstenite::protocol::Message, WebSocketStream};

pub const KEY: &str = "enclaveKeyId_test";
pub const SECRET: &str = "enclaveApiSecret_test";

/// Upper bound on any single wait in these tests.
pub const WAIT: Duration = Duration::from_secs(5);

pub type ServerWs = WebSocketStream<TcpStream>;

static INIT: Once = Once::new();

// Loads .env (if any) and a test logger once across all tests.
pub fn setup() {
    INIT.call_once(|| {
        dotenv::dotenv().ok();
        env_logger::builder().is_test(true).try_init().ok();
    });
}

pub fn credential() -> Credential {
    Credential::new(KEY, SECRET)
}

pub fn test_config(url: &str) -> ClientConfig {
    ClientConfig::default()
        .with_base_url(url)
        .expect("valid test url")
        .with_reconnect_delay(Duration::from_millis(50))
        .with_login_timeout(Duration::from_secs(2))
}

pub fn client(url: &str, hooks: Hooks) -> WebSocketClient {
    WebSocketClient::with_config(credential(), test_config(url), hooks).expect("client")
}

/// Spawns `run(0)` (no keep-alive pings) on a clone of the client.
pub fn spawn_run(client: &WebSocketClient) -> JoinHandle<enclave_connector_rs::Result<bool>> {
    spawn_run_with_pings(client, 0)
}

pub fn spawn_run_with_pings(
    client: &WebSocketClient,
    ping_interval_secs: u64,
) -> JoinHandle<enclave_connector_rs::Result<bool>> {
    let runner = client.clone();
    tokio::spawn(async move { runner.run(ping_interval_secs).await })
}

/// Callback forwarding every message into a channel.
pub fn channel_callback() -> (Callback, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback: Callback = Arc::new(move |msg: &Value| {
        let _ = tx.send(msg.clone());
    });
    (callback, rx)
}

pub async fn recv(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for callback")
        .expect("callback channel closed")
}

// --- Mock server ---

pub async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, format!("ws://127.0.0.1:{}", port))
}

pub async fn accept(listener: &TcpListener) -> ServerWs {
    let (stream, _) = timeout(WAIT, listener.accept())
        .await
        .expect("timed out waiting for client connection")
        .unwrap();
    accept_async(stream).await.unwrap()
}

/// Next text frame from the client, parsed. Control frames are skipped.
pub async fn next_json(ws: &mut ServerWs) -> Value {
    loop {
        match timeout(WAIT, ws.next()).await.expect("timed out waiting for frame") {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
            Some(Ok(Message::Close(frame))) => panic!("client closed: {:?}", frame),
            Some(Ok(_)) => continue,
            Some(Err(e)) => panic!("server read error: {}", e),
            None => panic!("client disconnected"),
        }
    }
}

pub async fn send_json(ws: &mut ServerWs, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

pub async fn send_raw(ws: &mut ServerWs, text: &str) {
    ws.send(Message::Text(text.to_string())).await.unwrap();
}

/// Reads the login frame, acknowledges it and returns it.
pub async fn complete_login(ws: &mut ServerWs) -> Value {
    let login = next_json(ws).await;
    assert_eq!(login["op"], "login");
    send_json(ws, json!({"type": "loggedIn"})).await;
    login
}

/// Reads `n` frames that must all be subscribes, returning their channels sorted.
pub async fn read_subscribes(ws: &mut ServerWs, n: usize) -> Vec<String> {
    let mut channels = Vec::with_capacity(n);
    for _ in 0..n {
        let frame = next_json(ws).await;
        assert_eq!(frame["op"], "subscribe", "unexpected frame {}", frame);
        channels.push(frame["channel"].as_str().unwrap().to_string());
    }
    channels.sort();
    channels
}

pub fn update(channel: &str, data: Value) -> Value {
    json!({"type": "update", "channel": channel, "data": data})
}
