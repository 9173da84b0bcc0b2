use crate::error::{EnclaveError, Result};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::*;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use url::Url;

// Type alias for the WebSocket stream
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CLOSE_FRAME_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closed,
}

impl SessionState {
    fn from_u8(raw: u8) -> Self {
        const CONNECTING: u8 = SessionState::Connecting as u8;
        const OPEN: u8 = SessionState::Open as u8;
        match raw {
            CONNECTING => SessionState::Connecting,
            OPEN => SessionState::Open,
            _ => SessionState::Closed,
        }
    }
}

/// Transport-level ping settings.
#[derive(Debug, Clone)]
pub struct KeepAlive {
    pub interval: Duration,
    pub payload: String,
}

/// One live WebSocket connection.
///
/// `send` and `receive` may run concurrently; each half has its own lock. Once the
/// session is closed, both fail with [`EnclaveError::ConnectionClosed`] and the session
/// cannot be reopened.
pub struct Session {
    writer: Mutex<SplitSink<WsStream, Message>>,
    reader: Mutex<SplitStream<WsStream>>,
    state: AtomicU8,
    closed: watch::Sender<bool>,
    keep_alive: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Opens a connection to `url` and starts the keep-alive task, if any.
    pub async fn connect(url: &Url, keep_alive: Option<KeepAlive>) -> Result<Arc<Self>> {
        info!("[Session] Connecting to WebSocket: {}", url);
        let (ws_stream, response) = connect_async(url.as_str()).await.map_err(|e| {
            EnclaveError::WebsocketError(format!("WebSocket connection failed: {}", e))
        })?;
        debug!(
            "[Session] WebSocket connected. Response: {:?}",
            response.status()
        );

        let (write, read) = ws_stream.split();
        let (closed, _) = watch::channel(false);
        let session = Arc::new(Self {
            writer: Mutex::new(write),
            reader: Mutex::new(read),
            state: AtomicU8::new(SessionState::Connecting as u8),
            closed,
            keep_alive: std::sync::Mutex::new(None),
        });
        session
            .state
            .store(SessionState::Open as u8, Ordering::SeqCst);

        if let Some(keep_alive) = keep_alive.filter(|k| !k.interval.is_zero()) {
            let handle = tokio::spawn(run_keep_alive(Arc::downgrade(&session), keep_alive));
            *session
                .keep_alive
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);
        }
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Sends one text frame.
    pub async fn send(&self, text: &str) -> Result<()> {
        if !self.is_open() {
            return Err(EnclaveError::ConnectionClosed);
        }
        trace!("[Session] Sending WS Text ({} bytes)", text.len()); // Avoid logging login payloads
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.send(Message::Text(text.to_string())).await {
            warn!("[Session] WebSocket send error: {}", e);
            self.mark_closed();
            return Err(EnclaveError::ConnectionClosed);
        }
        Ok(())
    }

    /// Waits for the next text frame.
    ///
    /// Control frames are consumed here; tungstenite answers pings on its own. Returns
    /// [`EnclaveError::ConnectionClosed`] when the peer closes, the transport fails, or
    /// [`Session::close`] is called from another task.
    pub async fn receive(&self) -> Result<String> {
        let closed_rx = self.closed.subscribe();
        let mut reader = self.reader.lock().await;
        loop {
            if !self.is_open() {
                return Err(EnclaveError::ConnectionClosed);
            }
            let next = tokio::select! {
                _ = wait_for_flag(closed_rx.clone()) => {
                    return Err(EnclaveError::ConnectionClosed);
                }
                next = reader.next() => next,
            };
            match next {
                Some(Ok(Message::Text(text))) => {
                    trace!("[Session] Received WS Text: {}", text);
                    return Ok(text);
                }
                Some(Ok(Message::Binary(bin))) => {
                    trace!("[Session] Ignoring WS Binary ({} bytes)", bin.len());
                }
                Some(Ok(Message::Ping(_))) => {
                    trace!("[Session] Received WS Ping");
                }
                Some(Ok(Message::Pong(_))) => {
                    trace!("[Session] Received WS Pong");
                }
                Some(Ok(Message::Close(close_frame))) => {
                    info!("[Session] Received WS Close frame: {:?}", close_frame);
                    self.mark_closed();
                    return Err(EnclaveError::ConnectionClosed);
                }
                Some(Ok(Message::Frame(_))) => { /* Ignore */ }
                Some(Err(e)) => {
                    warn!("[Session] WebSocket read error: {}", e);
                    self.mark_closed();
                    return Err(EnclaveError::ConnectionClosed);
                }
                None => {
                    info!("[Session] WebSocket stream ended (read None).");
                    self.mark_closed();
                    return Err(EnclaveError::ConnectionClosed);
                }
            }
        }
    }

    /// Closes the session and unblocks any pending `receive`. Safe to call repeatedly.
    pub async fn close(&self) {
        let was_closed = self.mark_closed();
        if was_closed {
            return;
        }
        debug!("[Session] Closing WebSocket.");
        let send_close = async {
            let mut writer = self.writer.lock().await;
            let _ = writer.send(Message::Close(None)).await;
        };
        if timeout(CLOSE_FRAME_TIMEOUT, send_close).await.is_err() {
            debug!("[Session] Timed out sending Close frame.");
        }
    }

    /// Marks the session closed, returning whether it already was.
    fn mark_closed(&self) -> bool {
        let previous = self
            .state
            .swap(SessionState::Closed as u8, Ordering::SeqCst);
        self.closed.send_replace(true);
        if let Some(handle) = self
            .keep_alive
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            handle.abort();
        }
        SessionState::from_u8(previous) == SessionState::Closed
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(handle) = self
            .keep_alive
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            handle.abort();
        }
    }
}

/// Sends a transport ping carrying the configured payload on every tick.
async fn run_keep_alive(session: Weak<Session>, keep_alive: KeepAlive) {
    let mut ticker = interval(keep_alive.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // First tick completes immediately
    loop {
        ticker.tick().await;
        let Some(session) = session.upgrade() else {
            break;
        };
        if !session.is_open() {
            break;
        }
        let payload = keep_alive.payload.clone().into_bytes();
        let mut writer = session.writer.lock().await;
        if let Err(e) = writer.send(Message::Ping(payload)).await {
            warn!("[Session] Keep-alive ping failed: {}", e);
            drop(writer);
            session.mark_closed();
            break;
        }
        trace!("[Session] Sent keep-alive ping");
    }
}

/// Resolves once the flag reads `true` (or its sender is gone).
pub(crate) async fn wait_for_flag(mut rx: watch::Receiver<bool>) {
    loop {
        let set = *rx.borrow_and_update();
        if set {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
