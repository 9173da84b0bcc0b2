use super::dispatcher;
use super::handshake;
use super::hooks::Hooks;
use super::registry::{Callback, SubscriptionRegistry};
use super::session::{wait_for_flag, KeepAlive, Session};
use crate::config::{ClientConfig, Credential};
use crate::error::{EnclaveError, Result};
use crate::types::OutboundFrame;
use log::*;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::time::{sleep, Duration};
use url::Url;

/// Where the reconnect loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connecting,
    Authenticating,
    Subscribing,
    Streaming,
    Stopped,
}

impl ClientState {
    fn from_u8(raw: u8) -> Self {
        const CONNECTING: u8 = ClientState::Connecting as u8;
        const AUTHENTICATING: u8 = ClientState::Authenticating as u8;
        const SUBSCRIBING: u8 = ClientState::Subscribing as u8;
        const STREAMING: u8 = ClientState::Streaming as u8;
        const STOPPED: u8 = ClientState::Stopped as u8;
        match raw {
            CONNECTING => ClientState::Connecting,
            AUTHENTICATING => ClientState::Authenticating,
            SUBSCRIBING => ClientState::Subscribing,
            STREAMING => ClientState::Streaming,
            STOPPED => ClientState::Stopped,
            _ => ClientState::Disconnected,
        }
    }
}

/// Why one pass through the connect/stream cycle ended.
enum Cycle {
    Stopped,
    Reconnect,
}

struct Inner {
    credential: Credential,
    config: ClientConfig,
    endpoint: Url,
    hooks: Hooks,
    // Guards the current session; held across connect+login+replay and around every
    // subscribe/unsubscribe send, never across a streaming receive.
    session: Mutex<Option<Arc<Session>>>,
    // Lock-free copy of the published session for the read-only accessors.
    published: watch::Sender<Option<Arc<Session>>>,
    registry: std::sync::Mutex<SubscriptionRegistry>,
    state: AtomicU8,
    stopping: AtomicBool,
    stop_signal: watch::Sender<bool>,
}

/// Authenticated, auto-reconnecting streaming client.
///
/// Subscriptions live in the client, not the connection: every new session logs in and
/// replays all of them before any update is dispatched. Cloning is cheap and every clone
/// drives the same connection.
#[derive(Clone)]
pub struct WebSocketClient {
    inner: Arc<Inner>,
}

impl WebSocketClient {
    pub fn new(credential: Credential, endpoint_url: &str, hooks: Hooks) -> Result<Self> {
        let config = ClientConfig::default().with_base_url(endpoint_url)?;
        Self::with_config(credential, config, hooks)
    }

    pub fn with_config(
        credential: Credential,
        config: ClientConfig,
        hooks: Hooks,
    ) -> Result<Self> {
        let endpoint = config.endpoint()?;
        let (stop_signal, _) = watch::channel(false);
        let (published, _) = watch::channel(None);
        Ok(Self {
            inner: Arc::new(Inner {
                credential,
                config,
                endpoint,
                hooks,
                session: Mutex::new(None),
                published,
                registry: std::sync::Mutex::new(SubscriptionRegistry::new()),
                state: AtomicU8::new(ClientState::Disconnected as u8),
                stopping: AtomicBool::new(false),
                stop_signal,
            }),
        })
    }

    pub fn state(&self) -> ClientState {
        ClientState::from_u8(self.inner.state.load(Ordering::SeqCst))
    }

    /// Whether an authenticated session is published and still open. Never waits on a login.
    pub fn is_connected(&self) -> bool {
        self.inner
            .published
            .borrow()
            .as_ref()
            .map_or(false, |session| session.is_open())
    }

    /// The authenticated session, if one is currently published.
    pub fn current_session(&self) -> Result<Arc<Session>> {
        self.inner
            .published
            .borrow()
            .clone()
            .ok_or(EnclaveError::NotConnected)
    }

    /// Channels that will be (re)subscribed on the next connect.
    pub fn pending_channels(&self) -> Vec<String> {
        self.registry().channels()
    }

    /// Records a subscription without touching the network. It is sent on the next connect.
    pub fn add_pending_subscription(&self, channel: impl Into<String>, callback: Callback) {
        let channel = channel.into();
        debug!("[Client] Pending subscription for {}", channel);
        self.registry().insert(channel, callback);
    }

    /// Registers `callback` for `channel` and, if a session is open, sends the subscribe frame.
    ///
    /// Returns `false` when no frame went out. The subscription is still registered and will
    /// be activated on the next connect; that is not an error.
    pub async fn subscribe(&self, channel: impl Into<String>, callback: Callback) -> bool {
        let channel = channel.into();
        let guard = self.inner.session.lock().await;
        self.registry().insert(channel.clone(), callback);
        match guard.as_ref() {
            Some(session) if session.is_open() => {
                send_frame(session, &OutboundFrame::subscribe(&channel)).await
            }
            _ => {
                debug!(
                    "[Client] Not connected; {} registered, to be activated on next connect",
                    channel
                );
                false
            }
        }
    }

    /// Drops the channel's callback and, if connected, sends the unsubscribe frame.
    ///
    /// Unsubscribing a channel that has no callback is a no-op and reports success.
    pub async fn unsubscribe(&self, channel: &str) -> bool {
        let guard = self.inner.session.lock().await;
        let removed = self.registry().remove(channel).is_some();
        if !removed {
            return true;
        }
        match guard.as_ref() {
            Some(session) if session.is_open() => {
                send_frame(session, &OutboundFrame::unsubscribe(channel)).await
            }
            _ => {
                debug!("[Client] Not connected; {} removed locally only", channel);
                false
            }
        }
    }

    /// Stops the reconnect loop and closes the current session. Idempotent.
    pub async fn close(&self) {
        if !self.inner.stopping.swap(true, Ordering::SeqCst) {
            info!("[Client] Stopping WebSocket client...");
        }
        self.inner.stop_signal.send_replace(true);
        let guard = self.inner.session.lock().await;
        if let Some(session) = guard.as_ref() {
            session.close().await;
        }
    }

    /// Runs the connect, login, resubscribe, stream cycle until [`close`](Self::close) is called.
    ///
    /// `ping_interval_secs` overrides the configured keep-alive interval; `0` disables pings.
    /// Returns `Ok(true)` once stopped by `close`. A rejected or unanswered login ends the
    /// loop with [`EnclaveError::AuthenticationError`] unless `close` was called first; every
    /// other failure reconnects.
    pub async fn run(&self, ping_interval_secs: u64) -> Result<bool> {
        let keep_alive = KeepAlive {
            interval: Duration::from_secs(ping_interval_secs),
            payload: self.inner.config.ping_payload.clone(),
        };
        let outcome = loop {
            match self.run_once(&keep_alive).await {
                Ok(Cycle::Stopped) => break Ok(true),
                Ok(Cycle::Reconnect) => {
                    if self.wait_before_reconnect().await {
                        break Ok(true);
                    }
                }
                Err(e) => break Err(e),
            }
        };
        self.set_state(ClientState::Stopped);
        self.inner.hooks.exited();
        info!("[Client] Reconnect loop finished.");
        outcome
    }

    async fn run_once(&self, keep_alive: &KeepAlive) -> Result<Cycle> {
        if self.is_stopping() {
            return Ok(Cycle::Stopped);
        }

        self.set_state(ClientState::Connecting);
        info!("[Manager] Connecting to {}", self.inner.endpoint);
        let connect = Session::connect(&self.inner.endpoint, Some(keep_alive.clone()));
        let session = tokio::select! {
            _ = wait_for_flag(self.inner.stop_signal.subscribe()) => return Ok(Cycle::Stopped),
            connected = connect => match connected {
                Ok(session) => session,
                Err(e) => {
                    error!("[Manager] Failed to establish connection: {}", e);
                    self.inner.hooks.error(&e);
                    self.set_state(ClientState::Disconnected);
                    return Ok(Cycle::Reconnect);
                }
            },
        };
        self.inner.hooks.connected();

        let mut guard = self.inner.session.lock().await;
        if self.is_stopping() {
            drop(guard);
            session.close().await;
            return Ok(Cycle::Stopped);
        }

        self.set_state(ClientState::Authenticating);
        let login =
            handshake::login(&session, &self.inner.credential, self.inner.config.login_timeout);
        // `close` must not wait out the login reply timeout.
        let login_result = tokio::select! {
            _ = wait_for_flag(self.inner.stop_signal.subscribe()) => None,
            result = login => Some(result),
        };
        let login_result = match login_result {
            Some(result) => result,
            None => {
                info!("[Manager] Stop requested during login.");
                drop(guard);
                session.close().await;
                self.inner.hooks.disconnected();
                self.set_state(ClientState::Disconnected);
                return Ok(Cycle::Stopped);
            }
        };
        if let Err(e) = login_result {
            drop(guard);
            session.close().await;
            self.set_state(ClientState::Disconnected);
            if self.is_stopping() {
                debug!("[Manager] Login ended by stop: {}", e);
                self.inner.hooks.disconnected();
                return Ok(Cycle::Stopped);
            }
            self.inner.hooks.error(&e);
            self.inner.hooks.disconnected();
            if e.is_fatal() {
                error!(
                    "[Manager] Login rejected; credentials for key {} may be invalid: {}",
                    self.inner.credential.key(),
                    e
                );
                return Err(e);
            }
            warn!("[Manager] Connection lost during login: {}", e);
            return Ok(Cycle::Reconnect);
        }
        *guard = Some(Arc::clone(&session));
        self.inner.published.send_replace(Some(Arc::clone(&session)));
        self.inner.hooks.authenticated();

        self.set_state(ClientState::Subscribing);
        let channels = self.pending_channels();
        info!("[Manager] Resubscribing to {} channels...", channels.len());
        let mut replayed = true;
        for channel in &channels {
            if !send_frame(&session, &OutboundFrame::subscribe(channel)).await {
                error!(
                    "[Manager] Failed to send resubscription for '{}'. Aborting resubscribe.",
                    channel
                );
                replayed = false;
                break;
            }
        }
        drop(guard);

        if replayed {
            self.set_state(ClientState::Streaming);
            self.stream(&session).await;
        }

        {
            let mut guard = self.inner.session.lock().await;
            if guard
                .as_ref()
                .map_or(false, |current| Arc::ptr_eq(current, &session))
            {
                *guard = None;
                self.inner.published.send_replace(None);
            }
        }
        session.close().await;
        self.set_state(ClientState::Disconnected);
        self.inner.hooks.disconnected();

        if self.is_stopping() {
            Ok(Cycle::Stopped)
        } else {
            warn!("[Manager] Disconnected.");
            Ok(Cycle::Reconnect)
        }
    }

    /// Receives and dispatches frames until the session closes.
    async fn stream(&self, session: &Session) {
        loop {
            let text = match session.receive().await {
                Ok(text) => text,
                Err(EnclaveError::ConnectionClosed) => break,
                Err(e) => {
                    self.inner.hooks.error(&e);
                    break;
                }
            };
            dispatcher::dispatch(
                &text,
                |channel| self.registry().get(channel),
                &self.inner.hooks,
            );
            tokio::task::yield_now().await;
        }
        info!("[Manager] Session closed.");
    }

    /// Sleeps for the reconnect delay. Returns `true` if `close` was called meanwhile.
    async fn wait_before_reconnect(&self) -> bool {
        if self.is_stopping() {
            return true;
        }
        let delay = self.inner.config.reconnect_delay;
        warn!("[Manager] Reconnecting in {:?}...", delay);
        tokio::select! {
            _ = wait_for_flag(self.inner.stop_signal.subscribe()) => true,
            _ = sleep(delay) => self.is_stopping(),
        }
    }

    fn is_stopping(&self) -> bool {
        self.inner.stopping.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: ClientState) {
        self.inner.state.store(state as u8, Ordering::SeqCst);
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, SubscriptionRegistry> {
        self.inner
            .registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn send_frame(session: &Session, frame: &OutboundFrame) -> bool {
    let text = match frame.to_text() {
        Ok(text) => text,
        Err(e) => {
            error!("[Client] Failed to encode {:?}: {}", frame, e);
            return false;
        }
    };
    match session.send(&text).await {
        Ok(()) => true,
        Err(e) => {
            warn!("[Client] Failed to send {:?}: {}", frame, e);
            false
        }
    }
}
