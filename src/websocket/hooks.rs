use crate::error::EnclaveError;
use std::fmt;
use std::sync::Arc;

type LifecycleHook = Arc<dyn Fn() + Send + Sync + 'static>;
type ErrorHook = Arc<dyn Fn(&EnclaveError) + Send + Sync + 'static>;

/// Lifecycle callbacks for the reconnect loop. Every hook defaults to a no-op.
///
/// Hooks run synchronously on the loop's own task, so a slow hook delays delivery of the
/// frames behind it.
#[derive(Clone, Default)]
pub struct Hooks {
    on_connect: Option<LifecycleHook>,
    on_auth: Option<LifecycleHook>,
    on_disconnect: Option<LifecycleHook>,
    on_exit: Option<LifecycleHook>,
    on_error: Option<ErrorHook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport connection opened, before login.
    pub fn on_connect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(f));
        self
    }

    /// Login accepted.
    pub fn on_auth(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_auth = Some(Arc::new(f));
        self
    }

    pub fn on_disconnect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_disconnect = Some(Arc::new(f));
        self
    }

    /// The loop has terminated and `run` is about to return.
    pub fn on_exit(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_exit = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&EnclaveError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub(crate) fn connected(&self) {
        if let Some(f) = &self.on_connect {
            f();
        }
    }

    pub(crate) fn authenticated(&self) {
        if let Some(f) = &self.on_auth {
            f();
        }
    }

    pub(crate) fn disconnected(&self) {
        if let Some(f) = &self.on_disconnect {
            f();
        }
    }

    pub(crate) fn exited(&self) {
        if let Some(f) = &self.on_exit {
            f();
        }
    }

    pub(crate) fn error(&self, err: &EnclaveError) {
        if let Some(f) = &self.on_error {
            f(err);
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_connect", &self.on_connect.is_some())
            .field("on_auth", &self.on_auth.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_exit", &self.on_exit.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
