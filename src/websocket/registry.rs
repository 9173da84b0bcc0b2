use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Handler invoked with the full parsed `update` frame of its channel.
pub type Callback = Arc<dyn Fn(&Value) + Send + Sync + 'static>;

/// Desired subscriptions: exactly one callback per channel.
///
/// This is what gets replayed on every new session, whatever the server currently thinks.
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    entries: BTreeMap<String, Callback>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for `channel`, returning the callback it replaced.
    pub fn insert(&mut self, channel: impl Into<String>, callback: Callback) -> Option<Callback> {
        self.entries.insert(channel.into(), callback)
    }

    pub fn remove(&mut self, channel: &str) -> Option<Callback> {
        self.entries.remove(channel)
    }

    pub fn get(&self, channel: &str) -> Option<Callback> {
        self.entries.get(channel).cloned()
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.entries.contains_key(channel)
    }

    pub fn channels(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}
