use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::warn;
use thiserror::Error;

use crate::models::{Exchange, Message, Role};

/// Storage key under which the serialized history lives.
pub const HISTORY_KEY: &str = "chat_history";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("History storage is unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to write history: {0}")]
    Write(String),

    #[error("Failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Key-value persistence for the serialized history.
///
/// Implementations hold a single entry; `remove` is the only way to delete.
pub trait HistoryStore {
    fn read(&self) -> Result<Option<String>, StoreError>;
    fn write(&self, json: &str) -> Result<(), StoreError>;
    fn remove(&self) -> Result<(), StoreError>;
}

/// In-process store. Clones share the same entry.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entry: Arc<Mutex<Option<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(json: impl Into<String>) -> Self {
        Self {
            entry: Arc::new(Mutex::new(Some(json.into()))),
        }
    }

    pub fn entry(&self) -> Option<String> {
        self.entry.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl HistoryStore for MemoryStore {
    fn read(&self) -> Result<Option<String>, StoreError> {
        self.entry
            .lock()
            .map(|e| e.clone())
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn write(&self, json: &str) -> Result<(), StoreError> {
        let mut entry = self
            .entry
            .lock()
            .map_err(|e| StoreError::Write(e.to_string()))?;
        *entry = Some(json.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<(), StoreError> {
        let mut entry = self
            .entry
            .lock()
            .map_err(|e| StoreError::Write(e.to_string()))?;
        *entry = None;
        Ok(())
    }
}

/// Uses `primary` until it reports [`StoreError::Unavailable`], then keeps the
/// history in memory for the rest of the session.
#[derive(Debug, Default)]
pub struct FallbackStore<S> {
    primary: S,
    fallback: MemoryStore,
    degraded: AtomicBool,
}

impl<S: HistoryStore> FallbackStore<S> {
    pub fn new(primary: S) -> Self {
        Self {
            primary,
            fallback: MemoryStore::new(),
            degraded: AtomicBool::new(false),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    fn route<T>(
        &self,
        on_primary: impl FnOnce(&S) -> Result<T, StoreError>,
        on_fallback: impl FnOnce(&MemoryStore) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        if self.is_degraded() {
            return on_fallback(&self.fallback);
        }
        match on_primary(&self.primary) {
            Err(StoreError::Unavailable(reason)) => {
                warn!("{reason}; history will only be kept in memory");
                self.degraded.store(true, Ordering::Relaxed);
                on_fallback(&self.fallback)
            }
            other => other,
        }
    }
}

impl<S: HistoryStore> HistoryStore for FallbackStore<S> {
    fn read(&self) -> Result<Option<String>, StoreError> {
        self.route(S::read, MemoryStore::read)
    }

    fn write(&self, json: &str) -> Result<(), StoreError> {
        self.route(|s| s.write(json), |m| m.write(json))
    }

    fn remove(&self) -> Result<(), StoreError> {
        self.route(S::remove, MemoryStore::remove)
    }
}

/// Completed exchanges in the order they finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    exchanges: Vec<Exchange>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, exchange: Exchange) {
        self.exchanges.push(exchange);
    }

    pub fn get(&self, index: usize) -> Option<&Exchange> {
        self.exchanges.get(index)
    }

    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
    }

    /// Flattened user, assistant, user, assistant, ... view.
    pub fn messages(&self) -> Vec<Message> {
        self.exchanges.iter().flat_map(Exchange::to_messages).collect()
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(&self.messages())?)
    }

    /// Rebuilds exchanges from a stored flat message array.
    ///
    /// Messages that do not form a user-then-assistant pair are dropped.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let messages: Vec<Message> = serde_json::from_str(json)?;
        Ok(Self::from_messages(messages))
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        let mut exchanges = Vec::with_capacity(messages.len() / 2);
        let mut pending_user: Option<Message> = None;

        for (index, message) in messages.into_iter().enumerate() {
            match (message.role, pending_user.take()) {
                (Role::User, previous) => {
                    if previous.is_some() {
                        warn!("Dropping unanswered user message before index {index}");
                    }
                    pending_user = Some(message);
                }
                (Role::Assistant, Some(user)) => {
                    exchanges.push(Exchange::new(user, message));
                }
                (Role::Assistant, None) => {
                    warn!("Dropping assistant message at index {index} with no prompt");
                }
            }
        }
        if pending_user.is_some() {
            warn!("Dropping trailing unanswered user message");
        }

        Self { exchanges }
    }
}

impl FromIterator<Exchange> for History {
    fn from_iter<I: IntoIterator<Item = Exchange>>(iter: I) -> Self {
        Self {
            exchanges: iter.into_iter().collect(),
        }
    }
}
