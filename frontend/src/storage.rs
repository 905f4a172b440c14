use chat_core::{FallbackStore, HISTORY_KEY, HistoryStore, StoreError};
use web_sys::Storage;

/// Store used by the app: `localStorage`, or memory when it is unavailable.
pub type SessionStore = FallbackStore<BrowserStorage>;

/// `HistoryStore` on the browser's `localStorage`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserStorage;

impl BrowserStorage {
    fn local_storage() -> Result<Storage, StoreError> {
        web_sys::window()
            .ok_or_else(|| StoreError::Unavailable("no window".to_string()))?
            .local_storage()
            .map_err(|e| StoreError::Unavailable(format!("{e:?}")))?
            .ok_or_else(|| StoreError::Unavailable("localStorage disabled".to_string()))
    }
}

impl HistoryStore for BrowserStorage {
    fn read(&self) -> Result<Option<String>, StoreError> {
        Self::local_storage()?
            .get_item(HISTORY_KEY)
            .map_err(|e| StoreError::Unavailable(format!("{e:?}")))
    }

    fn write(&self, json: &str) -> Result<(), StoreError> {
        Self::local_storage()?
            .set_item(HISTORY_KEY, json)
            .map_err(|e| StoreError::Write(format!("{e:?}")))
    }

    fn remove(&self) -> Result<(), StoreError> {
        Self::local_storage()?
            .remove_item(HISTORY_KEY)
            .map_err(|e| StoreError::Write(format!("{e:?}")))
    }
}
