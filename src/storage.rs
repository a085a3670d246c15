/// Key-value storage over the browser's `sync`, `local` and `session` areas

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::cell::RefCell;
use std::collections::HashMap;
use thiserror::Error;
use wasm_bindgen::prelude::*;

// Import JS bridge functions
#[wasm_bindgen(module = "/js/storage.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn getStorage(area: &str, key: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn setStorage(area: &str, key: &str, value: JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn removeStorage(area: &str, key: &str) -> Result<(), JsValue>;
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage bridge failed: {0}")]
    Bridge(String),
    #[error("failed to (de)serialize `{key}`: {reason}")]
    Serde { key: String, reason: String },
}

/// Browser storage area a [`ChromeStore`] talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageArea {
    /// Synced settings
    Sync,
    /// Large local payloads (staged file, draft)
    Local,
    /// Cleared whenever the browser restarts
    Session,
}

impl StorageArea {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageArea::Sync => "sync",
            StorageArea::Local => "local",
            StorageArea::Session => "session",
        }
    }
}

/// Asynchronous key-value store.
///
/// Every call either returns a value or an explicit [`StorageError`]; a missing
/// key is `Ok(None)`, never an error.
#[allow(async_fn_in_trait)]
pub trait KeyValueStore {
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError>;

    async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError>;

    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// `chrome.storage.<area>` through the JS bridge
#[derive(Debug, Clone, Copy)]
pub struct ChromeStore {
    area: StorageArea,
}

impl ChromeStore {
    pub fn new(area: StorageArea) -> Self {
        ChromeStore { area }
    }

    pub fn sync() -> Self {
        Self::new(StorageArea::Sync)
    }

    pub fn local() -> Self {
        Self::new(StorageArea::Local)
    }

    pub fn session() -> Self {
        Self::new(StorageArea::Session)
    }
}

impl KeyValueStore for ChromeStore {
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let value_js = getStorage(self.area.as_str(), key)
            .await
            .map_err(|e| StorageError::Bridge(format!("{:?}", e)))?;

        if value_js.is_null() || value_js.is_undefined() {
            return Ok(None);
        }

        serde_wasm_bindgen::from_value(value_js)
            .map(Some)
            .map_err(|e| StorageError::Serde {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        // Maps must arrive as plain objects, chrome.storage drops `Map` instances
        let serializer = serde_wasm_bindgen::Serializer::json_compatible();
        let value_js = value.serialize(&serializer).map_err(|e| StorageError::Serde {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        setStorage(self.area.as_str(), key, value_js)
            .await
            .map_err(|e| StorageError::Bridge(format!("{:?}", e)))
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        removeStorage(self.area.as_str(), key)
            .await
            .map_err(|e| StorageError::Bridge(format!("{:?}", e)))
    }
}

/// In-memory store holding JSON values, used by tests and outside the browser
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }

    /// Drop every entry, like the browser does to the session area on restart
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl KeyValueStore for MemoryStore {
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let value = self.entries.borrow().get(key).cloned();
        match value {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| StorageError::Serde {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let value = serde_json::to_value(value).map_err(|e| StorageError::Serde {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.entries.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let store = MemoryStore::new();

        let value: Option<String> = store.get("nothing").await.unwrap();

        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryStore::new();

        store.set("topics", &"alerts,ops").await.unwrap();
        let value: Option<String> = store.get("topics").await.unwrap();

        assert_eq!(value, Some("alerts,ops".to_string()));
    }

    #[tokio::test]
    async fn test_remove_missing_key_is_ok() {
        let store = MemoryStore::new();

        store.remove("draftState").await.unwrap();

        assert!(!store.contains("draftState"));
    }

    #[tokio::test]
    async fn test_type_mismatch_is_serde_error() {
        let store = MemoryStore::new();
        store.set("priority", &"high").await.unwrap();

        let result: Result<Option<u8>, StorageError> = store.get("priority").await;

        assert!(matches!(result, Err(StorageError::Serde { .. })));
    }

    #[test]
    fn test_area_names() {
        assert_eq!(StorageArea::Sync.as_str(), "sync");
        assert_eq!(StorageArea::Local.as_str(), "local");
        assert_eq!(StorageArea::Session.as_str(), "session");
    }
}
