//! Flat, string-keyed state management shared by all emulated services.
//!
//! Provides [`KvStore`], a thread-safe key-value store holding every emulated
//! resource as a JSON document under a `service/resource/name`-style key.
//! A single coarse reader/writer lock covers the whole key space: cheap reads
//! run concurrently, and [`KvStore::update`] gives callers the one atomic
//! read-modify-write primitive that is race-free under concurrent access to
//! the same key. Callers must never emulate it with a `get` followed by a
//! `set`.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Errors raised by the state store.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The key was absent where a present value was required.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// A stored document could not be converted to or from the caller's type.
    #[error("state serialization error for key {key}: {source}")]
    Serialization {
        /// The key being read or written.
        key: String,
        /// The underlying JSON conversion error.
        #[source]
        source: serde_json::Error,
    },
}

/// Thread-safe, string-keyed state store with one coarse lock.
///
/// Values are stored as `serde_json::Value`, so any serde-serializable
/// resource type fits without the store knowing its shape. The external
/// contract is deliberately narrow (`get`/`set`/`delete`/`list`/`exists`/
/// `update`) so the same interface can later be satisfied by an embedded or
/// remote store.
#[derive(Debug, Default)]
pub struct KvStore {
    inner: RwLock<BTreeMap<String, serde_json::Value>>,
}

impl KvStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Serialization`] if a stored document cannot be
    /// deserialized into `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StateError> {
        let guard = self.inner.read();
        match guard.get(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|source| StateError::Serialization {
                    key: key.to_owned(),
                    source,
                }),
        }
    }

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Serialization`] if `value` cannot be serialized.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StateError> {
        let doc = serde_json::to_value(value).map_err(|source| StateError::Serialization {
            key: key.to_owned(),
            source,
        })?;
        self.inner.write().insert(key.to_owned(), doc);
        Ok(())
    }

    /// Delete the value under `key`. Returns whether a value was present.
    pub fn delete(&self, key: &str) -> bool {
        self.inner.write().remove(key).is_some()
    }

    /// List all keys starting with `prefix`, in lexicographic order.
    #[must_use]
    pub fn list(&self, prefix: &str) -> Vec<String> {
        self.inner
            .read()
            .range(prefix.to_owned()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Whether a value exists under `key`.
    #[must_use]
    pub fn exists(&self, key: &str) -> bool {
        self.inner.read().contains_key(key)
    }

    /// Atomically read, mutate, and write back the value under `key`.
    ///
    /// The whole read-modify-write sequence runs under one write lock, so
    /// concurrent updates to the same key serialize instead of losing writes.
    /// Returns the value after mutation.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::KeyNotFound`] if the key is absent, or
    /// [`StateError::Serialization`] on a type mismatch.
    pub fn update<T, F>(&self, key: &str, mutate: F) -> Result<T, StateError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T),
    {
        let mut guard = self.inner.write();
        let current = guard
            .get(key)
            .ok_or_else(|| StateError::KeyNotFound(key.to_owned()))?;

        let mut value: T =
            serde_json::from_value(current.clone()).map_err(|source| StateError::Serialization {
                key: key.to_owned(),
                source,
            })?;
        mutate(&mut value);

        let doc = serde_json::to_value(&value).map_err(|source| StateError::Serialization {
            key: key.to_owned(),
            source,
        })?;
        guard.insert(key.to_owned(), doc);
        Ok(value)
    }

    /// Drop all state. Used by the embedded-mode reset lifecycle.
    pub fn reset(&self) {
        self.inner.write().clear();
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Counter {
        value: u64,
    }

    #[test]
    fn test_should_return_none_for_absent_key() {
        let store = KvStore::new();
        let got: Option<Counter> = store.get("missing").unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn test_should_round_trip_value() {
        let store = KvStore::new();
        store.set("svc/counter/a", &Counter { value: 7 }).unwrap();
        let got: Option<Counter> = store.get("svc/counter/a").unwrap();
        assert_eq!(got, Some(Counter { value: 7 }));
    }

    #[test]
    fn test_should_list_keys_by_prefix() {
        let store = KvStore::new();
        store.set("iam/role/a", &Counter { value: 1 }).unwrap();
        store.set("iam/role/b", &Counter { value: 2 }).unwrap();
        store.set("s3/bucket/a", &Counter { value: 3 }).unwrap();

        let keys = store.list("iam/role/");
        assert_eq!(keys, vec!["iam/role/a", "iam/role/b"]);
    }

    #[test]
    fn test_should_delete_and_report_presence() {
        let store = KvStore::new();
        store.set("k", &Counter { value: 1 }).unwrap();
        assert!(store.exists("k"));
        assert!(store.delete("k"));
        assert!(!store.exists("k"));
        assert!(!store.delete("k"));
    }

    #[test]
    fn test_should_update_atomically() {
        let store = KvStore::new();
        store.set("k", &Counter { value: 1 }).unwrap();

        let updated: Counter = store.update("k", |c: &mut Counter| c.value += 41).unwrap();
        assert_eq!(updated.value, 42);

        let got: Option<Counter> = store.get("k").unwrap();
        assert_eq!(got.unwrap().value, 42);
    }

    #[test]
    fn test_should_fail_update_on_absent_key() {
        let store = KvStore::new();
        let result = store.update("missing", |c: &mut Counter| c.value += 1);
        assert!(matches!(result, Err(StateError::KeyNotFound(_))));
    }

    #[test]
    fn test_should_serialize_concurrent_updates() {
        use std::sync::Arc;

        let store = Arc::new(KvStore::new());
        store.set("k", &Counter { value: 0 }).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        store.update("k", |c: &mut Counter| c.value += 1).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let got: Counter = store.get("k").unwrap().unwrap();
        assert_eq!(got.value, 800);
    }

    #[test]
    fn test_should_reset_all_state() {
        let store = KvStore::new();
        store.set("a", &Counter { value: 1 }).unwrap();
        store.set("b", &Counter { value: 2 }).unwrap();
        assert_eq!(store.len(), 2);

        store.reset();
        assert!(store.is_empty());
    }
}
