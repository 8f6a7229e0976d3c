// Key/Value Store Port
// The shared store holding job records: one hash per key, with per-key TTL

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Hash-oriented key/value store with per-key expiry.
///
/// Semantics follow a Redis-style hash:
/// - writing a field to a missing key creates the key with no expiry
/// - an expired key behaves exactly like a missing key
/// - `expire` on a missing key is a no-op returning `false`
///
/// All operations touch a single key; no multi-key transactions are needed.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Set several fields at once
    async fn hash_set_all(&self, key: &str, fields: &[(&str, String)]) -> Result<()>;

    /// Read every field of a hash (empty map if the key is missing or expired)
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>>;

    /// Set one field
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()>;

    /// Add `delta` to an integer field (missing field counts as 0), returning the new value
    async fn hash_incr(&self, key: &str, field: &str, delta: i64) -> Result<i64>;

    /// Set the key's time-to-live; returns false if the key does not exist
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Remaining time-to-live, `None` if the key is missing or has no expiry
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;

    /// Live keys starting with `prefix`
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Remove a key; returns false if it did not exist
    async fn delete(&self, key: &str) -> Result<bool>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use crate::port::TimeProvider;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Entry {
        fields: HashMap<String, String>,
        expires_at: Option<i64>,
    }

    /// In-memory store with lazy expiry driven by an injected clock
    pub struct InMemoryKvStore {
        entries: Mutex<HashMap<String, Entry>>,
        time_provider: Arc<dyn TimeProvider>,
        fail_writes: Mutex<bool>,
    }

    impl InMemoryKvStore {
        pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
            Self {
                entries: Mutex::new(HashMap::new()),
                time_provider,
                fail_writes: Mutex::new(false),
            }
        }

        /// Make every subsequent write fail (store outage simulation)
        pub fn set_fail_writes(&self, fail: bool) {
            *self.fail_writes.lock().unwrap() = fail;
        }

        fn check_writable(&self) -> Result<()> {
            if *self.fail_writes.lock().unwrap() {
                return Err(AppError::Store("simulated write failure".to_string()));
            }
            Ok(())
        }

        fn with_live<T>(&self, key: &str, f: impl FnOnce(&mut HashMap<String, Entry>) -> T) -> T {
            let now = self.time_provider.now_millis();
            let mut entries = self.entries.lock().unwrap();
            if entries
                .get(key)
                .and_then(|e| e.expires_at)
                .is_some_and(|at| at <= now)
            {
                entries.remove(key);
            }
            f(&mut entries)
        }
    }

    #[async_trait]
    impl KeyValueStore for InMemoryKvStore {
        async fn hash_set_all(&self, key: &str, fields: &[(&str, String)]) -> Result<()> {
            self.check_writable()?;
            self.with_live(key, |entries| {
                let entry = entries.entry(key.to_string()).or_default();
                for (field, value) in fields {
                    entry.fields.insert(field.to_string(), value.clone());
                }
            });
            Ok(())
        }

        async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
            Ok(self.with_live(key, |entries| {
                entries.get(key).map(|e| e.fields.clone()).unwrap_or_default()
            }))
        }

        async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()> {
            self.hash_set_all(key, &[(field, value.to_string())]).await
        }

        async fn hash_incr(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
            self.check_writable()?;
            self.with_live(key, |entries| {
                let entry = entries.entry(key.to_string()).or_default();
                let current = match entry.fields.get(field) {
                    Some(v) => v.parse::<i64>().map_err(|_| {
                        AppError::Store(format!("field {field} of {key} is not an integer"))
                    })?,
                    None => 0,
                };
                let next = current + delta;
                entry.fields.insert(field.to_string(), next.to_string());
                Ok(next)
            })
        }

        async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
            self.check_writable()?;
            let now = self.time_provider.now_millis();
            Ok(self.with_live(key, |entries| match entries.get_mut(key) {
                Some(entry) => {
                    entry.expires_at = Some(now + ttl.as_millis() as i64);
                    true
                }
                None => false,
            }))
        }

        async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
            let now = self.time_provider.now_millis();
            Ok(self.with_live(key, |entries| {
                entries
                    .get(key)
                    .and_then(|e| e.expires_at)
                    .map(|at| Duration::from_millis((at - now).max(0) as u64))
            }))
        }

        async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
            let now = self.time_provider.now_millis();
            let entries = self.entries.lock().unwrap();
            let mut keys: Vec<String> = entries
                .iter()
                .filter(|(k, e)| {
                    k.starts_with(prefix) && e.expires_at.map_or(true, |at| at > now)
                })
                .map(|(k, _)| k.clone())
                .collect();
            keys.sort();
            Ok(keys)
        }

        async fn delete(&self, key: &str) -> Result<bool> {
            self.check_writable()?;
            Ok(self.with_live(key, |entries| entries.remove(key).is_some()))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::port::time_provider::mocks::ManualTimeProvider;

        #[tokio::test]
        async fn test_expiry_is_lazy_and_total() {
            let clock = Arc::new(ManualTimeProvider::new(1_000));
            let store = InMemoryKvStore::new(clock.clone());

            store.hash_set("k", "f", "v").await.unwrap();
            assert!(store.expire("k", Duration::from_secs(10)).await.unwrap());
            assert_eq!(store.ttl("k").await.unwrap(), Some(Duration::from_secs(10)));

            clock.advance(Duration::from_secs(10));
            assert!(store.hash_get_all("k").await.unwrap().is_empty());
            assert!(store.keys_with_prefix("k").await.unwrap().is_empty());
            assert!(!store.expire("k", Duration::from_secs(10)).await.unwrap());
        }

        #[tokio::test]
        async fn test_incr_starts_from_zero() {
            let store = InMemoryKvStore::new(Arc::new(ManualTimeProvider::new(0)));
            assert_eq!(store.hash_incr("k", "n", 1).await.unwrap(), 1);
            assert_eq!(store.hash_incr("k", "n", 2).await.unwrap(), 3);
        }
    }
}
