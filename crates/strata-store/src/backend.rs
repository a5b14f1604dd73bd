//! Compare-and-set key-value contract for the durable metadata backend.
//!
//! The version token is an opaque `String` so different backends can supply
//! their own notion of a write generation:
//! - A relational backend can use a row version column
//! - A transactional KV store can use its sequence number
//! - The in-memory backend uses a numeric counter
//!
//! The backend, not the calling process, serializes writes per key. This is
//! what allows several service instances to share one store safely.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use strata_core::error::{Error, Result};

/// Precondition for conditional writes (CAS operations).
#[derive(Debug, Clone)]
pub enum WritePrecondition {
    /// Write only if the key does not exist.
    DoesNotExist,
    /// Write only if the key's token matches the given token.
    MatchesToken(String),
    /// Write unconditionally.
    None,
}

/// Result of a conditional write.
#[derive(Debug, Clone)]
pub enum WriteResult {
    /// Write succeeded, returns the new token.
    Success {
        /// The key's token after the write.
        token: String,
    },
    /// Precondition failed, returns the current token.
    PreconditionFailed {
        /// The token that caused the precondition to fail, if the key exists.
        current: Option<String>,
    },
}

/// A value read from the backend together with its CAS token.
#[derive(Debug, Clone)]
pub struct VersionedValue {
    /// The stored bytes.
    pub data: Bytes,
    /// Opaque CAS token for conditional writes.
    pub token: String,
}

/// Key metadata returned by listing.
#[derive(Debug, Clone)]
pub struct ValueMeta {
    /// The key.
    pub key: String,
    /// Opaque CAS token at listing time.
    pub token: String,
    /// Last write timestamp, when the backend tracks one.
    pub last_modified: Option<DateTime<Utc>>,
}

/// The compare-and-set key-value contract.
#[async_trait]
pub trait MetaBackend: Send + Sync + 'static {
    /// Reads a value and its token. Returns `None` if the key is absent.
    async fn get(&self, key: &str) -> Result<Option<VersionedValue>>;

    /// Writes with an optional precondition.
    ///
    /// Returns `WriteResult::PreconditionFailed` if the precondition is not
    /// met. Never returns an error for a failed precondition; that is a
    /// normal result.
    async fn put(&self, key: &str, data: Bytes, precondition: WritePrecondition)
        -> Result<WriteResult>;

    /// Deletes a key. Succeeds even if the key is absent (idempotent).
    async fn delete(&self, key: &str) -> Result<()>;

    /// Lists keys with the given prefix.
    ///
    /// **Ordering**: results are returned in arbitrary order that may vary
    /// between backends and invocations. Callers requiring deterministic
    /// order must sort.
    async fn list(&self, prefix: &str) -> Result<Vec<ValueMeta>>;
}

/// In-memory backend for development and tests.
///
/// Thread-safe via `RwLock`. Not durable, single-process only.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    values: RwLock<HashMap<String, StoredValue>>,
}

#[derive(Debug, Clone)]
struct StoredValue {
    data: Bytes,
    /// Numeric token stored as i64 internally, exposed as String via the API.
    token: i64,
    last_modified: DateTime<Utc>,
}

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("lock poisoned")
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetaBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<VersionedValue>> {
        let values = self.values.read().map_err(poison_err)?;
        Ok(values.get(key).map(|v| VersionedValue {
            data: v.data.clone(),
            token: v.token.to_string(),
        }))
    }

    async fn put(
        &self,
        key: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        let mut values = self.values.write().map_err(poison_err)?;
        let current = values.get(key);

        match precondition {
            WritePrecondition::DoesNotExist => {
                if let Some(value) = current {
                    return Ok(WriteResult::PreconditionFailed {
                        current: Some(value.token.to_string()),
                    });
                }
            }
            WritePrecondition::MatchesToken(expected) => {
                let expected_num: i64 = expected.parse().unwrap_or(-1);
                match current {
                    Some(value) if value.token != expected_num => {
                        return Ok(WriteResult::PreconditionFailed {
                            current: Some(value.token.to_string()),
                        });
                    }
                    None => {
                        return Ok(WriteResult::PreconditionFailed { current: None });
                    }
                    _ => {}
                }
            }
            WritePrecondition::None => {}
        }

        let new_token = current.map_or(1, |v| v.token + 1);
        values.insert(
            key.to_string(),
            StoredValue {
                data,
                token: new_token,
                last_modified: Utc::now(),
            },
        );
        drop(values);

        Ok(WriteResult::Success {
            token: new_token.to_string(),
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values.write().map_err(poison_err)?.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ValueMeta>> {
        let values = self.values.read().map_err(poison_err)?;
        Ok(values
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(key, value)| ValueMeta {
                key: key.clone(),
                token: value.token.to_string(),
                last_modified: Some(value.last_modified),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip() {
        let backend = MemoryBackend::new();
        let data = Bytes::from("hello");

        let result = backend
            .put("k", data.clone(), WritePrecondition::None)
            .await
            .expect("put should succeed");
        assert!(matches!(result, WriteResult::Success { ref token } if token == "1"));

        let value = backend.get("k").await.unwrap().expect("key should exist");
        assert_eq!(value.data, data);
        assert_eq!(value.token, "1");
    }

    #[tokio::test]
    async fn does_not_exist_precondition() {
        let backend = MemoryBackend::new();

        let result = backend
            .put("k", Bytes::from("a"), WritePrecondition::DoesNotExist)
            .await
            .unwrap();
        assert!(matches!(result, WriteResult::Success { .. }));

        let result = backend
            .put("k", Bytes::from("b"), WritePrecondition::DoesNotExist)
            .await
            .unwrap();
        assert!(matches!(result, WriteResult::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn matches_token_precondition() {
        let backend = MemoryBackend::new();

        let first = backend
            .put("k", Bytes::from("v1"), WritePrecondition::None)
            .await
            .unwrap();
        let WriteResult::Success { token } = first else {
            panic!("expected success");
        };

        let result = backend
            .put(
                "k",
                Bytes::from("v2"),
                WritePrecondition::MatchesToken(token.clone()),
            )
            .await
            .unwrap();
        assert!(matches!(result, WriteResult::Success { .. }));

        // Stale token is a normal precondition failure, not an error.
        let result = backend
            .put("k", Bytes::from("v3"), WritePrecondition::MatchesToken(token))
            .await
            .unwrap();
        assert!(matches!(result, WriteResult::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn matches_token_on_absent_key_fails() {
        let backend = MemoryBackend::new();
        let result = backend
            .put(
                "missing",
                Bytes::from("x"),
                WritePrecondition::MatchesToken("1".into()),
            )
            .await
            .unwrap();
        assert!(matches!(
            result,
            WriteResult::PreconditionFailed { current: None }
        ));
    }

    #[tokio::test]
    async fn list_with_prefix() {
        let backend = MemoryBackend::new();
        for key in ["a/1", "a/2", "b/1"] {
            backend
                .put(key, Bytes::from("x"), WritePrecondition::None)
                .await
                .unwrap();
        }
        assert_eq!(backend.list("a/").await.unwrap().len(), 2);
        assert_eq!(backend.list("b/").await.unwrap().len(), 1);
        assert_eq!(backend.list("c/").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let backend = MemoryBackend::new();
        backend
            .put("k", Bytes::from("x"), WritePrecondition::None)
            .await
            .unwrap();
        backend.delete("k").await.unwrap();
        backend.delete("k").await.unwrap();
        assert!(backend.get("k").await.unwrap().is_none());
    }
}
