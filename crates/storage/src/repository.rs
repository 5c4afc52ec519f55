use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use learncheck_core::model::{Session, SessionKey};

/// Errors surfaced by session-store adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Version stamp written into every persisted blob.
///
/// Bump when the `Session` shape changes incompatibly; there is no migration,
/// a record with another version reads as absent and the next write replaces
/// it wholesale.
pub const FORMAT_VERSION: u32 = 1;

/// Persisted shape for a session: the domain state plus the envelope the
/// stores need (format version and save timestamp).
///
/// This mirrors the domain `Session` so adapters can serialize/deserialize
/// without leaking storage concerns into the domain layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub session: Session,
}

impl SessionRecord {
    /// Wrap a session for persistence at the current format version.
    #[must_use]
    pub fn new(session: Session, saved_at: DateTime<Utc>) -> Self {
        Self {
            version: FORMAT_VERSION,
            saved_at,
            session,
        }
    }

    /// Unwrap the session if the record was written at the current format
    /// version; anything else is treated as absent.
    #[must_use]
    pub fn into_current(self) -> Option<Session> {
        (self.version == FORMAT_VERSION).then_some(self.session)
    }
}

/// Store contract for persisted sessions.
///
/// Whole-blob semantics: a write replaces the entire record for its key, a
/// read returns the entire record or nothing. The session controller is the
/// only writer.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch the record stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be reached or the blob
    /// cannot be decoded.
    async fn read(&self, key: &SessionKey) -> Result<Option<SessionRecord>, StorageError>;

    /// Persist `record` under its session's key, replacing any prior record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn write(&self, record: &SessionRecord) -> Result<(), StorageError>;

    /// Remove whatever is stored under `key`. Absent keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be reached.
    async fn clear(&self, key: &SessionKey) -> Result<(), StorageError>;
}

/// Simple in-memory store implementation for testing and prototyping.
///
/// Round-trips records through JSON so it exercises the same blob semantics
/// as the durable backends.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    blobs: Arc<Mutex<HashMap<SessionKey, String>>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            blobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn read(&self, key: &SessionKey) -> Result<Option<SessionRecord>, StorageError> {
        let guard = self
            .blobs
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let Some(blob) = guard.get(key) else {
            return Ok(None);
        };
        serde_json::from_str(blob)
            .map(Some)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    async fn write(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let blob = serde_json::to_string(record)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let mut guard = self
            .blobs
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(record.session.key(), blob);
        Ok(())
    }

    async fn clear(&self, key: &SessionKey) -> Result<(), StorageError> {
        let mut guard = self
            .blobs
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }
}
