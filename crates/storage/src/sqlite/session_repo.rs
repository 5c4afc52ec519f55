use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::repository::{SessionRecord, SessionStore, StorageError};
use learncheck_core::model::SessionKey;

use super::SqliteSessionStore;

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn read(&self, key: &SessionKey) -> Result<Option<SessionRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT version, saved_at, payload
            FROM quiz_sessions
            WHERE user_id = ?1 AND tutorial_id = ?2
            ",
        )
        .bind(key.user_id().as_str())
        .bind(key.tutorial_id().as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let version: i64 = row
            .try_get("version")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let saved_at: DateTime<Utc> = row
            .try_get("saved_at")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let payload: String = row
            .try_get("payload")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        let session = serde_json::from_str(&payload)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let version = u32::try_from(version)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        Ok(Some(SessionRecord {
            version,
            saved_at,
            session,
        }))
    }

    async fn write(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let key = record.session.key();
        let payload = serde_json::to_string(&record.session)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        sqlx::query(
            r"
            INSERT INTO quiz_sessions (user_id, tutorial_id, version, saved_at, payload)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id, tutorial_id) DO UPDATE SET
                version = excluded.version,
                saved_at = excluded.saved_at,
                payload = excluded.payload
            ",
        )
        .bind(key.user_id().as_str())
        .bind(key.tutorial_id().as_str())
        .bind(i64::from(record.version))
        .bind(record.saved_at)
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }

    async fn clear(&self, key: &SessionKey) -> Result<(), StorageError> {
        sqlx::query(
            r"
            DELETE FROM quiz_sessions
            WHERE user_id = ?1 AND tutorial_id = ?2
            ",
        )
        .bind(key.user_id().as_str())
        .bind(key.tutorial_id().as_str())
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }
}
