//! Transcript persistence.
//!
//! One transcript blob per connection id, stored under [`storage_key`]. Saves are
//! full overwrites. A missing key reads as an empty transcript.
//!
//! Store methods report failures as [`ChatError::Persistence`]; callers in the
//! session layer log them and carry on with an empty transcript or a skipped save.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::chat::Transcript;
use crate::connection::ConnectionId;
use crate::error::{ChatError, Result};

use super::StateDb;

const KEY_PREFIX: &str = "chatMessages_";

/// Returns the storage key for a connection's transcript.
///
/// The fixed prefix keeps transcript keys apart from anything else in the same
/// namespace, and the raw id suffix keeps distinct ids on distinct keys.
pub fn storage_key(id: &ConnectionId) -> String {
    format!("{KEY_PREFIX}{id}")
}

/// Persistent storage for per-connection transcripts.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Loads the transcript for a connection. Absent means empty.
    async fn load(&self, id: &ConnectionId) -> Result<Transcript>;

    /// Replaces the stored transcript for a connection.
    async fn save(&self, id: &ConnectionId, transcript: &Transcript) -> Result<()>;

    /// Removes the stored transcript for a connection.
    async fn clear(&self, id: &ConnectionId) -> Result<()>;
}

fn decode(id: &ConnectionId, json: &str) -> Result<Transcript> {
    Transcript::from_json(json).map_err(|e| {
        ChatError::persistence(format!("Stored transcript for connection {id} is unreadable: {e}"))
    })
}

fn encode(transcript: &Transcript) -> Result<String> {
    transcript
        .to_json()
        .map_err(|e| ChatError::persistence(format!("Failed to encode transcript: {e}")))
}

/// Transcript store backed by the local state database.
#[derive(Clone)]
pub struct SqliteTranscriptStore {
    pool: SqlitePool,
}

impl SqliteTranscriptStore {
    pub fn new(db: &StateDb) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }
}

#[async_trait]
impl TranscriptStore for SqliteTranscriptStore {
    async fn load(&self, id: &ConnectionId) -> Result<Transcript> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT turns FROM transcripts WHERE storage_key = ?")
                .bind(storage_key(id))
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| ChatError::persistence(format!("Failed to load transcript: {e}")))?;

        match row {
            Some((json,)) => decode(id, &json),
            None => Ok(Transcript::new()),
        }
    }

    async fn save(&self, id: &ConnectionId, transcript: &Transcript) -> Result<()> {
        let json = encode(transcript)?;

        sqlx::query(
            r#"
            INSERT INTO transcripts (storage_key, connection_id, turns)
            VALUES (?, ?, ?)
            ON CONFLICT(storage_key) DO UPDATE SET
                turns = excluded.turns,
                updated_at = datetime('now')
            "#,
        )
        .bind(storage_key(id))
        .bind(id.as_str())
        .bind(json)
        .execute(&self.pool)
        .await
        .map_err(|e| ChatError::persistence(format!("Failed to save transcript: {e}")))?;

        Ok(())
    }

    async fn clear(&self, id: &ConnectionId) -> Result<()> {
        sqlx::query("DELETE FROM transcripts WHERE storage_key = ?")
            .bind(storage_key(id))
            .execute(&self.pool)
            .await
            .map_err(|e| ChatError::persistence(format!("Failed to clear transcript: {e}")))?;

        Ok(())
    }
}

/// Transcript store that keeps JSON blobs in memory.
#[derive(Debug, Default)]
pub struct MemoryTranscriptStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts a raw blob under a connection's key, bypassing encoding.
    pub fn insert_raw(&self, id: &ConnectionId, json: impl Into<String>) {
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.insert(storage_key(id), json.into());
        }
    }

    /// Returns true if a blob is stored for the connection.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.blobs
            .lock()
            .map(|blobs| blobs.contains_key(&storage_key(id)))
            .unwrap_or(false)
    }

    fn blobs(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.blobs
            .lock()
            .map_err(|_| ChatError::persistence("Transcript cache lock poisoned"))
    }
}

#[async_trait]
impl TranscriptStore for MemoryTranscriptStore {
    async fn load(&self, id: &ConnectionId) -> Result<Transcript> {
        let json = self.blobs()?.get(&storage_key(id)).cloned();
        match json {
            Some(json) => decode(id, &json),
            None => Ok(Transcript::new()),
        }
    }

    async fn save(&self, id: &ConnectionId, transcript: &Transcript) -> Result<()> {
        let json = encode(transcript)?;
        self.blobs()?.insert(storage_key(id), json);
        Ok(())
    }

    async fn clear(&self, id: &ConnectionId) -> Result<()> {
        self.blobs()?.remove(&storage_key(id));
        Ok(())
    }
}

/// A store whose every operation fails. For exercising degraded paths.
#[derive(Debug, Default, Clone)]
pub struct FailingTranscriptStore;

#[async_trait]
impl TranscriptStore for FailingTranscriptStore {
    async fn load(&self, _id: &ConnectionId) -> Result<Transcript> {
        Err(ChatError::persistence("storage unavailable"))
    }

    async fn save(&self, _id: &ConnectionId, _transcript: &Transcript) -> Result<()> {
        Err(ChatError::persistence("storage unavailable"))
    }

    async fn clear(&self, _id: &ConnectionId) -> Result<()> {
        Err(ChatError::persistence("storage unavailable"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{AssistantTurn, ChatTurn};
    use crate::chart::Classification;
    use pretty_assertions::assert_eq;

    fn sample() -> Transcript {
        let mut t = Transcript::new();
        t.push(ChatTurn::user("top customers"));
        t.push(AssistantTurn::answer(
            "SELECT name FROM customers LIMIT 5",
            None,
            Classification::none(),
        ));
        t
    }

    #[test]
    fn test_storage_keys_are_distinct_per_id() {
        assert_eq!(storage_key(&ConnectionId::new("12")), "chatMessages_12");
        assert_ne!(
            storage_key(&ConnectionId::new("1")),
            storage_key(&ConnectionId::new("12"))
        );
    }

    #[test]
    fn test_memory_round_trip() {
        tokio_test::block_on(async {
            let store = MemoryTranscriptStore::new();
            let id = ConnectionId::new("1");
            store.save(&id, &sample()).await.unwrap();
            assert_eq!(store.load(&id).await.unwrap(), sample());
        });
    }

    #[tokio::test]
    async fn test_memory_missing_is_empty() {
        let store = MemoryTranscriptStore::new();
        let loaded = store.load(&ConnectionId::new("nope")).await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn test_memory_save_overwrites() {
        let store = MemoryTranscriptStore::new();
        let id = ConnectionId::new("1");
        store.save(&id, &sample()).await.unwrap();
        store.save(&id, &Transcript::new()).await.unwrap();
        assert!(store.load(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_clear() {
        let store = MemoryTranscriptStore::new();
        let id = ConnectionId::new("1");
        let other = ConnectionId::new("2");
        store.save(&id, &sample()).await.unwrap();
        store.save(&other, &sample()).await.unwrap();

        store.clear(&id).await.unwrap();
        assert!(!store.contains(&id));
        assert!(store.load(&id).await.unwrap().is_empty());
        assert_eq!(store.load(&other).await.unwrap(), sample());
    }

    #[tokio::test]
    async fn test_unreadable_blob_is_persistence_error() {
        let store = MemoryTranscriptStore::new();
        let id = ConnectionId::new("1");
        store.insert_raw(&id, "{not json");
        let err = store.load(&id).await.unwrap_err();
        assert!(matches!(err, ChatError::Persistence(_)));
    }

    async fn stored_rows(db: &StateDb) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transcripts")
            .fetch_one(db.pool())
            .await
            .unwrap();
        count
    }

    #[tokio::test]
    async fn test_sqlite_round_trip_and_clear() {
        let db = StateDb::open_in_memory().await.unwrap();
        let store = SqliteTranscriptStore::new(&db);
        let id = ConnectionId::new("7");

        assert!(store.load(&id).await.unwrap().is_empty());

        store.save(&id, &sample()).await.unwrap();
        store.save(&id, &sample()).await.unwrap();
        assert_eq!(store.load(&id).await.unwrap(), sample());
        assert_eq!(stored_rows(&db).await, 1);

        store.clear(&id).await.unwrap();
        assert!(store.load(&id).await.unwrap().is_empty());
        assert_eq!(stored_rows(&db).await, 0);
    }

    #[tokio::test]
    async fn test_failing_store_fails() {
        let store = FailingTranscriptStore;
        let id = ConnectionId::new("1");
        assert!(store.load(&id).await.is_err());
        assert!(store.save(&id, &sample()).await.is_err());
        assert!(store.clear(&id).await.is_err());
    }
}
