//! SQLite-backed content-addressed persistence adapter.
//!
//! The key for a commit is the sha256 of the state's canonical JSON bytes, so committing
//! the same logical state twice is a no-op write and returns the same handle. A second
//! `head` table holds a single row pointing at the most recently committed key.

use std::path::{Path, PathBuf};

use rusqlite::params;
use sha2::{Digest, Sha256};

use super::PersistenceAdapter;
use crate::error::AgentError;
use crate::AgentState;

pub struct SqlitePersistence {
    db_path: PathBuf,
}

impl SqlitePersistence {
    /// Opens (creating if missing) the database at `path` and ensures its schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let db_path = path.as_ref().to_path_buf();
        let conn = rusqlite::Connection::open(&db_path)
            .map_err(|e| AgentError::Persistence(e.to_string()))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS versions (
                handle TEXT PRIMARY KEY,
                payload BLOB NOT NULL
            );
            CREATE TABLE IF NOT EXISTS head (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                handle TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| AgentError::Persistence(e.to_string()))?;
        Ok(Self { db_path })
    }

    fn content_handle(payload: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(payload);
        hex::encode(hasher.finalize())
    }
}

#[async_trait::async_trait]
impl PersistenceAdapter for SqlitePersistence {
    async fn commit(&self, state: &AgentState) -> Result<String, AgentError> {
        let payload = serde_json::to_vec(state)?;
        let handle = Self::content_handle(&payload);
        let db_path = self.db_path.clone();
        let handle_for_task = handle.clone();

        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path)
                .map_err(|e| AgentError::Persistence(e.to_string()))?;
            conn.execute(
                "INSERT OR IGNORE INTO versions (handle, payload) VALUES (?1, ?2)",
                params![handle_for_task, payload],
            )
            .map_err(|e| AgentError::Persistence(e.to_string()))?;
            conn.execute(
                "INSERT INTO head (id, handle) VALUES (0, ?1)
                 ON CONFLICT(id) DO UPDATE SET handle = excluded.handle",
                params![handle_for_task],
            )
            .map_err(|e| AgentError::Persistence(e.to_string()))?;
            Ok::<(), AgentError>(())
        })
        .await
        .map_err(|e| AgentError::Persistence(e.to_string()))??;

        Ok(handle)
    }

    async fn head(&self) -> Result<Option<AgentState>, AgentError> {
        let db_path = self.db_path.clone();
        let payload: Option<Vec<u8>> = tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path)
                .map_err(|e| AgentError::Persistence(e.to_string()))?;
            conn.query_row(
                "SELECT v.payload FROM head h JOIN versions v ON v.handle = h.handle WHERE h.id = 0",
                [],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(AgentError::Persistence(other.to_string())),
            })
        })
        .await
        .map_err(|e| AgentError::Persistence(e.to_string()))??;

        payload
            .map(|bytes| serde_json::from_slice(&bytes).map_err(AgentError::from))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: committing, then fetching head, round-trips the exact state.
    #[tokio::test]
    async fn commit_then_head_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = SqlitePersistence::open(dir.path().join("state.sqlite3")).unwrap();

        assert!(adapter.head().await.unwrap().is_none());

        let mut state = AgentState::new("be helpful", vec![]);
        state.last_reaction_timestamp = 42;
        adapter.commit(&state).await.unwrap();

        let restored = adapter.head().await.unwrap().unwrap();
        assert_eq!(restored, state);
    }

    /// **Scenario**: committing the same logical state twice returns the same handle.
    #[tokio::test]
    async fn committing_identical_state_twice_returns_same_handle() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = SqlitePersistence::open(dir.path().join("state.sqlite3")).unwrap();

        let state = AgentState::new("be helpful", vec![]);
        let h1 = adapter.commit(&state).await.unwrap();
        let h2 = adapter.commit(&state).await.unwrap();
        assert_eq!(h1, h2);
    }
}
