//! SqliteCaptureStore - 再起動をまたいで残る端末内キュー
//!
//! # 学習ポイント
//! - rusqlite は同期 API なので spawn_blocking で実行する
//! - 1 本の Connection を Mutex で守る（読み取り中に削除が走っても途中状態は見えない）
//! - enqueue は `ON CONFLICT(id) DO UPDATE` で upsert
//!
//! enqueue と remove の間でプロセスが落ちても、レコードは残って次回送られます。

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::DateTime;
use rusqlite::{Connection, Row, params};

use crate::domain::{CaptureId, PendingCapture, SlotNumber, StorageError};
use crate::ports::CaptureStore;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS pending_captures (
    id             TEXT PRIMARY KEY,
    created_at_ms  INTEGER NOT NULL,
    owner_nickname TEXT NOT NULL,
    mime_type      TEXT NOT NULL,
    target_slot    INTEGER,
    image_bytes    BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_pending_captures_created_at
    ON pending_captures (created_at_ms);
";

const SELECT_ALL: &str = "
SELECT id, created_at_ms, owner_nickname, mime_type, target_slot, image_bytes
FROM pending_captures
ORDER BY created_at_ms DESC, id DESC
";

pub struct SqliteCaptureStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCaptureStore {
    /// Open (or create) the queue database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StorageError::Unavailable("connection lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StorageError::Unavailable(format!("blocking task failed: {e}")))?
    }
}

/// Raw columns; decoded outside the rusqlite closure so a bad row becomes
/// `StorageError::Corrupt` rather than a generic SQL error.
struct RawRow {
    id: String,
    created_at_ms: i64,
    owner_nickname: String,
    mime_type: String,
    target_slot: Option<i64>,
    image_bytes: Vec<u8>,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            created_at_ms: row.get(1)?,
            owner_nickname: row.get(2)?,
            mime_type: row.get(3)?,
            target_slot: row.get(4)?,
            image_bytes: row.get(5)?,
        })
    }

    fn decode(self) -> Result<PendingCapture, StorageError> {
        let corrupt = |reason: &str| StorageError::Corrupt {
            id: self.id.clone(),
            reason: reason.to_string(),
        };
        let id: CaptureId = self.id.parse().map_err(|_| corrupt("bad id"))?;
        let created_at = DateTime::from_timestamp_millis(self.created_at_ms)
            .ok_or_else(|| corrupt("bad created_at"))?;
        let target_slot = match self.target_slot {
            None => None,
            Some(raw) => Some(
                u32::try_from(raw)
                    .ok()
                    .and_then(SlotNumber::new)
                    .ok_or_else(|| corrupt("bad target_slot"))?,
            ),
        };

        Ok(PendingCapture {
            id,
            created_at,
            owner_nickname: self.owner_nickname,
            image_bytes: self.image_bytes,
            mime_type: self.mime_type,
            target_slot,
        })
    }
}

#[async_trait]
impl CaptureStore for SqliteCaptureStore {
    async fn enqueue(&self, record: PendingCapture) -> Result<(), StorageError> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO pending_captures
                    (id, created_at_ms, owner_nickname, mime_type, target_slot, image_bytes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    created_at_ms = excluded.created_at_ms,
                    owner_nickname = excluded.owner_nickname,
                    mime_type = excluded.mime_type,
                    target_slot = excluded.target_slot,
                    image_bytes = excluded.image_bytes",
                params![
                    record.id.as_ulid().to_string(),
                    record.created_at.timestamp_millis(),
                    record.owner_nickname,
                    record.mime_type,
                    record.target_slot.map(SlotNumber::get),
                    record.image_bytes,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_all(&self) -> Result<Vec<PendingCapture>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(SELECT_ALL)?;
            let rows = stmt
                .query_map([], RawRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(RawRow::decode).collect()
        })
        .await
    }

    async fn remove(&self, id: CaptureId) -> Result<(), StorageError> {
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM pending_captures WHERE id = ?1",
                params![id.as_ulid().to_string()],
            )?;
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM pending_captures", [])?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use ulid::Ulid;

    fn capture(offset_ms: i64, slot: u32, bytes: &[u8]) -> PendingCapture {
        let base = Utc.with_ymd_and_hms(2026, 2, 6, 9, 0, 0).unwrap();
        PendingCapture::new(
            CaptureId::from_ulid(Ulid::new()),
            base + Duration::milliseconds(offset_ms),
            "guest",
            bytes.to_vec(),
            "image/jpeg",
            SlotNumber::new(slot),
        )
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db");
        let first = capture(0, 1, b"first");
        let second = capture(5, 2, b"second");

        {
            let store = SqliteCaptureStore::open(&path).unwrap();
            store.enqueue(first.clone()).await.unwrap();
            store.enqueue(second.clone()).await.unwrap();
        }

        let reopened = SqliteCaptureStore::open(&path).unwrap();
        let all = reopened.list_all().await.unwrap();
        assert_eq!(all, vec![second, first]);
    }

    #[tokio::test]
    async fn list_all_has_no_side_effects() {
        let store = SqliteCaptureStore::open_in_memory().unwrap();
        store.enqueue(capture(0, 1, b"x")).await.unwrap();

        let once = store.list_all().await.unwrap();
        let twice = store.list_all().await.unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.len(), 1);
    }

    #[tokio::test]
    async fn enqueue_is_upsert_by_id() {
        let store = SqliteCaptureStore::open_in_memory().unwrap();
        let original = capture(0, 1, b"v1");
        let mut replacement = original.clone();
        replacement.image_bytes = b"v2".to_vec();

        store.enqueue(original).await.unwrap();
        store.enqueue(replacement.clone()).await.unwrap();

        assert_eq!(store.list_all().await.unwrap(), vec![replacement]);
    }

    #[tokio::test]
    async fn remove_and_clear() {
        let store = SqliteCaptureStore::open_in_memory().unwrap();
        let a = capture(0, 1, b"a");
        let b = capture(1, 2, b"b");
        store.enqueue(a.clone()).await.unwrap();
        store.enqueue(b.clone()).await.unwrap();

        store.remove(a.id).await.unwrap();
        store.remove(a.id).await.unwrap();
        assert_eq!(store.list_all().await.unwrap(), vec![b]);

        store.clear().await.unwrap();
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unbound_slot_round_trips_and_binds_in_place() {
        let store = SqliteCaptureStore::open_in_memory().unwrap();
        let mut record = capture(0, 1, b"x");
        record.target_slot = None;
        store.enqueue(record.clone()).await.unwrap();
        assert_eq!(store.list_all().await.unwrap(), vec![record.clone()]);

        let bound = record.bound_to(SlotNumber::new(2).unwrap());
        store.enqueue(bound.clone()).await.unwrap();
        assert_eq!(store.list_all().await.unwrap(), vec![bound]);
    }

    #[tokio::test]
    async fn corrupt_row_is_reported_not_dropped() {
        let store = SqliteCaptureStore::open_in_memory().unwrap();
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO pending_captures VALUES ('junk', 0, 'n', 'image/jpeg', 1, x'00')",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let err = store.list_all().await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { ref id, .. } if id == "junk"));
    }
}
