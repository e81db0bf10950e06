//! InMemoryCaptureStore - テスト用の端末内キュー
//!
//! 再起動をまたいだ永続性はありません。契約（upsert / 新しい順 / remove は冪等）は
//! SqliteCaptureStore と同じです。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{CaptureId, PendingCapture, StorageError};
use crate::ports::CaptureStore;

#[derive(Default)]
pub struct InMemoryCaptureStore {
    records: Mutex<HashMap<CaptureId, PendingCapture>>,
}

impl InMemoryCaptureStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CaptureStore for InMemoryCaptureStore {
    async fn enqueue(&self, record: PendingCapture) -> Result<(), StorageError> {
        let mut records = self.records.lock().await;
        records.insert(record.id, record);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<PendingCapture>, StorageError> {
        let records = self.records.lock().await;
        let mut all: Vec<PendingCapture> = records.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(all)
    }

    async fn remove(&self, id: CaptureId) -> Result<(), StorageError> {
        self.records.lock().await.remove(&id);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.records.lock().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SlotNumber;
    use chrono::{Duration, TimeZone, Utc};
    use ulid::Ulid;

    fn capture(offset_ms: i64, nickname: &str) -> PendingCapture {
        let base = Utc.with_ymd_and_hms(2026, 2, 6, 9, 0, 0).unwrap();
        PendingCapture::new(
            CaptureId::from_ulid(Ulid::new()),
            base + Duration::milliseconds(offset_ms),
            nickname,
            vec![0xFF, 0xD8],
            "image/jpeg",
            SlotNumber::new(1),
        )
    }

    #[tokio::test]
    async fn list_all_is_newest_first() {
        let store = InMemoryCaptureStore::new();
        let old = capture(0, "a");
        let new = capture(10, "b");
        store.enqueue(old.clone()).await.unwrap();
        store.enqueue(new.clone()).await.unwrap();

        let ids: Vec<CaptureId> = store.list_all().await.unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![new.id, old.id]);
    }

    #[tokio::test]
    async fn enqueue_same_id_overwrites() {
        let store = InMemoryCaptureStore::new();
        let first = capture(0, "before");
        let mut second = first.clone();
        second.owner_nickname = "after".to_string();

        store.enqueue(first).await.unwrap();
        store.enqueue(second).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].owner_nickname, "after");
    }

    #[tokio::test]
    async fn remove_unknown_is_noop() {
        let store = InMemoryCaptureStore::new();
        store.enqueue(capture(0, "a")).await.unwrap();

        store.remove(CaptureId::from_ulid(Ulid::new())).await.unwrap();
        assert_eq!(store.list_all().await.unwrap().len(), 1);

        store.clear().await.unwrap();
        assert!(store.list_all().await.unwrap().is_empty());
    }
}
