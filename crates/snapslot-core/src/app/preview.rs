//! Preview - 送信待ち画像の表示用ハンドル
//!
//! ハンドルはスコープ付きです。drop すると解放され、キャッシュはレコードが
//! 上書き・削除されたときに自分の持つハンドルを手放します。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::{CaptureId, PendingCapture};

/// Display handle for one pending capture's bytes.
#[derive(Debug)]
pub struct PreviewHandle {
    capture_id: CaptureId,
    mime_type: String,
    bytes: Arc<[u8]>,
    live: Arc<AtomicUsize>,
}

impl PreviewHandle {
    pub fn capture_id(&self) -> CaptureId {
        self.capture_id
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Opaque locator for a presentation layer (`preview://capture-...`).
    pub fn uri(&self) -> String {
        format!("preview://{}", self.capture_id)
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Debug, Default)]
pub struct PreviewCache {
    handles: Mutex<HashMap<CaptureId, Arc<PreviewHandle>>>,
    live: Arc<AtomicUsize>,
}

impl PreviewCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn handles(&self) -> std::sync::MutexGuard<'_, HashMap<CaptureId, Arc<PreviewHandle>>> {
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cached handle for `record`, opened on first use.
    pub fn open(&self, record: &PendingCapture) -> Arc<PreviewHandle> {
        let mut handles = self.handles();
        if let Some(handle) = handles.get(&record.id) {
            return Arc::clone(handle);
        }
        self.live.fetch_add(1, Ordering::AcqRel);
        let handle = Arc::new(PreviewHandle {
            capture_id: record.id,
            mime_type: record.mime_type.clone(),
            bytes: Arc::from(record.image_bytes.as_slice()),
            live: Arc::clone(&self.live),
        });
        handles.insert(record.id, Arc::clone(&handle));
        handle
    }

    pub fn release(&self, id: CaptureId) {
        self.handles().remove(&id);
    }

    /// Keep only handles whose capture is still pending.
    pub fn sync(&self, pending: &[PendingCapture]) {
        self.handles()
            .retain(|id, _| pending.iter().any(|record| record.id == *id));
    }

    pub fn clear(&self) {
        self.handles().clear();
    }

    /// Handles not yet dropped, including ones held outside the cache.
    pub fn live_handles(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SlotNumber;
    use chrono::Utc;
    use ulid::Ulid;

    fn record(bytes: &[u8]) -> PendingCapture {
        PendingCapture::new(
            CaptureId::from_ulid(Ulid::new()),
            Utc::now(),
            "guest",
            bytes.to_vec(),
            "image/png",
            SlotNumber::new(1),
        )
    }

    #[test]
    fn open_is_cached_per_capture() {
        let cache = PreviewCache::new();
        let r = record(b"png");

        let a = cache.open(&r);
        let b = cache.open(&r);

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.live_handles(), 1);
        assert_eq!(a.bytes(), b"png");
        assert_eq!(a.uri(), format!("preview://{}", r.id));
    }

    #[test]
    fn sync_releases_handles_of_sent_captures() {
        let cache = PreviewCache::new();
        let kept = record(b"a");
        let sent = record(b"b");
        cache.open(&kept);
        cache.open(&sent);
        assert_eq!(cache.live_handles(), 2);

        cache.sync(std::slice::from_ref(&kept));
        assert_eq!(cache.live_handles(), 1);
    }

    #[test]
    fn outside_holder_keeps_handle_alive_until_dropped() {
        let cache = PreviewCache::new();
        let r = record(b"a");
        let held = cache.open(&r);

        cache.release(r.id);
        assert_eq!(cache.live_handles(), 1);

        drop(held);
        assert_eq!(cache.live_handles(), 0);
    }
}
