//! AutoSendCoordinator - 端末内キューをリモートへ流し込む
//!
//! # 1 パスの流れ
//! 1. 実行中のパスがあればトリガーを捨てる（single-flight）
//! 2. オフラインならストアに触れずに終わる
//! 3. `list_all()` を 1 回だけ呼び、返った順（新しい順）に 1 件ずつ送る
//!    （枠がまだ決まっていないレコードは送らずに残す）
//! 4. 送信成功が確認できたら、枠を埋まった扱いにしてから `remove()` する
//! 5. `{sent, failed}` を返す
//!
//! # 学習ポイント
//! - single-flight は AtomicBool + RAII ガード（どの経路で抜けても解放される）
//! - 1 件の失敗はパスを止めない（failed に数えて次へ）

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::app::reconciler::SlotReconciler;
use crate::domain::{
    PassOutcome, PassReport, PendingCapture, RecordOutcome, SlotKey, SlotNumber, StorageError,
    Trigger, UploadIdentity,
};
use crate::ports::{CaptureStore, Connectivity, IdGenerator, RemotePhotoStore, UploadRequest};

/// Holds the flag for the lifetime of one pass.
struct PassGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> PassGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct AutoSendCoordinator {
    store: Arc<dyn CaptureStore>,
    remote: Arc<dyn RemotePhotoStore>,
    connectivity: Arc<dyn Connectivity>,
    ids: Arc<dyn IdGenerator>,
    reconciler: Arc<SlotReconciler>,
    running: AtomicBool,
}

impl AutoSendCoordinator {
    pub fn new(
        store: Arc<dyn CaptureStore>,
        remote: Arc<dyn RemotePhotoStore>,
        connectivity: Arc<dyn Connectivity>,
        ids: Arc<dyn IdGenerator>,
        reconciler: Arc<SlotReconciler>,
    ) -> Self {
        Self {
            store,
            remote,
            connectivity,
            ids,
            reconciler,
            running: AtomicBool::new(false),
        }
    }

    /// True while a pass holds the single-flight flag.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one pass for `identity`.
    ///
    /// Errors only when the store cannot be listed; per-record failures are
    /// folded into the report.
    pub async fn run_pass(
        &self,
        identity: &UploadIdentity,
        trigger: Trigger,
    ) -> Result<PassOutcome, StorageError> {
        let Some(_guard) = PassGuard::try_acquire(&self.running) else {
            debug!(%trigger, "pass already running; trigger dropped");
            return Ok(PassOutcome::SkippedBusy);
        };

        if !self.connectivity.is_online() {
            debug!(%trigger, "offline; pass skipped");
            return Ok(PassOutcome::SkippedOffline);
        }

        let pass_id = self.ids.generate_pass_id();
        let pending = self.store.list_all().await?;
        if pending.is_empty() {
            debug!(%pass_id, %trigger, "queue empty");
            return Ok(PassOutcome::Completed {
                pass_id,
                report: PassReport::default(),
            });
        }

        info!(%pass_id, %trigger, queued = pending.len(), "send pass started");

        let mut report = PassReport::default();
        for record in &pending {
            let Some(slot) = record.target_slot else {
                debug!(%pass_id, capture_id = %record.id, "no slot bound yet; left queued");
                report.deferred += 1;
                continue;
            };
            report.record(self.send_one(identity, record, slot).await);
        }

        info!(
            %pass_id,
            %trigger,
            sent = report.sent,
            failed = report.failed,
            deferred = report.deferred,
            "send pass finished"
        );
        Ok(PassOutcome::Completed { pass_id, report })
    }

    async fn send_one(
        &self,
        identity: &UploadIdentity,
        record: &PendingCapture,
        slot: SlotNumber,
    ) -> RecordOutcome {
        let key = SlotKey::for_identity(identity, slot);
        let file_name = key.file_name(record.extension());
        let request = UploadRequest {
            identity,
            file_name: file_name.clone(),
            key,
            image_bytes: &record.image_bytes,
            mime_type: &record.mime_type,
            owner_nickname: &record.owner_nickname,
            created_at_ms: record.created_at.timestamp_millis(),
        };

        if let Err(err) = self.remote.upload(request).await {
            warn!(capture_id = %record.id, %slot, error = %err, "upload failed; kept in queue");
            return RecordOutcome::failed(record.id, slot, err.to_string());
        }

        // キューから消える前に埋まった扱いにする（新しい撮影がこの枠を空きと見ないように）
        self.reconciler.mark_filled(slot, file_name, record.created_at);

        // 受理済み。ここで remove に失敗しても次のパスで同じ枠に上書きされるだけ
        if let Err(err) = self.store.remove(record.id).await {
            warn!(capture_id = %record.id, error = %err, "uploaded but could not remove from queue");
            return RecordOutcome::failed(record.id, slot, err.to_string());
        }

        debug!(capture_id = %record.id, %slot, "capture sent");
        RecordOutcome::sent(record.id, slot)
    }
}
