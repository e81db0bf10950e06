//! UploadSession - 表示層に公開する操作の窓口
//!
//! identity はセッション生成時に 1 度だけ渡し、以降のすべての呼び出しで
//! 明示的に引き回します（暗黙のグローバル状態は持たない）。
//!
//! # 公開操作
//! - `enqueue_capture` / `pending_snapshot` / `is_pending` / `clear_pending`
//! - `occupancy` / `refresh_occupancy`
//! - `select_replace_slot` / `clear_selection`
//! - `trigger_send_now` / `run_pass`
//! - `preview` / `status`
//!
//! # 枠の割り当て
//! 割り当てと enqueue は `slot_lock` の中で行い、同時に来た撮影が同じ空き枠を取らないようにします。
//! 占有状況が一度も取れていない間は枠を決めずに積み、一覧が取れた時点（次の撮影かパスの直前）で
//! 古い順に枠を決めます。

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::app::allocator::{Allocation, AllocationMode, SlotAllocator};
use crate::app::coordinator::AutoSendCoordinator;
use crate::app::preview::{PreviewCache, PreviewHandle};
use crate::app::reconciler::SlotReconciler;
use crate::app::status::{LastPass, SessionStatus};
use crate::domain::{
    CaptureError, CaptureId, DEFAULT_MIME_TYPE, Occupancy, OccupancyView, PassId, PassOutcome,
    PassReport, PendingCapture, PlanLimits, RecordOutcomeKind, SessionError, SlotNumber, Trigger,
    UploadIdentity,
};
use crate::ports::{CaptureStore, Clock, Connectivity, IdGenerator, RemotePhotoStore, UlidGenerator};

/// Where a new capture went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedCapture {
    pub id: CaptureId,
    /// `None` while occupancy is unknown; bound before it is sent.
    pub allocation: Option<Allocation>,
}

pub struct UploadSession {
    identity: UploadIdentity,
    limits: PlanLimits,
    store: Arc<dyn CaptureStore>,
    remote: Arc<dyn RemotePhotoStore>,
    connectivity: Arc<dyn Connectivity>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    coordinator: AutoSendCoordinator,
    reconciler: Arc<SlotReconciler>,
    allocator: SlotAllocator,
    slot_lock: Mutex<()>,
    previews: PreviewCache,
    last_pass: RwLock<Option<LastPass>>,
}

impl UploadSession {
    pub(crate) fn new(
        identity: UploadIdentity,
        limits: PlanLimits,
        store: Arc<dyn CaptureStore>,
        remote: Arc<dyn RemotePhotoStore>,
        connectivity: Arc<dyn Connectivity>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        let reconciler = Arc::new(SlotReconciler::new());
        let coordinator = AutoSendCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&remote),
            Arc::clone(&connectivity),
            Arc::clone(&ids),
            Arc::clone(&reconciler),
        );
        Self {
            identity,
            limits,
            store,
            remote,
            connectivity,
            clock,
            ids,
            coordinator,
            reconciler,
            allocator: SlotAllocator::new(),
            slot_lock: Mutex::new(()),
            previews: PreviewCache::new(),
            last_pass: RwLock::new(None),
        }
    }

    pub fn identity(&self) -> &UploadIdentity {
        &self.identity
    }

    // ---- captures -------------------------------------------------------

    /// Queue a JPEG capture and kick a send pass.
    pub async fn enqueue_capture(
        &self,
        image_bytes: Vec<u8>,
        owner_nickname: &str,
    ) -> Result<CaptureId, SessionError> {
        self.enqueue_capture_as(image_bytes, owner_nickname, DEFAULT_MIME_TYPE)
            .await
    }

    /// Queue a capture with an explicit MIME type and kick a send pass.
    pub async fn enqueue_capture_as(
        &self,
        image_bytes: Vec<u8>,
        owner_nickname: &str,
        mime_type: &str,
    ) -> Result<CaptureId, SessionError> {
        Ok(self
            .queue_capture(image_bytes, owner_nickname, mime_type)
            .await?
            .id)
    }

    /// Queue a capture, report the slot it was given, and kick a send pass.
    ///
    /// The capture is durable once this returns `Ok`; the send pass that
    /// follows may fail without affecting the result.
    pub async fn queue_capture(
        &self,
        image_bytes: Vec<u8>,
        owner_nickname: &str,
        mime_type: &str,
    ) -> Result<QueuedCapture, SessionError> {
        let queued = {
            let _slots = self.slot_lock.lock().await;
            let id = self.ids.generate_capture_id();

            let allocation = match self.known_occupancy().await {
                Some(known) => {
                    self.bind_unbound(&known).await?;
                    Some(self.allocate(id, &known).await?)
                }
                None => {
                    warn!(capture_id = %id, "occupancy unknown; capture queued without a slot");
                    None
                }
            };

            let record = PendingCapture::new(
                id,
                self.clock.now(),
                owner_nickname,
                image_bytes,
                mime_type,
                allocation.map(|a| a.slot),
            );
            self.store.enqueue(record).await?;
            if let Some(allocation) = allocation {
                if allocation.mode == AllocationMode::Replace {
                    self.allocator.mark_used(allocation.slot, id);
                }
                info!(capture_id = %id, slot = %allocation.slot, mode = ?allocation.mode, "capture queued");
            }
            QueuedCapture { id, allocation }
        };

        if let Err(err) = self.run_pass(Trigger::CaptureEnqueued).await {
            warn!(capture_id = %queued.id, error = %err, "send after capture failed; will retry");
        }
        Ok(queued)
    }

    /// Everything not yet confirmed by the remote store, newest first.
    pub async fn pending_snapshot(&self) -> Result<Vec<PendingCapture>, SessionError> {
        let pending = self.store.list_all().await?;
        self.previews.sync(&pending);
        Ok(pending)
    }

    pub async fn is_pending(&self, id: CaptureId) -> Result<bool, SessionError> {
        let pending = self.store.list_all().await?;
        Ok(pending.iter().any(|r| r.id == id))
    }

    /// Administrative reset of the local queue.
    pub async fn clear_pending(&self) -> Result<(), SessionError> {
        let _slots = self.slot_lock.lock().await;
        self.store.clear().await?;
        self.previews.clear();
        info!("pending captures cleared");
        Ok(())
    }

    /// Display handle for a pending capture; `None` once it has been sent.
    pub async fn preview(&self, id: CaptureId) -> Result<Option<Arc<PreviewHandle>>, SessionError> {
        let pending = self.store.list_all().await?;
        Ok(pending
            .iter()
            .find(|r| r.id == id)
            .map(|record| self.previews.open(record)))
    }

    pub fn live_previews(&self) -> usize {
        self.previews.live_handles()
    }

    // ---- slot binding ---------------------------------------------------

    /// Decide the slot for capture `id`. Caller holds `slot_lock`.
    async fn allocate(&self, id: CaptureId, known: &Occupancy) -> Result<Allocation, SessionError> {
        // キューを先に読み、スナップショットは後に読む。
        // 間に送信が終わった枠は remove より前に mark_filled されている
        let pending = self.store.list_all().await?;
        let occupancy = self.reconciler.snapshot().unwrap_or_else(|| known.clone());

        let allocation = self.allocator.allocate(&occupancy, &reserved_slots(&pending))?;
        if allocation.mode == AllocationMode::Replace {
            self.supersede(&pending, allocation.slot, id).await?;
        }
        Ok(allocation)
    }

    /// Bind slots to captures queued while occupancy was unknown, oldest
    /// first. Caller holds `slot_lock`.
    async fn bind_unbound(&self, known: &Occupancy) -> Result<usize, SessionError> {
        let pending = self.store.list_all().await?;
        let mut unbound: Vec<PendingCapture> = pending
            .iter()
            .filter(|r| r.target_slot.is_none())
            .cloned()
            .collect();
        if unbound.is_empty() {
            return Ok(0);
        }
        unbound.reverse();

        let occupancy = self.reconciler.snapshot().unwrap_or_else(|| known.clone());
        let mut reserved = reserved_slots(&pending);
        let mut bound = 0;
        for record in unbound {
            let allocation = match self.allocator.allocate(&occupancy, &reserved) {
                Ok(allocation) => allocation,
                Err(err) => {
                    warn!(capture_id = %record.id, error = %err, "no slot for queued capture; left unbound");
                    break;
                }
            };
            let id = record.id;
            if allocation.mode == AllocationMode::Replace {
                let pending = self.store.list_all().await?;
                self.supersede(&pending, allocation.slot, id).await?;
            }
            self.store.enqueue(record.bound_to(allocation.slot)).await?;
            reserved.insert(allocation.slot);
            if allocation.mode == AllocationMode::Replace {
                self.allocator.mark_used(allocation.slot, id);
            }
            info!(capture_id = %id, slot = %allocation.slot, mode = ?allocation.mode, "queued capture bound to slot");
            bound += 1;
        }
        Ok(bound)
    }

    /// Drop older pending captures aimed at `slot`; sending them would only
    /// be overwritten by `by`.
    async fn supersede(
        &self,
        pending: &[PendingCapture],
        slot: SlotNumber,
        by: CaptureId,
    ) -> Result<(), SessionError> {
        for stale in pending
            .iter()
            .filter(|r| r.target_slot == Some(slot) && r.id != by)
        {
            self.store.remove(stale.id).await?;
            self.previews.release(stale.id);
            info!(capture_id = %stale.id, superseded_by = %by, %slot, "pending capture superseded");
        }
        Ok(())
    }

    /// Bind any unbound captures before a pass, if occupancy can be known.
    async fn bind_before_pass(&self) -> Result<(), SessionError> {
        let _slots = self.slot_lock.lock().await;
        let pending = self.store.list_all().await?;
        if pending.iter().all(|r| r.target_slot.is_some()) {
            return Ok(());
        }
        if let Some(known) = self.known_occupancy().await {
            self.bind_unbound(&known).await?;
        }
        Ok(())
    }

    // ---- occupancy ------------------------------------------------------

    /// Last known occupancy; `None` while it has never been fetched.
    pub fn occupancy(&self) -> Option<OccupancyView> {
        self.reconciler.snapshot().map(|o| o.view())
    }

    /// Fetch the remote listing and re-derive occupancy.
    pub async fn refresh_occupancy(&self) -> Result<OccupancyView, SessionError> {
        Ok(self.refresh_snapshot().await?.view())
    }

    async fn refresh_snapshot(&self) -> Result<Occupancy, SessionError> {
        let occupancy = self
            .reconciler
            .refresh(self.remote.as_ref(), &self.identity, &self.limits)
            .await?;
        let pending = self.store.list_all().await?;
        self.allocator.observe(&occupancy, &reserved_slots(&pending));
        Ok(occupancy)
    }

    /// Snapshot for allocation, fetching once if none exists yet.
    ///
    /// `None` means no listing has ever been seen: unknown, not empty.
    async fn known_occupancy(&self) -> Option<Occupancy> {
        if let Some(occupancy) = self.reconciler.snapshot() {
            return Some(occupancy);
        }
        match self.refresh_snapshot().await {
            Ok(occupancy) => Some(occupancy),
            Err(err) => {
                debug!(error = %err, "occupancy still unknown");
                None
            }
        }
    }

    // ---- replace selection ----------------------------------------------

    /// Choose the slot the next capture overwrites (replace mode).
    pub async fn select_replace_slot(&self, slot: u32) -> Result<(), SessionError> {
        let occupancy = match self.reconciler.snapshot() {
            Some(occupancy) => occupancy,
            None => self.refresh_snapshot().await?,
        };
        let slot = SlotNumber::new(slot).ok_or(CaptureError::SlotOutOfRange {
            slot,
            cap: occupancy.cap(),
        })?;
        self.allocator.select(slot, &occupancy)?;
        debug!(%slot, "replace slot selected");
        Ok(())
    }

    pub fn clear_selection(&self) {
        self.allocator.clear_selection();
    }

    pub fn selection(&self) -> Option<SlotNumber> {
        self.allocator.selection()
    }

    // ---- sending --------------------------------------------------------

    /// Run a pass now; `{0, 0}` if another pass is running or offline.
    pub async fn trigger_send_now(&self) -> Result<PassReport, SessionError> {
        Ok(self.run_pass(Trigger::Manual).await?.report())
    }

    /// Run one coordinator pass and apply its follow-ups.
    pub async fn run_pass(&self, trigger: Trigger) -> Result<PassOutcome, SessionError> {
        if self.connectivity.is_online() {
            if let Err(err) = self.bind_before_pass().await {
                warn!(%trigger, error = %err, "could not bind queued captures to slots");
            }
        }
        let outcome = self.coordinator.run_pass(&self.identity, trigger).await?;
        if let PassOutcome::Completed { pass_id, report } = &outcome {
            self.after_pass(trigger, *pass_id, report).await;
        }
        Ok(outcome)
    }

    async fn after_pass(&self, trigger: Trigger, pass_id: PassId, report: &PassReport) {
        let sent: Vec<CaptureId> = report
            .records
            .iter()
            .filter(|r| r.kind == RecordOutcomeKind::Sent)
            .map(|r| r.capture_id)
            .collect();
        if self.allocator.confirm_sent(&sent) {
            debug!(%pass_id, "replace selection consumed");
        }

        if report.sent > 0 {
            if let Err(err) = self.refresh_occupancy().await {
                warn!(%pass_id, error = %err, "occupancy refresh after send failed");
            }
        }
        match self.store.list_all().await {
            Ok(pending) => self.previews.sync(&pending),
            Err(err) => warn!(%pass_id, error = %err, "could not list queue after pass"),
        }

        *self.last_pass.write().unwrap_or_else(|e| e.into_inner()) = Some(LastPass {
            pass_id,
            trigger,
            finished_at: self.clock.now(),
            sent: report.sent,
            failed: report.failed,
            deferred: report.deferred,
        });
    }

    pub async fn status(&self) -> Result<SessionStatus, SessionError> {
        let pending = self.store.list_all().await?;
        Ok(SessionStatus {
            pending: pending.len(),
            awaiting_slot: pending.iter().filter(|r| r.target_slot.is_none()).count(),
            occupancy: self.occupancy(),
            selection: self.allocator.selection(),
            last_pass: self
                .last_pass
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
        })
    }
}

/// Slots already claimed by captures still in the queue.
fn reserved_slots(pending: &[PendingCapture]) -> BTreeSet<SlotNumber> {
    pending.iter().filter_map(|r| r.target_slot).collect()
}
