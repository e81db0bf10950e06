//! SlotReconciler - リモート一覧から「自分の枠」の占有状況を作る
//!
//! # フロー
//! 1. RemotePhotoStore::list() でイベント全体の一覧を取得
//! 2. roleCaps（無ければ設定値）から cap を決める
//! 3. `reconcile()` で自分の SlotKey だけを拾い、長さ cap の配列に並べる
//! 4. 成功したときだけスナップショットを差し替える
//!
//! 一覧の取得に失敗したら前回のスナップショットをそのまま残し、
//! `ReconcileError::Stale` を返します（「0 枚」とは読まない）。
//!
//! 送信成功が確認できた枠は `mark_filled` で即座に埋まった扱いにします。
//! この印は、印より後に取得を始めた一覧が成功するまで一覧の結果に上書きされず残ります。

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::domain::{
    Occupancy, PlanLimits, ReconcileError, RemotePhoto, SlotKey, SlotNumber, SlotRecord,
    UploadIdentity, capacity_for,
};
use crate::ports::RemotePhotoStore;

/// Derive occupancy for `identity` from an event-wide listing.
///
/// Pure: the same listing always yields the same occupancy, regardless of order.
pub fn reconcile(
    identity: &UploadIdentity,
    cap: u32,
    event_name: Option<String>,
    photos: &[RemotePhoto],
) -> Occupancy {
    let mut occupancy = Occupancy::empty(cap);
    occupancy.event_name = event_name;

    for photo in photos {
        let Ok(key) = photo.id.parse::<SlotKey>() else {
            continue;
        };
        if !key.belongs_to(identity) || !occupancy.contains(key.slot()) {
            continue;
        }

        let index = key.slot().index();
        let candidate = SlotRecord {
            slot: key.slot(),
            occupant_id: Some(photo.id.clone()),
            created_at: DateTime::from_timestamp_millis(photo.created_at),
        };
        let current = &mut occupancy.slots[index];
        if supersedes(&candidate, current) {
            *current = candidate;
        }
    }

    occupancy
}

/// Later `created_at` wins; ties go to the larger id.
fn supersedes(candidate: &SlotRecord, current: &SlotRecord) -> bool {
    match &current.occupant_id {
        None => true,
        Some(current_id) => {
            let ours = (candidate.created_at, candidate.occupant_id.as_deref());
            let theirs = (current.created_at, Some(current_id.as_str()));
            ours > theirs
        }
    }
}

/// A slot whose upload was accepted but that no listing has shown yet.
#[derive(Debug, Clone)]
struct Confirmed {
    record: SlotRecord,
    generation: u64,
}

#[derive(Debug, Default)]
struct State {
    listed: Option<Occupancy>,
    confirmed: BTreeMap<SlotNumber, Confirmed>,
    generation: u64,
}

impl State {
    fn snapshot(&self) -> Option<Occupancy> {
        self.listed.clone().map(|listed| self.overlay(listed))
    }

    fn overlay(&self, mut occupancy: Occupancy) -> Occupancy {
        for (slot, confirmed) in &self.confirmed {
            if occupancy.contains(*slot) {
                occupancy.slots[slot.index()] = confirmed.record.clone();
            }
        }
        occupancy
    }
}

/// Holds the latest successful snapshot plus confirmed uploads not yet listed.
pub struct SlotReconciler {
    state: RwLock<State>,
}

impl SlotReconciler {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Last successful snapshot, if any refresh has succeeded yet.
    pub fn snapshot(&self) -> Option<Occupancy> {
        self.read().snapshot()
    }

    /// Record that the remote store accepted `occupant_id` into `slot`.
    ///
    /// Must be called before the capture leaves the local queue, so the slot
    /// is never seen as both unreserved and empty.
    pub fn mark_filled(
        &self,
        slot: SlotNumber,
        occupant_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) {
        let mut state = self.write();
        state.generation += 1;
        let generation = state.generation;
        state.confirmed.insert(
            slot,
            Confirmed {
                record: SlotRecord {
                    slot,
                    occupant_id: Some(occupant_id.into()),
                    created_at: Some(created_at),
                },
                generation,
            },
        );
    }

    /// Fetch the listing and replace the snapshot.
    pub async fn refresh(
        &self,
        remote: &dyn RemotePhotoStore,
        identity: &UploadIdentity,
        limits: &PlanLimits,
    ) -> Result<Occupancy, ReconcileError> {
        let started_at = self.read().generation;
        let listing = match remote.list(identity.event_id()).await {
            Ok(listing) => listing,
            Err(err) => {
                warn!(event_id = %identity.event_id(), error = %err, "listing fetch failed; keeping previous occupancy");
                return Err(ReconcileError::Stale(err));
            }
        };

        let limits = limits.overridden_by(listing.role_caps);
        let cap = capacity_for(identity.role(), &limits);
        let occupancy = reconcile(identity, cap, listing.event_name, &listing.photos);

        debug!(
            event_id = %identity.event_id(),
            role = %identity.role(),
            cap,
            filled = occupancy.filled_count(),
            listed = listing.photos.len(),
            "occupancy reconciled"
        );

        let mut state = self.write();
        // 取得開始より前の印は、この一覧に反映済み
        state.confirmed.retain(|_, c| c.generation > started_at);
        state.listed = Some(occupancy.clone());
        Ok(state.overlay(occupancy))
    }
}

impl Default for SlotReconciler {
    fn default() -> Self {
        Self::new()
    }
}
