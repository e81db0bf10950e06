//! SlotAllocator - 次の撮影をどの枠に入れるか
//!
//! # モード
//! - **Append**: 空き枠がある。一番小さい空き枠に黙って入れる
//! - **Replace**: 空きが無い。ユーザーが選んだ枠を上書きする（未選択なら拒否）
//!
//! 送信待ちの撮影が狙っている枠は「予約済み」として空き枠から外します。
//! オフラインで 2 枚撮っても同じ空き枠には入りません。
//!
//! 選択は 1 つだけ保持します。上書き用の撮影が送信済みと確認できるまで残り、
//! 送信に失敗している間は同じ枠に向けて自動で再送されます。

use std::collections::BTreeSet;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::domain::{CaptureError, CaptureId, Occupancy, SlotNumber};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMode {
    Append,
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub slot: SlotNumber,
    pub mode: AllocationMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Selection {
    slot: SlotNumber,
    /// The capture that consumed this selection, once one has.
    used_by: Option<CaptureId>,
}

#[derive(Debug, Default)]
pub struct SlotAllocator {
    selection: Mutex<Option<Selection>>,
}

impl SlotAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn selection_guard(&self) -> std::sync::MutexGuard<'_, Option<Selection>> {
        self.selection.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current replace target, if any.
    pub fn selection(&self) -> Option<SlotNumber> {
        self.selection_guard().map(|s| s.slot)
    }

    /// Choose the slot the next capture overwrites; replaces any prior choice.
    pub fn select(&self, slot: SlotNumber, occupancy: &Occupancy) -> Result<(), CaptureError> {
        if !occupancy.contains(slot) {
            return Err(CaptureError::out_of_range(slot, occupancy.cap()));
        }
        *self.selection_guard() = Some(Selection {
            slot,
            used_by: None,
        });
        Ok(())
    }

    pub fn clear_selection(&self) {
        *self.selection_guard() = None;
    }

    /// Re-evaluate against a fresh snapshot.
    ///
    /// A selection that no longer fits the cap is dropped, and so is any
    /// selection once an unreserved open slot exists again.
    pub fn observe(&self, occupancy: &Occupancy, reserved: &BTreeSet<SlotNumber>) {
        let mut selection = self.selection_guard();
        let Some(current) = *selection else {
            return;
        };
        if !occupancy.contains(current.slot) || open_slot(occupancy, reserved).is_some() {
            *selection = None;
        }
    }

    /// Decide the target slot for a new capture.
    ///
    /// `reserved` are the slots already targeted by still-pending captures.
    pub fn allocate(
        &self,
        occupancy: &Occupancy,
        reserved: &BTreeSet<SlotNumber>,
    ) -> Result<Allocation, CaptureError> {
        let mut selection = self.selection_guard();

        if let Some(slot) = open_slot(occupancy, reserved) {
            *selection = None;
            return Ok(Allocation {
                slot,
                mode: AllocationMode::Append,
            });
        }

        match *selection {
            Some(current) if occupancy.contains(current.slot) => Ok(Allocation {
                slot: current.slot,
                mode: AllocationMode::Replace,
            }),
            Some(current) => {
                *selection = None;
                Err(CaptureError::out_of_range(current.slot, occupancy.cap()))
            }
            None => Err(CaptureError::SelectSlotRequired {
                cap: occupancy.cap(),
            }),
        }
    }

    /// Remember which capture used the current selection.
    pub fn mark_used(&self, slot: SlotNumber, capture_id: CaptureId) {
        if let Some(current) = self.selection_guard().as_mut() {
            if current.slot == slot {
                current.used_by = Some(capture_id);
            }
        }
    }

    /// Clear the selection when the capture that used it was confirmed sent.
    ///
    /// Returns true if the selection was cleared.
    pub fn confirm_sent(&self, sent: &[CaptureId]) -> bool {
        let mut selection = self.selection_guard();
        match *selection {
            Some(Selection {
                used_by: Some(id), ..
            }) if sent.contains(&id) => {
                *selection = None;
                true
            }
            _ => false,
        }
    }
}

fn open_slot(occupancy: &Occupancy, reserved: &BTreeSet<SlotNumber>) -> Option<SlotNumber> {
    occupancy
        .slots
        .iter()
        .find(|s| !s.is_filled() && !reserved.contains(&s.slot))
        .map(|s| s.slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn slot(n: u32) -> SlotNumber {
        SlotNumber::new(n).unwrap()
    }

    fn occupancy(cap: u32, filled: &[u32]) -> Occupancy {
        let mut occupancy = Occupancy::empty(cap);
        for &n in filled {
            occupancy.slots[slot(n).index()].occupant_id = Some(format!("guest-k1-slot-{n}"));
        }
        occupancy
    }

    fn none() -> BTreeSet<SlotNumber> {
        BTreeSet::new()
    }

    #[test]
    fn append_mode_targets_lowest_open_slot() {
        let allocator = SlotAllocator::new();
        let allocation = allocator.allocate(&occupancy(3, &[1]), &none()).unwrap();
        assert_eq!(
            allocation,
            Allocation {
                slot: slot(2),
                mode: AllocationMode::Append
            }
        );
    }

    #[test]
    fn reserved_slots_are_skipped() {
        let allocator = SlotAllocator::new();
        let reserved = BTreeSet::from([slot(1), slot(2)]);
        let allocation = allocator.allocate(&occupancy(3, &[]), &reserved).unwrap();
        assert_eq!(allocation.slot, slot(3));
    }

    #[test]
    fn at_capacity_without_selection_is_rejected() {
        let allocator = SlotAllocator::new();
        let err = allocator.allocate(&occupancy(3, &[1, 2, 3]), &none()).unwrap_err();
        assert_eq!(err, CaptureError::SelectSlotRequired { cap: 3 });
    }

    #[test]
    fn fully_reserved_behaves_like_replace_mode() {
        let allocator = SlotAllocator::new();
        let reserved = BTreeSet::from([slot(2)]);
        let full = occupancy(2, &[1]);

        assert!(allocator.allocate(&full, &reserved).is_err());

        allocator.select(slot(2), &full).unwrap();
        let allocation = allocator.allocate(&full, &reserved).unwrap();
        assert_eq!(allocation.mode, AllocationMode::Replace);
        assert_eq!(allocation.slot, slot(2));
    }

    #[test]
    fn selection_is_single_and_range_checked() {
        let allocator = SlotAllocator::new();
        let full = occupancy(3, &[1, 2, 3]);

        allocator.select(slot(1), &full).unwrap();
        allocator.select(slot(3), &full).unwrap();
        assert_eq!(allocator.selection(), Some(slot(3)));

        let err = allocator.select(slot(4), &full).unwrap_err();
        assert_eq!(err, CaptureError::SlotOutOfRange { slot: 4, cap: 3 });
        assert_eq!(allocator.selection(), Some(slot(3)));
    }

    #[test]
    fn dropping_below_capacity_discards_selection() {
        let allocator = SlotAllocator::new();
        allocator.select(slot(1), &occupancy(3, &[1, 2, 3])).unwrap();

        let freed = occupancy(3, &[1, 3]);
        allocator.observe(&freed, &none());

        assert_eq!(allocator.selection(), None);
        assert_eq!(allocator.allocate(&freed, &none()).unwrap().slot, slot(2));
    }

    #[test]
    fn selection_survives_until_its_capture_is_sent() {
        let allocator = SlotAllocator::new();
        let full = occupancy(2, &[1, 2]);
        allocator.select(slot(1), &full).unwrap();

        let allocation = allocator.allocate(&full, &none()).unwrap();
        let capture = CaptureId::from_ulid(Ulid::new());
        allocator.mark_used(allocation.slot, capture);

        assert!(!allocator.confirm_sent(&[]));
        assert_eq!(allocator.selection(), Some(slot(1)));

        assert!(allocator.confirm_sent(&[capture]));
        assert_eq!(allocator.selection(), None);
    }
}
