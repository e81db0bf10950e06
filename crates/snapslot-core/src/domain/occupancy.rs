//! Occupancy - 「自分の N 枠のうちどれが埋まっているか」のスナップショット
//!
//! SlotRecord は永続化されず、リモート一覧を取得するたびに作り直されます。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::slot_key::SlotNumber;

/// One of `cap` slots of an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRecord {
    pub slot: SlotNumber,
    pub occupant_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl SlotRecord {
    pub fn empty(slot: SlotNumber) -> Self {
        Self {
            slot,
            occupant_id: None,
            created_at: None,
        }
    }

    pub fn is_filled(&self) -> bool {
        self.occupant_id.is_some()
    }
}

/// Derived occupancy of one identity; `slots.len() == cap`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occupancy {
    pub event_name: Option<String>,
    pub slots: Vec<SlotRecord>,
}

impl Occupancy {
    /// All `cap` slots empty.
    pub fn empty(cap: u32) -> Self {
        Self {
            event_name: None,
            slots: (0..cap as usize).map(|i| SlotRecord::empty(SlotNumber::from_index(i))).collect(),
        }
    }

    pub fn cap(&self) -> u32 {
        self.slots.len() as u32
    }

    pub fn filled_count(&self) -> u32 {
        self.slots.iter().filter(|s| s.is_filled()).count() as u32
    }

    pub fn is_at_capacity(&self) -> bool {
        self.filled_count() == self.cap()
    }

    /// Lowest empty slot, or `None` at capacity.
    pub fn next_open_slot(&self) -> Option<SlotNumber> {
        self.slots.iter().find(|s| !s.is_filled()).map(|s| s.slot)
    }

    pub fn contains(&self, slot: SlotNumber) -> bool {
        slot.get() <= self.cap()
    }

    pub fn slot(&self, slot: SlotNumber) -> Option<&SlotRecord> {
        self.slots.get(slot.index())
    }

    /// Flattened view handed to the presentation layer.
    pub fn view(&self) -> OccupancyView {
        OccupancyView {
            event_name: self.event_name.clone(),
            slots: self.slots.clone(),
            filled_count: self.filled_count(),
            is_at_capacity: self.is_at_capacity(),
            next_open_slot: self.next_open_slot(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyView {
    pub event_name: Option<String>,
    pub slots: Vec<SlotRecord>,
    pub filled_count: u32,
    pub is_at_capacity: bool,
    pub next_open_slot: Option<SlotNumber>,
}
