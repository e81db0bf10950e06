//! Outcome model: what one auto-send pass did.
//!
//! The capture store stays the source of truth for "still pending"; these
//! types only describe a pass so callers can show it and logs can explain it.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{CaptureId, PassId};
use super::slot_key::SlotNumber;

/// Why a pass was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Boot,
    ConnectivityRestored,
    Interval,
    Foreground,
    CaptureEnqueued,
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trigger::Boot => "boot",
            Trigger::ConnectivityRestored => "connectivity_restored",
            Trigger::Interval => "interval",
            Trigger::Foreground => "foreground",
            Trigger::CaptureEnqueued => "capture_enqueued",
            Trigger::Manual => "manual",
        };
        f.write_str(s)
    }
}

/// Per-record result classification.
///
/// Serialized as SCREAMING_SNAKE_CASE: SENT / FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordOutcomeKind {
    Sent,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordOutcome {
    pub capture_id: CaptureId,
    pub slot: SlotNumber,
    pub kind: RecordOutcomeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RecordOutcome {
    pub fn sent(capture_id: CaptureId, slot: SlotNumber) -> Self {
        Self {
            capture_id,
            slot,
            kind: RecordOutcomeKind::Sent,
            reason: None,
        }
    }

    pub fn failed(capture_id: CaptureId, slot: SlotNumber, reason: impl Into<String>) -> Self {
        Self {
            capture_id,
            slot,
            kind: RecordOutcomeKind::Failed,
            reason: Some(reason.into()),
        }
    }
}

/// Aggregate `{sent, failed}` of one pass.
///
/// `deferred` counts records left queued because no slot was bound yet; they
/// were not attempted and are not failures.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PassReport {
    pub sent: u32,
    pub failed: u32,
    #[serde(default)]
    pub deferred: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<RecordOutcome>,
}

impl PassReport {
    pub fn record(&mut self, outcome: RecordOutcome) {
        match outcome.kind {
            RecordOutcomeKind::Sent => self.sent += 1,
            RecordOutcomeKind::Failed => self.failed += 1,
        }
        self.records.push(outcome);
    }
}

/// Result of asking the coordinator for a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// The pass ran every queued record.
    Completed { pass_id: PassId, report: PassReport },

    /// Another pass was running; this trigger was dropped.
    SkippedBusy,

    /// No connectivity; the store was not touched.
    SkippedOffline,
}

impl PassOutcome {
    /// `{0, 0}` for skipped passes.
    pub fn report(&self) -> PassReport {
        match self {
            PassOutcome::Completed { report, .. } => report.clone(),
            _ => PassReport::default(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, PassOutcome::Completed { .. })
    }
}
