//! Status - セッションの現在地
//!
//! 「何枚送信待ちか」「枠はどこまで埋まったか」「最後のパスはどうだったか」を
//! 1 つにまとめて返します。CLI の `status` やログ出力に使います。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{OccupancyView, PassId, SlotNumber, Trigger};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastPass {
    pub pass_id: PassId,
    pub trigger: Trigger,
    pub finished_at: DateTime<Utc>,
    pub sent: u32,
    pub failed: u32,
    pub deferred: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub pending: usize,
    /// Pending captures queued before any listing was seen; not sent until bound.
    pub awaiting_slot: usize,
    /// `None` until a listing fetch has succeeded.
    pub occupancy: Option<OccupancyView>,
    pub selection: Option<SlotNumber>,
    pub last_pass: Option<LastPass>,
}

impl SessionStatus {
    /// Something is still waiting to be confirmed by the remote store.
    pub fn has_unsent(&self) -> bool {
        self.pending > 0
    }
}
