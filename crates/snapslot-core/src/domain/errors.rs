//! Errors - エラー型と分類
//!
//! # 分類
//! - StorageError: 端末内キューの 1 操作が失敗（呼び出し元へ返す。プロセスは落とさない）
//! - TransportError: 送信の失敗（すべて回復可能。レコードはキューに残り次のパスで再送）
//! - ReconcileError: リモート一覧の取得失敗（スナップショットは更新しない。「0 枚」と読まない）
//! - CaptureError: 撮影の拒否（差し替え先が未選択など）

use thiserror::Error;

use super::slot_key::SlotNumber;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("capture store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt capture record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Unavailable(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No request was attempted (offline, connection refused, DNS failure).
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    /// Non-success status, or a well-formed body saying `ok: false`.
    #[error("server rejected submission: {0}")]
    ServerRejected(String),

    #[error("request timed out")]
    Timeout,

    /// A response arrived but is not the expected JSON shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// The listing could not be fetched; the previous snapshot is still current.
    #[error("occupancy is stale: {0}")]
    Stale(#[source] TransportError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("all {cap} slots are filled; select a slot to replace")]
    SelectSlotRequired { cap: u32 },

    #[error("slot {slot} is outside 1..={cap}")]
    SlotOutOfRange { slot: u32, cap: u32 },
}

/// Umbrella error for the session facade.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

impl CaptureError {
    pub fn out_of_range(slot: SlotNumber, cap: u32) -> Self {
        CaptureError::SlotOutOfRange {
            slot: slot.get(),
            cap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_keeps_transport_cause() {
        use std::error::Error as _;

        let err = ReconcileError::Stale(TransportError::Timeout);
        assert!(err.to_string().contains("stale"));
        assert_eq!(err.source().unwrap().to_string(), "request timed out");
    }

    #[test]
    fn select_slot_message_is_actionable() {
        let err = CaptureError::SelectSlotRequired { cap: 3 };
        assert_eq!(
            err.to_string(),
            "all 3 slots are filled; select a slot to replace"
        );
    }
}
