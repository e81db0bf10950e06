use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::CaptureId;
use super::slot_key::SlotNumber;

pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// A photo taken on this device that the remote store has not confirmed yet.
///
/// Design:
/// - Created once at capture time; only `target_slot` is ever filled in later.
/// - Owned by the capture store; deleted exactly once on confirmed acceptance.
/// - `target_slot` is fixed by the allocator once occupancy is known, so a retry
///   always overwrites the same remote key. `None` means no listing has been
///   seen yet and the record is not sent until a slot is bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCapture {
    pub id: CaptureId,
    pub created_at: DateTime<Utc>,
    pub owner_nickname: String,
    #[serde(skip)]
    pub image_bytes: Vec<u8>,
    pub mime_type: String,
    pub target_slot: Option<SlotNumber>,
}

impl PendingCapture {
    pub fn new(
        id: CaptureId,
        created_at: DateTime<Utc>,
        owner_nickname: impl Into<String>,
        image_bytes: Vec<u8>,
        mime_type: impl Into<String>,
        target_slot: Option<SlotNumber>,
    ) -> Self {
        Self {
            id,
            created_at,
            owner_nickname: owner_nickname.into(),
            image_bytes,
            mime_type: mime_type.into(),
            target_slot,
        }
    }

    /// Same record bound to `slot`.
    pub fn bound_to(mut self, slot: SlotNumber) -> Self {
        self.target_slot = Some(slot);
        self
    }

    /// File extension sent with the upload; unknown types fall back to jpg.
    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    let mime = mime.to_ascii_lowercase();
    if mime.contains("png") {
        "png"
    } else if mime.contains("webp") {
        "webp"
    } else {
        "jpg"
    }
}
