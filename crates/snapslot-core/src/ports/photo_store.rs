//! RemotePhotoStore port - リモート写真ストア（範囲外の外部システム）
//!
//! # 契約
//! - `list(eventId)`: イベント全体の写真一覧と role ごとの上限
//! - `upload(...)`: `(role, identityKey, slot)` 単位で冪等（同じキーは上書き）
//!
//! # 実装
//! - **HttpPhotoStore**: 本番用（reqwest）
//! - **InMemoryPhotoStore**: テスト・デモ用

use async_trait::async_trait;

use crate::domain::{EventId, EventListing, SlotKey, TransportError, UploadAck, UploadIdentity};

/// One submission; `key` is the remote overwrite target.
#[derive(Debug, Clone)]
pub struct UploadRequest<'a> {
    pub identity: &'a UploadIdentity,
    pub key: SlotKey,
    pub image_bytes: &'a [u8],
    pub mime_type: &'a str,
    pub file_name: String,
    pub owner_nickname: &'a str,
    pub created_at_ms: i64,
}

#[async_trait]
pub trait RemotePhotoStore: Send + Sync {
    async fn list(&self, event_id: &EventId) -> Result<EventListing, TransportError>;

    /// Must return `Err` unless the store explicitly acknowledged the upload.
    async fn upload(&self, request: UploadRequest<'_>) -> Result<UploadAck, TransportError>;
}
