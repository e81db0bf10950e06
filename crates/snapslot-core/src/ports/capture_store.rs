//! CaptureStore port - 未確認の撮影データを保持する端末内キュー
//!
//! このキュー自体が再送の仕組みです。送信に失敗したレコードは残り、
//! 次のパスでもう一度試されます。別途リトライ回数を持つ必要はありません。
//!
//! # 実装
//! - **SqliteCaptureStore**: 本番用（再起動をまたいで残る）
//! - **InMemoryCaptureStore**: テスト用

use async_trait::async_trait;

use crate::domain::{CaptureId, PendingCapture, StorageError};

/// Durable queue of captures the remote store has not confirmed.
///
/// Contract:
/// - `enqueue` is an upsert by id (last write wins).
/// - `list_all` has no consumption side effects and returns newest first.
/// - `remove` is a no-op for unknown ids.
/// - Readers never observe a half-written record.
#[async_trait]
pub trait CaptureStore: Send + Sync {
    async fn enqueue(&self, record: PendingCapture) -> Result<(), StorageError>;

    /// All records ordered by `created_at` descending.
    async fn list_all(&self) -> Result<Vec<PendingCapture>, StorageError>;

    async fn remove(&self, id: CaptureId) -> Result<(), StorageError>;

    /// Administrative reset.
    async fn clear(&self) -> Result<(), StorageError>;
}
