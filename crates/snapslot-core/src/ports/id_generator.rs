//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use crate::domain::ids::{CaptureId, PassId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は端末内で一意な ID を生成
///
/// # ULID の特性
/// - 時刻でソート可能
/// - オフラインでも生成可能（調整不要）
pub trait IdGenerator: Send + Sync {
    fn generate_capture_id(&self) -> CaptureId;

    fn generate_pass_id(&self) -> PassId;
}

/// Clock の時刻 + 乱数で ULID を作る
///
/// FixedClock を渡すとタイムスタンプ部分が決定的になります。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_capture_id(&self) -> CaptureId {
        CaptureId::from(self.next_ulid())
    }

    fn generate_pass_id(&self) -> PassId {
        PassId::from(self.next_ulid())
    }
}
