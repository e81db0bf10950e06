//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **SessionBuilder**: セッションの構築とワイヤリング
//! - **UploadSession**: 表示層に公開する操作の窓口
//! - **SlotReconciler**: リモート一覧 → 占有状況
//! - **SlotAllocator**: append / replace の判断
//! - **AutoSendCoordinator**: single-flight の送信パス
//! - **AutoSendLoop**: タイマーと環境の合図でパスを起こす
//! - **PreviewCache**: 送信待ち画像の表示用ハンドル

pub mod allocator;
pub mod builder;
pub mod coordinator;
pub mod preview;
pub mod reconciler;
pub mod send_loop;
pub mod session;
pub mod status;

// 主要な型を再エクスポート
pub use self::allocator::{Allocation, AllocationMode, SlotAllocator};
pub use self::builder::{BuildError, SessionBuilder};
pub use self::coordinator::AutoSendCoordinator;
pub use self::preview::{PreviewCache, PreviewHandle};
pub use self::reconciler::{SlotReconciler, reconcile};
pub use self::send_loop::{AutoSendLoop, DEFAULT_SEND_INTERVAL, Signal};
pub use self::session::{QueuedCapture, UploadSession};
pub use self::status::{LastPass, SessionStatus};
