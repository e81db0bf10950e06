//! snapslot-core
//!
//! 撮影した写真を端末内キューに貯め、回線が戻り次第リモートの「枠」に送る仕組み。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, identity, slot_key, capture, occupancy, plan, outcome, errors）
//! - **ports**: 抽象化レイヤー（CaptureStore, RemotePhotoStore, Connectivity, Clock, IdGenerator）
//! - **impls**: 実装（SqliteCaptureStore, HttpPhotoStore, インメモリ版）
//! - **app**: アプリケーションロジック（session, reconciler, allocator, coordinator, send_loop）
//! - **config**: `snapslot.toml` と `SNAPSLOT_*` 環境変数
//! - **observability**: tracing subscriber の初期化
//!
//! # 保証
//! - 少なくとも 1 回は届く（送信成功が確認できるまでキューから消さない）
//! - 同じ枠への再送は上書きなので、重複排除のテーブルは持たない

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;

pub use app::{AutoSendLoop, SessionBuilder, Signal, UploadSession};
pub use config::{ConfigError, SnapslotConfig};
