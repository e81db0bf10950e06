//! Ports - 抽象化レイヤー
//!
//! 外部システム（端末内 DB、リモート写真ストア、OS の接続状態、時計）への
//! インターフェースを trait として定義し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - 端末内キュー（CaptureStore）が「未送信」の正本
//! - リモート一覧が「埋まっている枠」の正本
//! - identity は暗黙の共有状態から読まず、常に引数で渡す

pub mod capture_store;
pub mod clock;
pub mod connectivity;
pub mod id_generator;
pub mod photo_store;

pub use self::capture_store::CaptureStore;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::connectivity::{AlwaysOnline, Connectivity, ConnectivityFlag};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::photo_store::{RemotePhotoStore, UploadRequest};
