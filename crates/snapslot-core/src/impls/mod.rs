//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **SqliteCaptureStore**: 本番用の端末内キュー（再起動をまたいで残る）
//! - **InMemoryCaptureStore**: テスト用のキュー
//! - **HttpPhotoStore**: 本番用のリモート写真ストアクライアント
//! - **InMemoryPhotoStore**: テスト・デモ用のリモート（障害注入つき）

pub mod http_photo_store;
pub mod inmem_photo_store;
pub mod inmem_store;
pub mod sqlite_store;

// 主要な型を再エクスポート
pub use self::http_photo_store::HttpPhotoStore;
pub use self::inmem_photo_store::{InMemoryPhotoStore, StoredPhoto};
pub use self::inmem_store::InMemoryCaptureStore;
pub use self::sqlite_store::SqliteCaptureStore;
