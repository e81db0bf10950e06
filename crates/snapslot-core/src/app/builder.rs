//! SessionBuilder - UploadSession の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）: ストアとリモートが無ければ build() で失敗

use std::sync::Arc;

use crate::app::session::UploadSession;
use crate::domain::{PlanLimits, UploadIdentity};
use crate::ports::{
    AlwaysOnline, CaptureStore, Clock, Connectivity, RemotePhotoStore, SystemClock,
};

/// BuildError はセッション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no capture store configured")]
    MissingStore,

    #[error("no remote photo store configured")]
    MissingRemote,
}

/// # 使用例
/// ```ignore
/// let session = SessionBuilder::new(identity)
///     .store(Arc::new(SqliteCaptureStore::open("queue.db")?))
///     .remote(Arc::new(HttpPhotoStore::new(api_base, timeout)?))
///     .build()?;
/// ```
pub struct SessionBuilder {
    identity: UploadIdentity,
    limits: PlanLimits,
    store: Option<Arc<dyn CaptureStore>>,
    remote: Option<Arc<dyn RemotePhotoStore>>,
    connectivity: Arc<dyn Connectivity>,
    clock: Arc<dyn Clock>,
}

impl SessionBuilder {
    pub fn new(identity: UploadIdentity) -> Self {
        Self {
            identity,
            limits: PlanLimits::default(),
            store: None,
            remote: None,
            connectivity: Arc::new(AlwaysOnline),
            clock: Arc::new(SystemClock),
        }
    }

    /// Limits used until a listing supplies `roleCaps`.
    pub fn plan_limits(mut self, limits: PlanLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn store(mut self, store: Arc<dyn CaptureStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn remote(mut self, remote: Arc<dyn RemotePhotoStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = connectivity;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<UploadSession, BuildError> {
        let store = self.store.ok_or(BuildError::MissingStore)?;
        let remote = self.remote.ok_or(BuildError::MissingRemote)?;
        Ok(UploadSession::new(
            self.identity,
            self.limits,
            store,
            remote,
            self.connectivity,
            self.clock,
        ))
    }
}
