//! InMemoryPhotoStore - 開発・テスト用のリモート写真ストア
//!
//! 本物のリモートはこのリポジトリの範囲外です。ここでは契約だけを再現します:
//! - slot キー単位の上書き（同じキーに 2 回送ると中身は後勝ちで 1 枚）
//! - 一覧の id には拡張子が付く（`guest-k1-slot-1.jpg`）
//! - 障害注入（オフライン、次の N 回を失敗させる、応答遅延）

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{
    EventId, EventListing, RemotePhoto, RoleCaps, SlotKey, TransportError, UploadAck,
};
use crate::ports::{RemotePhotoStore, UploadRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPhoto {
    pub listed_id: String,
    pub bytes: Vec<u8>,
    pub nickname: String,
    pub created_at_ms: i64,
}

#[derive(Default)]
struct State {
    event_name: Option<String>,
    role_caps: Option<RoleCaps>,
    /// Keyed by slot key without extension (the overwrite target).
    photos: BTreeMap<String, StoredPhoto>,
    /// Entries that do not follow the slot naming (other clients, legacy ids).
    foreign: Vec<RemotePhoto>,
    offline: bool,
    failing_uploads: VecDeque<TransportError>,
    failing_lists: VecDeque<TransportError>,
    upload_delay: Option<Duration>,
    upload_attempts: usize,
    in_flight: usize,
    max_in_flight: usize,
}

#[derive(Default)]
pub struct InMemoryPhotoStore {
    state: Mutex<State>,
}

impl InMemoryPhotoStore {
    pub fn new(event_name: impl Into<String>, role_caps: RoleCaps) -> Self {
        Self {
            state: Mutex::new(State {
                event_name: Some(event_name.into()),
                role_caps: Some(role_caps),
                ..State::default()
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// The next upload fails with `err` (queued; one error per call).
    pub fn fail_next_upload(&self, err: TransportError) {
        self.state().failing_uploads.push_back(err);
    }

    pub fn fail_next_list(&self, err: TransportError) {
        self.state().failing_lists.push_back(err);
    }

    pub fn set_upload_delay(&self, delay: Duration) {
        self.state().upload_delay = Some(delay);
    }

    pub fn set_role_caps(&self, caps: RoleCaps) {
        self.state().role_caps = Some(caps);
    }

    /// Simulates a moderation/host deletion of one slot.
    pub fn delete(&self, key: &SlotKey) -> Option<StoredPhoto> {
        self.state().photos.remove(&key.to_string())
    }

    pub fn insert_foreign(&self, photo: RemotePhoto) {
        self.state().foreign.push(photo);
    }

    pub fn get(&self, key: &SlotKey) -> Option<StoredPhoto> {
        self.state().photos.get(&key.to_string()).cloned()
    }

    pub fn photo_count(&self) -> usize {
        self.state().photos.len()
    }

    pub fn upload_attempts(&self) -> usize {
        self.state().upload_attempts
    }

    /// Highest number of uploads observed in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.state().max_in_flight
    }
}

#[async_trait]
impl RemotePhotoStore for InMemoryPhotoStore {
    async fn list(&self, _event_id: &EventId) -> Result<EventListing, TransportError> {
        let listing = {
            let mut state = self.state();
            if state.offline {
                return Err(TransportError::NetworkUnavailable("offline".to_string()));
            }
            if let Some(err) = state.failing_lists.pop_front() {
                return Err(err);
            }
            let mut photos: Vec<RemotePhoto> = state
                .photos
                .values()
                .map(|p| RemotePhoto::new(p.listed_id.clone(), p.created_at_ms))
                .collect();
            photos.extend(state.foreign.iter().cloned());
            EventListing {
                ok: true,
                event_name: state.event_name.clone(),
                role_caps: state.role_caps,
                photos,
            }
        };
        Ok(listing)
    }

    async fn upload(&self, request: UploadRequest<'_>) -> Result<UploadAck, TransportError> {
        let delay = {
            let mut state = self.state();
            state.upload_attempts += 1;
            if state.offline {
                return Err(TransportError::NetworkUnavailable("offline".to_string()));
            }
            if let Some(err) = state.failing_uploads.pop_front() {
                return Err(err);
            }
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.upload_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        state.in_flight -= 1;
        state.photos.insert(
            request.key.to_string(),
            StoredPhoto {
                listed_id: request.file_name.clone(),
                bytes: request.image_bytes.to_vec(),
                nickname: request.owner_nickname.to_string(),
                created_at_ms: request.created_at_ms,
            },
        );
        Ok(UploadAck::accepted(Some(format!(
            "memory://{}/{}",
            request.identity.event_id(),
            request.file_name
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Role, SlotNumber, UploadIdentity};

    fn request<'a>(
        identity: &'a UploadIdentity,
        slot: u32,
        bytes: &'a [u8],
    ) -> UploadRequest<'a> {
        let key = SlotKey::for_identity(identity, SlotNumber::new(slot).unwrap());
        UploadRequest {
            identity,
            file_name: key.file_name("jpg"),
            key,
            image_bytes: bytes,
            mime_type: "image/jpeg",
            owner_nickname: "guest",
            created_at_ms: 1,
        }
    }

    #[tokio::test]
    async fn same_slot_overwrites() {
        let store = InMemoryPhotoStore::new("e", RoleCaps { host: 5, guest: 3 });
        let identity = UploadIdentity::new(EventId::new("e1"), Role::Guest, "k1");

        store.upload(request(&identity, 3, b"A")).await.unwrap();
        store.upload(request(&identity, 3, b"B")).await.unwrap();

        let key = SlotKey::for_identity(&identity, SlotNumber::new(3).unwrap());
        assert_eq!(store.photo_count(), 1);
        assert_eq!(store.get(&key).unwrap().bytes, b"B".to_vec());
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let store = InMemoryPhotoStore::new("e", RoleCaps { host: 5, guest: 3 });
        let identity = UploadIdentity::new(EventId::new("e1"), Role::Guest, "k1");
        store.fail_next_upload(TransportError::Timeout);

        let first = store.upload(request(&identity, 1, b"A")).await;
        let second = store.upload(request(&identity, 1, b"A")).await;

        assert_eq!(first.unwrap_err(), TransportError::Timeout);
        assert!(second.is_ok());
        assert_eq!(store.upload_attempts(), 2);
    }

    #[tokio::test]
    async fn listing_includes_extension_and_foreign_ids() {
        let store = InMemoryPhotoStore::new("party", RoleCaps { host: 5, guest: 3 });
        let identity = UploadIdentity::new(EventId::new("e1"), Role::Guest, "k1");
        store.upload(request(&identity, 2, b"A")).await.unwrap();
        store.insert_foreign(RemotePhoto::new("legacy.jpg", 0));

        let listing = store.list(identity.event_id()).await.unwrap();
        let ids: Vec<&str> = listing.photos.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["guest-k1-slot-2.jpg", "legacy.jpg"]);
        assert_eq!(listing.event_name.as_deref(), Some("party"));
    }
}
