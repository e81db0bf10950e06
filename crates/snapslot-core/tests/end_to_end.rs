//! End-to-end scenarios against the in-memory remote.

use std::sync::Arc;

use snapslot_core::SessionBuilder;
use snapslot_core::domain::{
    CaptureError, EventId, Role, RoleCaps, SessionError, SlotKey, SlotNumber, UploadIdentity,
};
use snapslot_core::impls::{InMemoryCaptureStore, InMemoryPhotoStore, SqliteCaptureStore};
use snapslot_core::ports::ConnectivityFlag;

fn guest_k1() -> UploadIdentity {
    UploadIdentity::new(EventId::new("e1"), Role::Guest, "k1")
}

fn slot(n: u32) -> SlotNumber {
    SlotNumber::new(n).unwrap()
}

#[tokio::test]
async fn two_slot_guest_fills_then_replaces() {
    let remote = Arc::new(InMemoryPhotoStore::new("party", RoleCaps { host: 30, guest: 2 }));
    let session = SessionBuilder::new(guest_k1())
        .store(Arc::new(InMemoryCaptureStore::new()))
        .remote(remote.clone())
        .build()
        .unwrap();
    let key = |n| SlotKey::for_identity(&guest_k1(), slot(n));

    session.enqueue_capture(b"p1".to_vec(), "aya").await.unwrap();
    session.enqueue_capture(b"p2".to_vec(), "aya").await.unwrap();

    assert_eq!(remote.get(&key(1)).unwrap().bytes, b"p1".to_vec());
    assert_eq!(remote.get(&key(2)).unwrap().bytes, b"p2".to_vec());
    let view = session.occupancy().unwrap();
    assert!(view.is_at_capacity);
    assert_eq!(view.filled_count, 2);

    let err = session.enqueue_capture(b"p3".to_vec(), "aya").await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Capture(CaptureError::SelectSlotRequired { cap: 2 })
    ));
    assert!(session.pending_snapshot().await.unwrap().is_empty());

    session.select_replace_slot(1).await.unwrap();
    session.enqueue_capture(b"p4".to_vec(), "aya").await.unwrap();

    assert_eq!(remote.get(&key(1)).unwrap().bytes, b"p4".to_vec());
    assert_eq!(remote.photo_count(), 2);
    assert_eq!(session.occupancy().unwrap().filled_count, 2);
}

#[tokio::test]
async fn offline_capture_is_delivered_after_reconnect() {
    let remote = Arc::new(InMemoryPhotoStore::new("party", RoleCaps { host: 30, guest: 5 }));
    let online = Arc::new(ConnectivityFlag::new(false));
    remote.set_offline(true);
    let session = SessionBuilder::new(guest_k1())
        .store(Arc::new(InMemoryCaptureStore::new()))
        .remote(remote.clone())
        .connectivity(online.clone())
        .build()
        .unwrap();

    let id = session.enqueue_capture(b"offline".to_vec(), "aya").await.unwrap();
    assert!(session.is_pending(id).await.unwrap());
    assert_eq!(remote.upload_attempts(), 0);

    online.set_online(true);
    remote.set_offline(false);
    let report = session.trigger_send_now().await.unwrap();

    assert_eq!((report.sent, report.failed), (1, 0));
    assert!(!session.is_pending(id).await.unwrap());
    assert_eq!(session.occupancy().unwrap().filled_count, 1);
}

#[tokio::test]
async fn failed_send_leaves_capture_queued_for_next_pass() {
    let remote = Arc::new(InMemoryPhotoStore::new("party", RoleCaps { host: 30, guest: 5 }));
    let online = Arc::new(ConnectivityFlag::new(true));
    let session = SessionBuilder::new(guest_k1())
        .store(Arc::new(InMemoryCaptureStore::new()))
        .remote(remote.clone())
        .connectivity(online.clone())
        .build()
        .unwrap();
    session.refresh_occupancy().await.unwrap();

    // 一覧は取れるが送信だけ落ちる
    remote.fail_next_upload(snapslot_core::domain::TransportError::Timeout);
    let id = session.enqueue_capture(b"x".to_vec(), "aya").await.unwrap();
    assert!(session.is_pending(id).await.unwrap());

    let report = session.trigger_send_now().await.unwrap();
    assert_eq!(report.sent, 1);
    assert!(!session.is_pending(id).await.unwrap());
}

#[tokio::test]
async fn queue_survives_restart_and_drains() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("queue.db");
    let remote = Arc::new(InMemoryPhotoStore::new("party", RoleCaps { host: 30, guest: 5 }));

    let id = {
        let online = Arc::new(ConnectivityFlag::new(false));
        let session = SessionBuilder::new(guest_k1())
            .store(Arc::new(SqliteCaptureStore::open(&db).unwrap()))
            .remote(remote.clone())
            .connectivity(online)
            .build()
            .unwrap();
        session.enqueue_capture(b"before".to_vec(), "aya").await.unwrap()
    };

    let session = SessionBuilder::new(guest_k1())
        .store(Arc::new(SqliteCaptureStore::open(&db).unwrap()))
        .remote(remote.clone())
        .build()
        .unwrap();
    assert!(session.is_pending(id).await.unwrap());

    let report = session.trigger_send_now().await.unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(
        remote.get(&SlotKey::for_identity(&guest_k1(), slot(1))).unwrap().bytes,
        b"before".to_vec()
    );
}

#[tokio::test]
async fn resubmitting_same_slot_overwrites() {
    use snapslot_core::ports::{RemotePhotoStore, UploadRequest};

    let remote = InMemoryPhotoStore::new("party", RoleCaps { host: 30, guest: 5 });
    let identity = guest_k1();
    for bytes in [b"A", b"B"] {
        let key = SlotKey::for_identity(&identity, slot(3));
        remote
            .upload(UploadRequest {
                identity: &identity,
                file_name: key.file_name("jpg"),
                key,
                image_bytes: bytes,
                mime_type: "image/jpeg",
                owner_nickname: "aya",
                created_at_ms: 0,
            })
            .await
            .unwrap();
    }

    let listing = remote.list(identity.event_id()).await.unwrap();
    let occupancy = snapslot_core::app::reconcile(&identity, 5, None, &listing.photos);
    assert_eq!(occupancy.filled_count(), 1);
    assert_eq!(
        remote.get(&SlotKey::for_identity(&identity, slot(3))).unwrap().bytes,
        b"B".to_vec()
    );
}
