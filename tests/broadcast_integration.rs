//! Integration tests for the visual broadcast transport
//!
//! A `ChannelFrameDisplay` stands in for the sender's screen and its camera
//! for the receiver's; both ends run through the public sync API.

use fintrack_sync::adapters::outbound::{
    ChannelCaptureDevice, ChannelFrameDisplay, DashMapIdentityStore, DashMapSnapshotStore, DashMapStore,
};
use fintrack_sync::{
    AccountRecord, CloneSession, Codec, FinanceSnapshot, FrameDisplay, HoldingRecord, IdentityStore, ReceiveInput, SnapshotStore,
    SyncAction, SyncConfig, SyncError, SyncPayload, SyncService, TransactionRecord, TransportKind, UserIdentity,
    VisualTransport,
};
use std::sync::Arc;
use std::time::Duration;

fn snapshot(n: usize) -> FinanceSnapshot {
    let transactions = (0..n)
        .map(|i| TransactionRecord {
            id: format!("tx-{:03}", i),
            date: format!("2024-{:02}-{:02}", i % 12 + 1, i % 28 + 1),
            description: format!("merchant {} order {}", i * 31 % 97, i * 7919 % 10007),
            amount: -((i * 13 % 200) as f64) - 0.25,
            category: ["Food", "Rent", "Travel", "Fun"][i % 4].to_string(),
            account_name: (i % 3 == 0).then(|| "Checking".to_string()),
        })
        .collect();

    FinanceSnapshot {
        transactions,
        accounts: vec![AccountRecord {
            id: "acc-1".into(),
            name: "Brokerage".into(),
            category: "Investment".into(),
            institution: Some("Vanguard".into()),
            balance: 450.0,
            holdings: Some(vec![HoldingRecord {
                id: "h-1".into(),
                name: "Apple".into(),
                ticker: Some("AAPL".into()),
                quantity: 3.0,
                price: 150.0,
                value: 450.0,
                external_id: None,
            }]),
        }],
        transaction_categories: vec!["Food".into(), "Rent".into()],
        last_updated: 1_700_000_000_000,
        ..Default::default()
    }
}

async fn sender(n: usize) -> (DashMapIdentityStore, DashMapSnapshotStore) {
    let identities = DashMapIdentityStore::signed_in(UserIdentity::new("user-42", "Ada"));
    identities.save_credential(Some("sk-live")).await.unwrap();
    let snapshots = DashMapSnapshotStore::new();
    snapshots.save("user-42", &snapshot(n)).await.unwrap();
    (identities, snapshots)
}

fn config() -> SyncConfig {
    SyncConfig::new("https://fintrack.test")
        .transport(TransportKind::Broadcast)
        .max_fragment_size(120)
        .frame_interval(Duration::from_millis(5))
}

/// Multipart broadcast from one service is scanned and applied by another
#[tokio::test]
async fn test_broadcast_clone_round_trip() {
    let (s_ids, s_snaps) = sender(30).await;
    let display = Arc::new(ChannelFrameDisplay::new());
    let camera = display.camera();

    let store = DashMapStore::from_parts(s_ids, s_snaps.clone());
    let sending = SyncService::new(Arc::new(store), config()).with_display(display.clone());
    let CloneSession::Broadcast(session) = sending.start_clone().await.unwrap() else {
        panic!("broadcast transport configured");
    };
    assert!(session.frame_count() > 1);

    let r_ids = DashMapIdentityStore::new();
    let r_snaps = DashMapSnapshotStore::new();
    let receiving = SyncService::new(Arc::new(DashMapStore::from_parts(r_ids.clone(), r_snaps.clone())), config());

    let report = tokio::time::timeout(Duration::from_secs(10), receiving.receive(ReceiveInput::Camera(&camera)))
        .await
        .expect("scan should finish")
        .unwrap();
    session.stop();

    assert_eq!(report.action, SyncAction::Replaced);
    assert_eq!(report.transactions, 30);
    assert_eq!(camera.stop_count(), 1);

    let sent = s_snaps.load("user-42").await.unwrap().unwrap();
    let received = r_snaps.load("user-42").await.unwrap().unwrap();
    assert_eq!(received.transactions, sent.transactions);
    assert_eq!(received.accounts, sent.accounts);
    assert_eq!(received.transaction_categories, sent.transaction_categories);
    assert_eq!(r_ids.current().await.unwrap().unwrap().name, "Ada");
    assert_eq!(r_ids.credential().await.unwrap().as_deref(), Some("sk-live"));
    assert!(display.current().is_none());
}

/// A stalled collection times out; a later fresh session succeeds
#[tokio::test(start_paused = true)]
async fn test_scan_timeout_then_fresh_session_succeeds() {
    let config = config().scan_timeout(Duration::from_millis(500));
    let transport = VisualTransport::new(Codec::standard(), &config);
    let payload = SyncPayload::new(UserIdentity::new("user-42", "Ada"), snapshot(20), None);

    let display = Arc::new(ChannelFrameDisplay::new());
    let camera = display.camera();

    let stalled = transport.frames(&payload).unwrap();
    let total = stalled.len();
    assert!(total > 2);

    let d = display.clone();
    let first = stalled[0].clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        d.show("not a sync code");
        d.show(&first);
    });

    let err = transport.scan(&camera).await.unwrap_err();
    assert_eq!(err, SyncError::ScanTimeout { received: 1, total });
    assert!(err.is_retryable());

    let fresh = transport.frames(&payload).unwrap();
    let mut handle = VisualTransport::show_frames(fresh, display.clone(), Duration::from_millis(20));

    let decoded = transport.scan(&camera).await.unwrap();
    handle.stop();

    assert_eq!(decoded, payload);
    assert_eq!(camera.stop_count(), 2);
}

/// A denied camera surfaces as a capability error and writes nothing
#[tokio::test]
async fn test_denied_camera_is_capability_error() {
    let r_snaps = DashMapSnapshotStore::new();
    let receiving = SyncService::new(
        Arc::new(DashMapStore::from_parts(DashMapIdentityStore::new(), r_snaps.clone())),
        config(),
    );
    let camera = ChannelCaptureDevice::denied();

    let err = receiving.receive(ReceiveInput::Camera(&camera)).await.unwrap_err();

    assert!(matches!(err, SyncError::Capability(_)));
    assert!(!err.is_retryable());
    assert!(r_snaps.is_empty());
}

/// A payload larger than the frame limit is refused before anything is shown
#[tokio::test]
async fn test_oversized_payload_is_capacity_error() {
    let (s_ids, s_snaps) = sender(200).await;
    let display = Arc::new(ChannelFrameDisplay::new());
    let tight = config().max_fragment_size(20).max_fragments(5);

    let store = DashMapStore::from_parts(s_ids, s_snaps);
    let sending = SyncService::new(Arc::new(store), tight).with_display(display.clone());
    let result = sending.start_clone().await;

    assert!(matches!(result, Err(SyncError::Capacity { limit: 5, .. })));
    assert_eq!(display.shown_count(), 0);
    assert!(!sending.is_busy());
}
