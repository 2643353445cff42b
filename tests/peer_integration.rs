//! Integration tests for peer sessions
//!
//! Two services share an in-memory rendezvous broker and run the clone and
//! bidirectional merge flows end-to-end.

use fintrack_sync::adapters::outbound::{DashMapIdentityStore, DashMapSnapshotStore, DashMapStore, MemoryRendezvous};
use fintrack_sync::{
    AccountRecord, CloneSession, FinanceSnapshot, HoldingRecord, IdentityStore, PeerSessionState, ReceiveInput,
    SnapshotStore, SyncAction, SyncConfig, SyncError, SyncService, TransactionRecord, TransportKind, UserIdentity,
};
use std::sync::Arc;
use std::time::Duration;

fn tx(id: &str, date: &str) -> TransactionRecord {
    TransactionRecord {
        id: id.into(),
        date: date.into(),
        description: format!("{} purchase", id),
        amount: -10.0,
        category: "Misc".into(),
        account_name: None,
    }
}

fn brokerage(holding_id: &str, quantity: f64, value: f64) -> AccountRecord {
    AccountRecord {
        id: "acc-brokerage".into(),
        name: "Brokerage".into(),
        category: "Investment".into(),
        institution: None,
        balance: value,
        holdings: Some(vec![HoldingRecord {
            id: holding_id.into(),
            name: "AAPL".into(),
            ticker: Some("AAPL".into()),
            quantity,
            price: 150.0,
            value,
            external_id: None,
        }]),
    }
}

struct Device {
    identities: DashMapIdentityStore,
    snapshots: DashMapSnapshotStore,
    service: SyncService,
}

async fn device(broker: &Arc<MemoryRendezvous>, snapshot: Option<FinanceSnapshot>) -> Device {
    let identities = DashMapIdentityStore::new();
    let snapshots = DashMapSnapshotStore::new();
    if let Some(snapshot) = snapshot {
        identities.save_identity(&UserIdentity::new("user-7", "Grace")).await.unwrap();
        snapshots.save("user-7", &snapshot).await.unwrap();
    }
    let config = SyncConfig::new("https://fintrack.test")
        .transport(TransportKind::Duplex)
        .close_grace(Duration::from_millis(10));
    let service = SyncService::new(Arc::new(DashMapStore::from_parts(identities.clone(), snapshots.clone())), config)
        .with_broker(broker.clone());
    Device {
        identities,
        snapshots,
        service,
    }
}

/// Clone over the peer channel replaces the empty device's snapshot
#[tokio::test]
async fn test_peer_clone_flow() {
    let broker = Arc::new(MemoryRendezvous::new());
    let host = device(
        &broker,
        Some(FinanceSnapshot {
            transactions: vec![tx("t1", "2024-01-01"), tx("t2", "2024-01-02")],
            ..Default::default()
        }),
    )
    .await;
    let client = device(&broker, None).await;

    let CloneSession::Peer(hosted) = host.service.start_clone().await.unwrap() else {
        panic!("duplex transport configured");
    };
    assert_eq!(hosted.state(), PeerSessionState::Waiting);
    let link = hosted.link().to_string();
    assert!(link.starts_with("https://fintrack.test#/sync/"));

    let host_task = tokio::spawn(hosted.finish());
    let report = client.service.receive(ReceiveInput::Peer(&link)).await.unwrap();

    assert_eq!(report.action, SyncAction::Replaced);
    assert_eq!(host_task.await.unwrap().unwrap().action, SyncAction::Sent);
    assert_eq!(client.identities.current().await.unwrap().unwrap().id, "user-7");
    assert_eq!(
        client.snapshots.load("user-7").await.unwrap().unwrap().transactions,
        host.snapshots.load("user-7").await.unwrap().unwrap().transactions
    );
    assert_eq!(broker.pending_sessions(), 0);
}

/// Bidirectional merge: transactions union and holdings sum, both sides agree
#[tokio::test]
async fn test_peer_merge_flow() {
    let broker = Arc::new(MemoryRendezvous::new());
    let host = device(
        &broker,
        Some(FinanceSnapshot {
            transactions: vec![tx("t1", "2024-01-01"), tx("t2", "2024-01-02")],
            accounts: vec![brokerage("h-host", 1.0, 150.0)],
            ..Default::default()
        }),
    )
    .await;
    let client = device(
        &broker,
        Some(FinanceSnapshot {
            transactions: vec![tx("t2", "2024-01-02"), tx("t3", "2024-01-03")],
            accounts: vec![brokerage("h-client", 2.0, 300.0)],
            ..Default::default()
        }),
    )
    .await;
    client.identities.save_credential(Some("sk-client")).await.unwrap();

    let hosted = host.service.start_merge().await.unwrap();
    let session_id = hosted.link().session_id.to_string();
    let host_task = tokio::spawn(hosted.finish());

    let report = client.service.receive(ReceiveInput::PeerMerge(&session_id)).await.unwrap();
    let host_report = host_task.await.unwrap().unwrap();

    assert_eq!(report.action, SyncAction::Merged);
    assert_eq!(host_report.action, SyncAction::Merged);

    let host_final = host.snapshots.load("user-7").await.unwrap().unwrap();
    let client_final = client.snapshots.load("user-7").await.unwrap().unwrap();

    let ids: Vec<_> = host_final.transactions.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["t3", "t2", "t1"]);
    assert_eq!(host_final.transactions, client_final.transactions);

    let account = host_final.account("acc-brokerage").unwrap();
    let holdings = account.holdings.as_ref().unwrap();
    assert_eq!(holdings.len(), 1);
    assert_eq!(holdings[0].quantity, 3.0);
    assert_eq!(holdings[0].value, 450.0);
    assert_eq!(account.balance, 450.0);
    assert_eq!(client_final.accounts, host_final.accounts);

    assert_eq!(host.identities.credential().await.unwrap().as_deref(), Some("sk-client"));
    assert_eq!(client.identities.credential().await.unwrap().as_deref(), Some("sk-client"));
}

/// Joining a session nobody registered fails with a retryable error
#[tokio::test]
async fn test_join_unknown_session() {
    let broker = Arc::new(MemoryRendezvous::new());
    let client = device(&broker, None).await;

    let err = client
        .service
        .receive(ReceiveInput::Peer("https://fintrack.test#/sync/nobody-home"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Connection(_)));
    assert!(err.is_retryable());
    assert!(client.snapshots.is_empty());
}

/// Cancelling a waiting host tears down the registration
#[tokio::test]
async fn test_cancel_waiting_host() {
    let broker = Arc::new(MemoryRendezvous::new());
    let host = device(&broker, Some(FinanceSnapshot::new())).await;

    let hosted = host.service.start_merge().await.unwrap();
    let cancel = hosted.cancel_handle();
    let mut states = hosted.subscribe();
    let task = tokio::spawn(hosted.finish());

    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    assert_eq!(task.await.unwrap().unwrap_err(), SyncError::Cancelled);
    assert_eq!(*states.borrow_and_update(), PeerSessionState::Idle);
    assert_eq!(broker.pending_sessions(), 0);
    assert!(!host.service.is_busy());
}

/// Several host/client pairs on one broker never see each other's data
#[tokio::test]
async fn test_concurrent_sessions_are_isolated() {
    let broker = Arc::new(MemoryRendezvous::new());

    let pairs = (0..4).map(|i| {
        let broker = broker.clone();
        async move {
            let marker = format!("pair-{}", i);
            let host = device(
                &broker,
                Some(FinanceSnapshot {
                    transactions: vec![tx(&marker, "2024-03-01")],
                    ..Default::default()
                }),
            )
            .await;
            let client = device(&broker, None).await;

            let CloneSession::Peer(hosted) = host.service.start_clone().await.unwrap() else {
                panic!("duplex transport configured");
            };
            let link = hosted.link().to_string();
            let host_task = tokio::spawn(hosted.finish());

            client.service.receive(ReceiveInput::Peer(&link)).await.unwrap();
            host_task.await.unwrap().unwrap();

            let received = client.snapshots.load("user-7").await.unwrap().unwrap();
            (marker, received.transactions[0].id.clone())
        }
    });

    for (expected, got) in futures::future::join_all(pairs).await {
        assert_eq!(expected, got);
    }
    assert_eq!(broker.pending_sessions(), 0);
}
