//! End-to-end tests: the gRPC client against the reference ledger over a real socket

use blocktrace::connect::{
    CallResult, ClientOptions, ConnectError, EndpointIdentity, FailureKind, LedgerClient, NewStep,
};
use blocktrace::{build_client, BlockTraceError, ClientConfig};
use blocktrace_ledger::{serve, LedgerImpl, LedgerStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

const SERVICE_ID: &str = "e2e-ledger";

struct Ledger {
    host: String,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Drop for Ledger {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn start(ledger: LedgerImpl) -> Ledger {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        serve(listener, ledger, async {
            let _ = rx.await;
        })
        .await
        .unwrap();
    });

    Ledger {
        host: format!("http://{}", addr),
        shutdown: Some(tx),
    }
}

async fn start_default() -> Ledger {
    start(LedgerImpl::new(
        Arc::new(LedgerStore::new()),
        SERVICE_ID.to_string(),
    ))
    .await
}

fn options() -> ClientOptions {
    ClientOptions {
        handshake_timeout: Duration::from_secs(5),
        call_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

fn client_for(host: &str, service_id: &str) -> LedgerClient {
    LedgerClient::grpc(EndpointIdentity::new(host, service_id), options()).unwrap()
}

#[tokio::test]
async fn test_record_and_summarize_a_product() {
    let ledger = start_default().await;
    let client = client_for(&ledger.host, SERVICE_ID);

    assert!(client.connect().await);
    let status = client.status().await;
    assert!(status.connected);
    assert_eq!(status.endpoint.unwrap().service_id, SERVICE_ID);

    let step = NewStep::new("P1", "Alice", "Manufacturer", "Manufactured", "Plant A")
        .with_notes("batch 7");
    let result = client.add_step(step).await.unwrap();
    assert!(result.is_ok(), "unexpected rejection: {:?}", result);

    let history = client.get_history("P1").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_ne!(history[0].timestamp, 0);
    assert_eq!(history[0].actor_name, "Alice");
    assert_eq!(history[0].notes.as_deref(), Some("batch 7"));
    assert!(history[0].is_verified());

    assert_eq!(client.get_all_entities().await.unwrap(), vec!["P1"]);
    assert_eq!(client.get_total_event_count().await.unwrap(), 1);

    let summary = client.refresh_summary().await.unwrap();
    assert!(summary.entity_count >= 1);
    assert!(summary.event_count >= 1);
    assert!(summary.verified_event_count >= 1);
    assert!(!summary.is_partial());
    assert_eq!(client.last_summary().await, Some(summary));

    let info = client.describe_service().await.unwrap();
    assert!(info.contains("Products: 1"));
}

#[tokio::test]
async fn test_blank_note_is_stored_unverified() {
    let ledger = start_default().await;
    let client = client_for(&ledger.host, SERVICE_ID);

    let step =
        NewStep::new("P2", "Bob", "Shipper", "Shipped", "Dock 4").with_notes("   ");
    assert!(client.add_step(step).await.unwrap().is_ok());
    let plain = NewStep::new("P2", "Carol", "Retailer", "Received", "Store 9");
    assert!(client.add_step(plain).await.unwrap().is_ok());

    let history = client.get_history("P2").await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|step| step.notes.is_none()));
    assert!(history[0].timestamp < history[1].timestamp);

    let summary = client.refresh_summary().await.unwrap();
    assert_eq!(summary.event_count, 2);
    assert_eq!(summary.verified_event_count, 0);
}

#[tokio::test]
async fn test_empty_field_is_a_business_rejection() {
    let ledger = start_default().await;
    let client = client_for(&ledger.host, SERVICE_ID);

    let step = NewStep::new("P1", "", "Manufacturer", "Manufactured", "Plant A");
    match client.add_step(step).await.unwrap() {
        CallResult::Err(message) => assert!(message.contains("Actor name")),
        CallResult::Ok(message) => panic!("expected rejection, got {}", message),
    }

    assert!(client.status().await.connected);
    assert_eq!(client.get_total_event_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_unknown_service_id_is_service_not_found() {
    let ledger = start_default().await;
    let client = client_for(&ledger.host, "not-deployed");

    assert!(!client.connect().await);
    let err = client.get_all_entities().await.unwrap_err();
    match err {
        ConnectError::Connection {
            kind, service_id, ..
        } => {
            assert_eq!(kind, FailureKind::ServiceNotFound);
            assert_eq!(service_id, "not-deployed");
        }
        other => panic!("expected connection error, got {:?}", other),
    }
    assert!(!client.status().await.connected);
}

#[tokio::test]
async fn test_unreachable_host_is_network_unreachable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(&format!("http://{}", addr), SERVICE_ID);
    let err = client.refresh_summary().await.unwrap_err();

    assert_eq!(err.kind(), Some(FailureKind::NetworkUnreachable));
    assert!(client.last_summary().await.is_none());
}

#[tokio::test]
async fn test_pinned_root_key_must_match() {
    let root_key = vec![7u8; 32];
    let ledger = start(LedgerImpl::with_root_key(
        Arc::new(LedgerStore::new()),
        SERVICE_ID.to_string(),
        root_key.clone(),
    ))
    .await;

    let trusting = LedgerClient::grpc(
        EndpointIdentity::new(&ledger.host, SERVICE_ID),
        ClientOptions {
            pinned_root_key: Some(root_key),
            ..options()
        },
    )
    .unwrap();
    assert!(trusting.connect().await);

    let suspicious = LedgerClient::grpc(
        EndpointIdentity::new(&ledger.host, SERVICE_ID),
        ClientOptions {
            pinned_root_key: Some(vec![9u8; 32]),
            ..options()
        },
    )
    .unwrap();
    let err = suspicious.describe_service().await.unwrap_err();
    assert!(err.is_connection());
    assert_eq!(err.kind(), Some(FailureKind::TrustBootstrap));
}

#[tokio::test]
async fn test_client_from_config_overrides() {
    let ledger = start_default().await;
    let config = ClientConfig {
        host: Some(ledger.host.clone()),
        service_id: Some(SERVICE_ID.to_string()),
        ..Default::default()
    };

    let (endpoint, client) = build_client(&config).unwrap();
    assert_eq!(endpoint.host, ledger.host);
    assert!(client.connect().await);

    client.disconnect().await;
    assert!(!client.status().await.connected);
    assert_eq!(client.get_total_event_count().await.unwrap(), 0);
    assert!(client.status().await.connected);
}

#[test]
fn test_malformed_host_is_a_configuration_error() {
    for host in ["not a uri", "127.0.0.1:8081"] {
        let config = ClientConfig {
            host: Some(host.to_string()),
            service_id: Some(SERVICE_ID.to_string()),
            ..Default::default()
        };

        match build_client(&config) {
            Err(BlockTraceError::Config(message)) => assert!(message.contains(host)),
            Err(other) => panic!("expected configuration error for {host}, got {other}"),
            Ok(_) => panic!("expected configuration error for {host}"),
        }
    }

    let err = LedgerClient::grpc(EndpointIdentity::new("not a uri", SERVICE_ID), options())
        .err()
        .unwrap();
    assert!(matches!(err, ConnectError::InvalidEndpoint(_)));
}
