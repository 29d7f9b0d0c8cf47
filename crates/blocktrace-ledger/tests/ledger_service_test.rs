//! Integration tests for the ledger gRPC service over a real socket

use blocktrace_ledger::{serve, LedgerImpl, LedgerStore};
use blocktrace_proto::{
    append_step_response::Outcome, ledger_service_client::LedgerServiceClient,
    AppendStepRequest, DescribeServiceRequest, GetHistoryRequest, GetTotalEventCountRequest,
    HandshakeRequest, ListEntitiesRequest, Step, SESSION_HEADER,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tonic::transport::Channel;

const SERVICE_ID: &str = "test-ledger";

struct Running {
    client: LedgerServiceClient<Channel>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Drop for Running {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn start() -> Running {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let ledger = LedgerImpl::new(Arc::new(LedgerStore::new()), SERVICE_ID.to_string());
    let (tx, rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        serve(listener, ledger, async {
            let _ = rx.await;
        })
        .await
        .unwrap();
    });

    let client = LedgerServiceClient::connect(format!("http://{}", addr))
        .await
        .unwrap();

    Running {
        client,
        shutdown: Some(tx),
    }
}

fn with_session<T>(session: &str, message: T) -> tonic::Request<T> {
    let mut req = tonic::Request::new(message);
    req.metadata_mut()
        .insert(SESSION_HEADER, session.parse().unwrap());
    req
}

async fn open_session(client: &mut LedgerServiceClient<Channel>) -> String {
    let response = client
        .handshake(HandshakeRequest {
            service_id: SERVICE_ID.to_string(),
            client_version: "test".to_string(),
        })
        .await
        .unwrap()
        .into_inner();
    assert!(response.accepted);
    assert_eq!(response.root_key.len(), 32);
    response.session_id
}

fn step(product_id: &str, notes: Option<&str>, timestamp: u64) -> Step {
    Step {
        product_id: product_id.to_string(),
        actor_name: "Alice".to_string(),
        role: "Manufacturer".to_string(),
        action: "Manufactured".to_string(),
        location: "Plant A".to_string(),
        notes: notes.map(str::to_string),
        timestamp,
    }
}

#[tokio::test]
async fn test_handshake_for_unknown_service_is_not_found() {
    let mut ledger = start().await;

    let status = ledger
        .client
        .handshake(HandshakeRequest {
            service_id: "other-service".to_string(),
            client_version: "test".to_string(),
        })
        .await
        .unwrap_err();

    assert_eq!(status.code(), tonic::Code::NotFound);
    assert!(status.message().contains("canister_not_found"));
}

#[tokio::test]
async fn test_data_calls_require_session() {
    let mut ledger = start().await;

    let status = ledger
        .client
        .list_entities(ListEntitiesRequest {})
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::Unauthenticated);

    let status = ledger
        .client
        .list_entities(with_session("forged", ListEntitiesRequest {}))
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::Unauthenticated);
}

#[tokio::test]
async fn test_append_and_query_round_trip() {
    let mut ledger = start().await;
    let session = open_session(&mut ledger.client).await;

    let response = ledger
        .client
        .append_step(with_session(
            &session,
            AppendStepRequest {
                step: Some(step("P1", Some("batch 7"), 123)),
            },
        ))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(
        response.outcome,
        Some(Outcome::Ok("Step added successfully for product P1".to_string()))
    );

    let history = ledger
        .client
        .get_history(with_session(
            &session,
            GetHistoryRequest {
                product_id: "P1".to_string(),
            },
        ))
        .await
        .unwrap()
        .into_inner()
        .steps;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].notes.as_deref(), Some("batch 7"));
    assert_ne!(history[0].timestamp, 123);
    assert_ne!(history[0].timestamp, 0);

    let count = ledger
        .client
        .get_total_event_count(with_session(&session, GetTotalEventCountRequest {}))
        .await
        .unwrap()
        .into_inner()
        .count;
    assert_eq!(count, 1);

    let info = ledger
        .client
        .describe_service(with_session(&session, DescribeServiceRequest {}))
        .await
        .unwrap()
        .into_inner()
        .info;
    assert_eq!(info, "BlockTrace Ledger - Products: 1, Total Steps: 1");
}

#[tokio::test]
async fn test_invalid_step_is_business_rejection() {
    let mut ledger = start().await;
    let session = open_session(&mut ledger.client).await;

    let mut invalid = step("P1", None, 0);
    invalid.actor_name = "   ".to_string();

    let response = ledger
        .client
        .append_step(with_session(
            &session,
            AppendStepRequest {
                step: Some(invalid),
            },
        ))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(
        response.outcome,
        Some(Outcome::Err("Actor name cannot be empty".to_string()))
    );

    let products = ledger
        .client
        .list_entities(with_session(&session, ListEntitiesRequest {}))
        .await
        .unwrap()
        .into_inner()
        .product_ids;
    assert!(products.is_empty());
}

#[tokio::test]
async fn test_unknown_product_history_is_empty() {
    let mut ledger = start().await;
    let session = open_session(&mut ledger.client).await;

    let history = ledger
        .client
        .get_history(with_session(
            &session,
            GetHistoryRequest {
                product_id: "never-seen".to_string(),
            },
        ))
        .await
        .unwrap()
        .into_inner()
        .steps;

    assert!(history.is_empty());
}
