//! BlockTrace reference ledger.
//!
//! An in-memory implementation of the `LedgerService` protocol for local
//! development and end-to-end tests.

pub mod server;
pub mod store;

use blocktrace_proto::ledger_service_server::LedgerServiceServer;
use std::future::Future;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;

pub use server::LedgerImpl;
pub use store::{LedgerStore, StoreError, StoredStep};

/// Serve `ledger` on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    ledger: LedgerImpl,
    shutdown: F,
) -> Result<(), tonic::transport::Error>
where
    F: Future<Output = ()>,
{
    Server::builder()
        .add_service(LedgerServiceServer::new(ledger))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await
}
