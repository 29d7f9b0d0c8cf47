//! Transport seam between the connector and a concrete ledger client

use crate::endpoint::EndpointIdentity;
use crate::error::TransportFailure;
use crate::model::{CallResult, Step};
use async_trait::async_trait;
use std::sync::Arc;

/// The typed call surface of an open ledger session.
///
/// Implementations report every failure as a classified
/// [`TransportFailure`]; they never retry on their own.
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    /// Cheap read describing the service, used as the liveness probe
    async fn describe_service(&self) -> Result<String, TransportFailure>;

    /// Append one event. `Err` inside the result is a business rejection.
    async fn append(&self, step: Step) -> Result<CallResult<String>, TransportFailure>;

    /// History of one entity; empty for unknown identifiers
    async fn get_history(&self, product_id: &str) -> Result<Vec<Step>, TransportFailure>;

    async fn list_entities(&self) -> Result<Vec<String>, TransportFailure>;

    async fn get_total_event_count(&self) -> Result<u64, TransportFailure>;
}

/// Opens sessions. `dial` creates the transport handle and completes the
/// trust bootstrap; it issues no data calls.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(
        &self,
        endpoint: &EndpointIdentity,
    ) -> Result<Arc<dyn LedgerTransport>, TransportFailure>;
}
