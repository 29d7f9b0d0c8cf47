//! LedgerClient: the typed surface handed to presentation code

use std::sync::Arc;
use std::time::Duration;

use crate::aggregator::{Aggregator, DEFAULT_FAN_OUT};
use crate::connector::{ConnectionStatus, Connector, ConnectorConfig};
use crate::endpoint::EndpointIdentity;
use crate::error::ConnectError;
use crate::grpc::{parse_host, GrpcDialer};
use crate::model::{AggregateSummary, CallResult, NewStep, Step};
use crate::transport::Dialer;

/// Tunables for a [`LedgerClient`]
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub handshake_timeout: Duration,
    pub call_timeout: Duration,
    pub fan_out: usize,
    pub pinned_root_key: Option<Vec<u8>>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        let connector = ConnectorConfig::default();
        Self {
            handshake_timeout: connector.handshake_timeout,
            call_timeout: connector.call_timeout,
            fan_out: DEFAULT_FAN_OUT,
            pinned_root_key: None,
        }
    }
}

/// One connector plus the aggregator built on it.
///
/// # Example
///
/// ```rust,no_run
/// use blocktrace_connect::{ClientOptions, EndpointIdentity, EndpointOverrides, LedgerClient, NewStep};
///
/// # async fn example() -> Result<(), blocktrace_connect::ConnectError> {
/// let endpoint = EndpointIdentity::resolve(&EndpointOverrides::default());
/// let client = LedgerClient::grpc(endpoint, ClientOptions::default())?;
///
/// let step = NewStep::new("P1", "Alice", "Manufacturer", "Manufactured", "Plant A")
///     .with_notes("batch 7");
/// client.add_step(step).await?;
///
/// let summary = client.refresh_summary().await?;
/// println!("{} verified events", summary.verified_event_count);
/// # Ok(())
/// # }
/// ```
pub struct LedgerClient {
    connector: Arc<Connector>,
    aggregator: Aggregator,
}

impl LedgerClient {
    pub fn new(connector: Arc<Connector>, fan_out: usize) -> Self {
        let aggregator = Aggregator::with_fan_out(connector.clone(), fan_out);
        Self {
            connector,
            aggregator,
        }
    }

    /// Build a client over any dialer
    pub fn with_dialer(
        endpoint: EndpointIdentity,
        dialer: Arc<dyn Dialer>,
        options: ClientOptions,
    ) -> Self {
        let config = ConnectorConfig {
            handshake_timeout: options.handshake_timeout,
            call_timeout: options.call_timeout,
        };
        let connector = Arc::new(Connector::new(endpoint, dialer, config));
        Self::new(connector, options.fan_out)
    }

    /// Build a client that talks gRPC to the ledger.
    ///
    /// Fails with [`ConnectError::InvalidEndpoint`] when the host is not an
    /// `http://` or `https://` URL; nothing is dialed until first use.
    pub fn grpc(endpoint: EndpointIdentity, options: ClientOptions) -> Result<Self, ConnectError> {
        parse_host(&endpoint.host)?;

        let mut dialer = GrpcDialer::new();
        if let Some(key) = options.pinned_root_key.clone() {
            dialer = dialer.with_pinned_root_key(key);
        }
        Ok(Self::with_dialer(endpoint, Arc::new(dialer), options))
    }

    pub fn connector(&self) -> &Arc<Connector> {
        &self.connector
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub async fn connect(&self) -> bool {
        self.connector.connect().await
    }

    pub async fn status(&self) -> ConnectionStatus {
        self.connector.status().await
    }

    pub async fn disconnect(&self) {
        self.connector.disconnect().await
    }

    pub async fn describe_service(&self) -> Result<String, ConnectError> {
        self.connector.describe_service().await
    }

    pub async fn add_step(&self, step: NewStep) -> Result<CallResult<String>, ConnectError> {
        self.connector.add_step(step).await
    }

    pub async fn get_all_entities(&self) -> Result<Vec<String>, ConnectError> {
        self.connector.list_entities().await
    }

    pub async fn get_history(&self, product_id: &str) -> Result<Vec<Step>, ConnectError> {
        self.connector.get_history(product_id).await
    }

    pub async fn get_total_event_count(&self) -> Result<u64, ConnectError> {
        self.connector.get_total_event_count().await
    }

    /// Recompute the summary. A partial result is still `Ok`; check
    /// [`AggregateSummary::is_partial`].
    pub async fn refresh_summary(&self) -> Result<AggregateSummary, ConnectError> {
        self.aggregator.refresh().await
    }

    pub async fn last_summary(&self) -> Option<AggregateSummary> {
        self.aggregator.last_summary().await
    }
}
