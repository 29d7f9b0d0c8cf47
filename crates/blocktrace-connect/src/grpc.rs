//! gRPC implementation of the ledger transport

use async_trait::async_trait;
use blocktrace_proto::{
    ledger_service_client::LedgerServiceClient, AppendStepRequest, DescribeServiceRequest,
    GetHistoryRequest, GetTotalEventCountRequest, HandshakeRequest, ListEntitiesRequest,
    SESSION_HEADER,
};
use std::sync::Arc;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info, warn};

use crate::endpoint::EndpointIdentity;
use crate::error::{ConnectError, FailureKind, TransportFailure};
use crate::model::{CallResult, Step};
use crate::transport::{Dialer, LedgerTransport};

/// Parse a ledger host into a gRPC endpoint. Only `http://` and `https://`
/// URLs are accepted.
pub fn parse_host(host: &str) -> Result<Endpoint, ConnectError> {
    let endpoint = Endpoint::from_shared(host.to_string())
        .map_err(|e| ConnectError::InvalidEndpoint(format!("{}: {}", host, e)))?;

    match endpoint.uri().scheme_str() {
        Some("http") | Some("https") => Ok(endpoint),
        _ => Err(ConnectError::InvalidEndpoint(format!(
            "{}: expected an http:// or https:// URL",
            host
        ))),
    }
}

/// Dials the ledger over gRPC and performs the `Handshake` trust bootstrap.
#[derive(Debug, Clone, Default)]
pub struct GrpcDialer {
    /// Expected root key; when unset any non-empty key is trusted (local development)
    pinned_root_key: Option<Vec<u8>>,
}

impl GrpcDialer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept ledgers presenting exactly this root key
    pub fn with_pinned_root_key(mut self, root_key: Vec<u8>) -> Self {
        self.pinned_root_key = Some(root_key);
        self
    }

    /// Perform handshake and return (session id, root key)
    async fn handshake(
        &self,
        channel: &Channel,
        endpoint: &EndpointIdentity,
    ) -> Result<(String, Vec<u8>), TransportFailure> {
        let mut client = LedgerServiceClient::new(channel.clone());

        let request = HandshakeRequest {
            service_id: endpoint.service_id.clone(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        };

        debug!("Sending handshake to ledger {}", endpoint);

        let response = client.handshake(request).await?.into_inner();

        if !response.accepted {
            return Err(TransportFailure::new(
                FailureKind::TrustBootstrap,
                format!("handshake rejected: {}", response.reason),
            ));
        }

        if response.root_key.is_empty() {
            return Err(TransportFailure::new(
                FailureKind::TrustBootstrap,
                "ledger did not provide a root key",
            ));
        }

        if let Some(pinned) = &self.pinned_root_key {
            if *pinned != response.root_key {
                warn!(
                    "Root key mismatch: expected {}, got {}",
                    hex::encode(pinned),
                    hex::encode(&response.root_key)
                );
                return Err(TransportFailure::new(
                    FailureKind::TrustBootstrap,
                    "root key does not match the pinned key",
                ));
            }
        }

        info!(
            "Handshake successful with {} (session: {}, root key: {})",
            endpoint,
            response.session_id,
            hex::encode(&response.root_key)
        );

        Ok((response.session_id, response.root_key))
    }
}

#[async_trait]
impl Dialer for GrpcDialer {
    async fn dial(
        &self,
        endpoint: &EndpointIdentity,
    ) -> Result<Arc<dyn LedgerTransport>, TransportFailure> {
        let target = parse_host(&endpoint.host)
            .map_err(|e| TransportFailure::new(FailureKind::Unclassified, e.to_string()))?;

        debug!("Opening channel to {}", endpoint.host);
        let channel = target.connect().await?;

        let (session_id, root_key) = self.handshake(&channel, endpoint).await?;

        Ok(Arc::new(GrpcTransport::new(channel, session_id, root_key)))
    }
}

/// An open gRPC session with the ledger.
///
/// Cheap to clone; tonic's `Channel` is reference counted internally.
#[derive(Clone)]
pub struct GrpcTransport {
    client: LedgerServiceClient<Channel>,

    /// Session ID obtained from handshake, attached to every request
    session_id: String,

    root_key: Vec<u8>,
}

impl GrpcTransport {
    pub fn new(channel: Channel, session_id: String, root_key: Vec<u8>) -> Self {
        let client = LedgerServiceClient::new(channel);
        Self {
            client,
            session_id,
            root_key,
        }
    }

    pub fn root_key(&self) -> &[u8] {
        &self.root_key
    }

    /// Helper to attach session metadata to a request
    fn with_session<T>(&self, request: T) -> tonic::Request<T> {
        let mut req = tonic::Request::new(request);

        match self.session_id.parse() {
            Ok(value) => {
                req.metadata_mut().insert(SESSION_HEADER, value);
            }
            Err(e) => {
                warn!("Failed to parse session_id as metadata: {}", e);
            }
        }

        req
    }
}

#[async_trait]
impl LedgerTransport for GrpcTransport {
    async fn describe_service(&self) -> Result<String, TransportFailure> {
        let req = self.with_session(DescribeServiceRequest {});
        let response = self.client.clone().describe_service(req).await?;
        Ok(response.into_inner().info)
    }

    async fn append(&self, step: Step) -> Result<CallResult<String>, TransportFailure> {
        debug!("Appending step for product {}", step.product_id);

        let req = self.with_session(AppendStepRequest {
            step: Some(step.into()),
        });
        let response = self.client.clone().append_step(req).await?;

        Ok(response.into_inner().into())
    }

    async fn get_history(&self, product_id: &str) -> Result<Vec<Step>, TransportFailure> {
        let req = self.with_session(GetHistoryRequest {
            product_id: product_id.to_string(),
        });
        let response = self.client.clone().get_history(req).await?;

        let steps: Vec<Step> = response
            .into_inner()
            .steps
            .into_iter()
            .map(Step::from)
            .collect();

        debug!("Received {} steps for product {}", steps.len(), product_id);

        Ok(steps)
    }

    async fn list_entities(&self) -> Result<Vec<String>, TransportFailure> {
        let req = self.with_session(ListEntitiesRequest {});
        let response = self.client.clone().list_entities(req).await?;
        Ok(response.into_inner().product_ids)
    }

    async fn get_total_event_count(&self) -> Result<u64, TransportFailure> {
        let req = self.with_session(GetTotalEventCountRequest {});
        let response = self.client.clone().get_total_event_count(req).await?;
        Ok(response.into_inner().count)
    }
}
