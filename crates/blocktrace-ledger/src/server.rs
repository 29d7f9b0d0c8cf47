//! gRPC server implementation for the reference ledger.

use blocktrace_proto::ledger_service_server::LedgerService;
use blocktrace_proto::{
    append_step_response::Outcome, AppendStepRequest, AppendStepResponse,
    DescribeServiceRequest, DescribeServiceResponse, GetHistoryRequest, GetHistoryResponse,
    GetTotalEventCountRequest, GetTotalEventCountResponse, HandshakeRequest, HandshakeResponse,
    ListEntitiesRequest, ListEntitiesResponse, SESSION_HEADER,
};
use sha2::{Digest, Sha256};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::store::{LedgerStore, StoreError};

/// Sessions kept before the oldest is evicted
pub const DEFAULT_SESSION_LIMIT: usize = 1024;

/// Issued sessions, oldest first, bounded by `limit`
struct SessionTable {
    live: HashSet<String>,
    order: VecDeque<String>,
    limit: usize,
}

impl SessionTable {
    fn new(limit: usize) -> Self {
        Self {
            live: HashSet::new(),
            order: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    fn insert(&mut self, session_id: String) {
        while self.order.len() >= self.limit {
            if let Some(oldest) = self.order.pop_front() {
                self.live.remove(&oldest);
                debug!("Evicted session {}", oldest);
            }
        }
        self.live.insert(session_id.clone());
        self.order.push_back(session_id);
    }

    fn contains(&self, session_id: &str) -> bool {
        self.live.contains(session_id)
    }
}

/// Implementation of the LedgerService gRPC interface.
pub struct LedgerImpl {
    store: Arc<LedgerStore>,
    /// Identifier clients must present during handshake
    service_id: String,
    /// Root key handed out during trust bootstrap
    root_key: Vec<u8>,
    /// Sessions issued by successful handshakes
    sessions: Arc<RwLock<SessionTable>>,
    version: String,
}

impl LedgerImpl {
    /// Creates a ledger with a fresh root key for this instance.
    pub fn new(store: Arc<LedgerStore>, service_id: String) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(service_id.as_bytes());
        hasher.update(Uuid::new_v4().as_bytes());
        let root_key = hasher.finalize().to_vec();

        Self::with_root_key(store, service_id, root_key)
    }

    pub fn with_root_key(store: Arc<LedgerStore>, service_id: String, root_key: Vec<u8>) -> Self {
        Self {
            store,
            service_id,
            root_key,
            sessions: Arc::new(RwLock::new(SessionTable::new(DEFAULT_SESSION_LIMIT))),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Keep at most `limit` sessions; older ones must handshake again
    pub fn with_session_limit(mut self, limit: usize) -> Self {
        self.sessions = Arc::new(RwLock::new(SessionTable::new(limit)));
        self
    }

    pub fn root_key(&self) -> &[u8] {
        &self.root_key
    }

    pub fn store(&self) -> &Arc<LedgerStore> {
        &self.store
    }

    /// Validates the session ID from request metadata.
    ///
    /// Called by every method except Handshake.
    async fn validate_session<T>(&self, request: &Request<T>) -> Result<(), Status> {
        let provided = match request.metadata().get(SESSION_HEADER) {
            Some(value) => value
                .to_str()
                .map_err(|_| Status::invalid_argument("Invalid session header format"))?,
            None => {
                return Err(Status::unauthenticated(
                    "No session - call Handshake first",
                ))
            }
        };

        if self.sessions.read().await.contains(provided) {
            Ok(())
        } else {
            Err(Status::unauthenticated("Unknown or expired session"))
        }
    }
}

#[tonic::async_trait]
impl LedgerService for LedgerImpl {
    async fn handshake(
        &self,
        request: Request<HandshakeRequest>,
    ) -> Result<Response<HandshakeResponse>, Status> {
        let req = request.into_inner();

        info!(
            "Handshake request for service {} from client version {}",
            req.service_id, req.client_version
        );

        if req.service_id.trim() != self.service_id {
            warn!("Handshake for unknown service {}", req.service_id);
            return Err(Status::not_found(format!(
                "canister_not_found: {}",
                req.service_id
            )));
        }

        let session_id = Uuid::new_v4().to_string();
        self.sessions.write().await.insert(session_id.clone());

        info!("Handshake successful - session: {}", session_id);

        Ok(Response::new(HandshakeResponse {
            accepted: true,
            session_id,
            root_key: self.root_key.clone(),
            reason: format!("blocktrace-ledger {}", self.version),
        }))
    }

    async fn describe_service(
        &self,
        request: Request<DescribeServiceRequest>,
    ) -> Result<Response<DescribeServiceResponse>, Status> {
        self.validate_session(&request).await?;

        Ok(Response::new(DescribeServiceResponse {
            info: self.store.describe().await,
        }))
    }

    async fn append_step(
        &self,
        request: Request<AppendStepRequest>,
    ) -> Result<Response<AppendStepResponse>, Status> {
        self.validate_session(&request).await?;

        let step = request
            .into_inner()
            .step
            .ok_or_else(|| Status::invalid_argument("Missing step"))?;

        let outcome = match self.store.append(step.into()).await {
            Ok(product_id) => Outcome::Ok(format!(
                "Step added successfully for product {}",
                product_id
            )),
            Err(e @ StoreError::EmptyField(_)) => {
                debug!("Rejected step: {}", e);
                Outcome::Err(e.to_string())
            }
            Err(e) => return Err(Status::internal(e.to_string())),
        };

        Ok(Response::new(AppendStepResponse {
            outcome: Some(outcome),
        }))
    }

    async fn get_history(
        &self,
        request: Request<GetHistoryRequest>,
    ) -> Result<Response<GetHistoryResponse>, Status> {
        self.validate_session(&request).await?;

        let product_id = request.into_inner().product_id;
        let steps = self
            .store
            .history(&product_id)
            .await
            .into_iter()
            .map(Into::into)
            .collect();

        Ok(Response::new(GetHistoryResponse { steps }))
    }

    async fn list_entities(
        &self,
        request: Request<ListEntitiesRequest>,
    ) -> Result<Response<ListEntitiesResponse>, Status> {
        self.validate_session(&request).await?;

        Ok(Response::new(ListEntitiesResponse {
            product_ids: self.store.products().await,
        }))
    }

    async fn get_total_event_count(
        &self,
        request: Request<GetTotalEventCountRequest>,
    ) -> Result<Response<GetTotalEventCountResponse>, Status> {
        self.validate_session(&request).await?;

        Ok(Response::new(GetTotalEventCountResponse {
            count: self.store.total_steps().await,
        }))
    }
}
