//! Connector: owns the ledger session and dispatches typed calls
//!
//! States move `Disconnected -> Connecting -> Connected`, and back to
//! `Disconnected` when a handshake fails or a call reports a failure that
//! invalidates the session. A call made while disconnected triggers exactly
//! one inline connect attempt; the remote call body itself is never retried.

use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::endpoint::EndpointIdentity;
use crate::error::{ConnectError, TransportFailure};
use crate::model::{CallResult, NewStep, Step};
use crate::transport::{Dialer, LedgerTransport};

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Snapshot returned by [`Connector::status`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub state: ConnectionState,

    /// Present only while connected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<EndpointIdentity>,
}

#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Upper bound for dial, trust bootstrap and liveness probe together
    pub handshake_timeout: Duration,

    /// Upper bound for each remote call
    pub call_timeout: Duration,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            call_timeout: Duration::from_secs(30),
        }
    }
}

enum Session {
    Disconnected,
    Connected(Arc<dyn LedgerTransport>),
}

/// Marks a connect attempt as in flight for as long as it is alive.
///
/// Dropping it, including when the caller abandons the connect future,
/// clears the `Connecting` marker and counts the attempt as settled.
struct AttemptGuard<'a> {
    connecting: &'a AtomicBool,
    settled: &'a AtomicU64,
}

impl<'a> AttemptGuard<'a> {
    fn start(connecting: &'a AtomicBool, settled: &'a AtomicU64) -> Self {
        connecting.store(true, Ordering::Release);
        Self {
            connecting,
            settled,
        }
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        self.connecting.store(false, Ordering::Release);
        self.settled.fetch_add(1, Ordering::AcqRel);
    }
}

/// Outcome of the most recent connect attempt, shared with callers that
/// queued behind it.
#[derive(Default)]
struct ConnectGate {
    last_failure: Option<ConnectError>,
}

/// Explicitly owned handle to one ledger service.
///
/// Construct it, `connect()` (or let the first call do it), use it, then
/// `disconnect()`. Share it across tasks with an `Arc`.
pub struct Connector {
    endpoint: EndpointIdentity,
    dialer: Arc<dyn Dialer>,
    config: ConnectorConfig,
    session: RwLock<Session>,

    /// Single-flight guard: only the holder dials
    gate: Mutex<ConnectGate>,

    /// Number of connect attempts started so far
    attempts: AtomicU64,

    /// Number of connect attempts that have finished, successfully or not
    settled: AtomicU64,

    /// Set while a connect attempt is in flight
    connecting: AtomicBool,
}

impl Connector {
    pub fn new(endpoint: EndpointIdentity, dialer: Arc<dyn Dialer>, config: ConnectorConfig) -> Self {
        info!("Ledger connector initialized for {}", endpoint);

        Self {
            endpoint,
            dialer,
            config,
            session: RwLock::new(Session::Disconnected),
            gate: Mutex::new(ConnectGate::default()),
            attempts: AtomicU64::new(0),
            settled: AtomicU64::new(0),
            connecting: AtomicBool::new(false),
        }
    }

    pub fn endpoint(&self) -> &EndpointIdentity {
        &self.endpoint
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Number of connect attempts (dial + probe) performed so far
    pub fn connect_attempts(&self) -> u64 {
        self.attempts.load(Ordering::Acquire)
    }

    pub async fn state(&self) -> ConnectionState {
        match &*self.session.read().await {
            Session::Connected(_) => ConnectionState::Connected,
            Session::Disconnected if self.connecting.load(Ordering::Acquire) => {
                ConnectionState::Connecting
            }
            Session::Disconnected => ConnectionState::Disconnected,
        }
    }

    pub async fn status(&self) -> ConnectionStatus {
        let state = self.state().await;
        let connected = state == ConnectionState::Connected;

        ConnectionStatus {
            connected,
            state,
            endpoint: connected.then(|| self.endpoint.clone()),
        }
    }

    /// Establish a session. Returns `true` when connected (immediately if
    /// already connected) and `false` on any failure; never errors.
    pub async fn connect(&self) -> bool {
        self.establish().await.is_ok()
    }

    /// Drop the session; the next call reconnects
    pub async fn disconnect(&self) {
        *self.session.write().await = Session::Disconnected;
        info!("Disconnected from ledger {}", self.endpoint);
    }

    async fn current(&self) -> Option<Arc<dyn LedgerTransport>> {
        match &*self.session.read().await {
            Session::Connected(transport) => Some(transport.clone()),
            Session::Disconnected => None,
        }
    }

    /// Return the live transport, performing at most one connect attempt.
    ///
    /// Callers that arrive while another task is connecting wait for it and
    /// share its outcome instead of dialing again.
    async fn establish(&self) -> Result<Arc<dyn LedgerTransport>, ConnectError> {
        if let Some(transport) = self.current().await {
            return Ok(transport);
        }

        let seen = self.settled.load(Ordering::Acquire);
        let mut gate = self.gate.lock().await;

        if let Some(transport) = self.current().await {
            debug!("Reusing session opened by a concurrent caller");
            return Ok(transport);
        }
        if self.settled.load(Ordering::Acquire) != seen {
            if let Some(err) = &gate.last_failure {
                debug!("Sharing failure of a concurrent connect attempt");
                return Err(err.clone());
            }
        }

        self.attempts.fetch_add(1, Ordering::AcqRel);
        gate.last_failure = None;
        let _attempt = AttemptGuard::start(&self.connecting, &self.settled);
        info!("Connecting to ledger {}", self.endpoint);

        let outcome = timeout(self.config.handshake_timeout, self.handshake_and_probe()).await;

        let result = match outcome {
            Ok(Ok(transport)) => {
                *self.session.write().await = Session::Connected(transport.clone());
                info!("Connected to ledger {}", self.endpoint);
                return Ok(transport);
            }
            Ok(Err(failure)) => {
                warn!(
                    kind = %failure.kind,
                    "Ledger connection failed: {} ({})",
                    failure.kind.hint(),
                    failure.message
                );
                self.connection_error(failure)
            }
            Err(_) => {
                warn!(
                    "Ledger connection timed out after {:?}",
                    self.config.handshake_timeout
                );
                ConnectError::Timeout {
                    operation: "connect",
                    after: self.config.handshake_timeout,
                }
            }
        };

        gate.last_failure = Some(result.clone());
        Err(result)
    }

    /// Dial (including trust bootstrap) followed by exactly one liveness probe
    async fn handshake_and_probe(&self) -> Result<Arc<dyn LedgerTransport>, TransportFailure> {
        let transport = self.dialer.dial(&self.endpoint).await?;

        debug!("Probing ledger with describe_service");
        let info = transport.describe_service().await?;
        info!("Ledger probe succeeded: {}", info);

        Ok(transport)
    }

    fn connection_error(&self, failure: TransportFailure) -> ConnectError {
        ConnectError::Connection {
            host: self.endpoint.host.clone(),
            service_id: self.endpoint.service_id.clone(),
            kind: failure.kind,
            hint: failure.kind.hint(),
            detail: failure.message,
        }
    }

    /// Downgrade to `Disconnected`, unless another task already replaced the session
    async fn invalidate(&self, failed: &Arc<dyn LedgerTransport>) {
        let mut session = self.session.write().await;
        if let Session::Connected(current) = &*session {
            if Arc::as_ptr(current) as *const () == Arc::as_ptr(failed) as *const () {
                *session = Session::Disconnected;
                info!("Ledger session invalidated; next call reconnects");
            }
        }
    }

    /// Dispatch one typed remote call.
    ///
    /// Connects first when needed (one attempt). Failures of the call body
    /// surface as [`ConnectError::RemoteCall`] or [`ConnectError::Timeout`]
    /// and are not retried.
    pub async fn call<T, F, Fut>(&self, method: &'static str, op: F) -> Result<T, ConnectError>
    where
        F: FnOnce(Arc<dyn LedgerTransport>) -> Fut,
        Fut: Future<Output = Result<T, TransportFailure>>,
    {
        let transport = self.establish().await?;

        debug!(method, "Dispatching ledger call");

        match timeout(self.config.call_timeout, op(transport.clone())).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(failure)) => {
                warn!(method, kind = %failure.kind, "Ledger call failed: {}", failure.message);
                if failure.kind.drops_session() {
                    self.invalidate(&transport).await;
                }
                Err(ConnectError::RemoteCall {
                    method,
                    kind: failure.kind,
                    message: failure.message,
                })
            }
            Err(_) => {
                warn!(method, "Ledger call timed out after {:?}", self.config.call_timeout);
                self.invalidate(&transport).await;
                Err(ConnectError::Timeout {
                    operation: method,
                    after: self.config.call_timeout,
                })
            }
        }
    }

    pub async fn describe_service(&self) -> Result<String, ConnectError> {
        self.call("describe_service", |t| async move { t.describe_service().await })
            .await
    }

    /// Append a step. The caller's timestamp is dropped and notes normalized
    /// before anything is transmitted.
    pub async fn add_step(&self, step: NewStep) -> Result<CallResult<String>, ConnectError> {
        let event = step.into_event();
        self.call("append", move |t| async move { t.append(event).await })
            .await
    }

    pub async fn get_history(&self, product_id: &str) -> Result<Vec<Step>, ConnectError> {
        self.call("get_history", |t| async move { t.get_history(product_id).await })
            .await
    }

    pub async fn list_entities(&self) -> Result<Vec<String>, ConnectError> {
        self.call("list_entities", |t| async move { t.list_entities().await })
            .await
    }

    pub async fn get_total_event_count(&self) -> Result<u64, ConnectError> {
        self.call("get_total_event_count", |t| async move {
            t.get_total_event_count().await
        })
        .await
    }
}
