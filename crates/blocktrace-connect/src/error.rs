//! Error types for the blocktrace-connect crate

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Known failure categories reported by the ledger transport.
///
/// Classification happens once, where the failure is produced, so callers
/// match on a variant instead of searching message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The service identifier is unknown to the ledger host
    ServiceNotFound,
    /// The ledger host could not be reached
    NetworkUnreachable,
    /// Handshake rejected, root key missing or mismatched, or session expired
    TrustBootstrap,
    /// The transport gave up waiting for an answer
    Timeout,
    /// Anything the transport did not recognise
    Unclassified,
}

impl FailureKind {
    /// Operator-facing remediation hint for this category
    pub fn hint(&self) -> &'static str {
        match self {
            FailureKind::ServiceNotFound => {
                "ledger service not found; it may not be deployed yet"
            }
            FailureKind::NetworkUnreachable => {
                "ledger host unreachable; make sure the ledger service is running"
            }
            FailureKind::TrustBootstrap => {
                "trust bootstrap failed; restart the ledger service with a clean state"
            }
            FailureKind::Timeout => "ledger service did not answer in time",
            FailureKind::Unclassified => "unexpected ledger failure",
        }
    }

    /// Whether a call failing this way invalidates the current session
    pub fn drops_session(&self) -> bool {
        matches!(
            self,
            FailureKind::NetworkUnreachable | FailureKind::TrustBootstrap | FailureKind::Timeout
        )
    }

    /// Map a gRPC status code onto a failure category
    pub fn from_code(code: tonic::Code) -> Self {
        match code {
            tonic::Code::NotFound => FailureKind::ServiceNotFound,
            tonic::Code::Unavailable => FailureKind::NetworkUnreachable,
            tonic::Code::Unauthenticated | tonic::Code::PermissionDenied => {
                FailureKind::TrustBootstrap
            }
            tonic::Code::DeadlineExceeded => FailureKind::Timeout,
            _ => FailureKind::Unclassified,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::ServiceNotFound => write!(f, "service-not-found"),
            FailureKind::NetworkUnreachable => write!(f, "network-unreachable"),
            FailureKind::TrustBootstrap => write!(f, "trust-bootstrap"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Unclassified => write!(f, "unclassified"),
        }
    }
}

/// A classified failure produced by a transport implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct TransportFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TransportFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<tonic::Status> for TransportFailure {
    fn from(status: tonic::Status) -> Self {
        Self::new(FailureKind::from_code(status.code()), status.message())
    }
}

impl From<tonic::transport::Error> for TransportFailure {
    fn from(err: tonic::transport::Error) -> Self {
        Self::new(FailureKind::NetworkUnreachable, err.to_string())
    }
}

#[derive(Error, Debug, Clone)]
pub enum ConnectError {
    /// Handshake or liveness probe failed, or the implicit reconnect did
    #[error("Failed to connect to ledger service {service_id} at {host}: {hint} ({kind}: {detail})")]
    Connection {
        host: String,
        service_id: String,
        kind: FailureKind,
        hint: &'static str,
        detail: String,
    },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The service answered but the call itself failed
    #[error("Remote call {method} failed ({kind}): {message}")]
    RemoteCall {
        method: &'static str,
        kind: FailureKind,
        message: String,
    },

    /// One of the foundational aggregation queries failed
    #[error("Aggregation failed during {query}: {source}")]
    Aggregation {
        query: &'static str,
        #[source]
        source: Box<ConnectError>,
    },

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl ConnectError {
    /// Failure category behind this error, when there is one
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            ConnectError::Connection { kind, .. } | ConnectError::RemoteCall { kind, .. } => {
                Some(*kind)
            }
            ConnectError::Timeout { .. } => Some(FailureKind::Timeout),
            ConnectError::Aggregation { source, .. } => source.kind(),
            ConnectError::InvalidEndpoint(_) => None,
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, ConnectError::Connection { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ConnectError::Timeout { .. })
    }

    pub(crate) fn aggregation(query: &'static str, source: ConnectError) -> Self {
        ConnectError::Aggregation {
            query,
            source: Box::new(source),
        }
    }
}
