//! BlockTrace Connect: client-side access to the provenance ledger
//!
//! # Architecture
//!
//! - **Connector**: owns the session with one ledger service (endpoint
//!   resolution, trust bootstrap, liveness probe, typed calls, lazy reconnect)
//! - **Aggregator**: derives cross-entity statistics by fanning out
//!   per-entity history queries and tolerating individual failures
//! - **LedgerClient**: the two above behind one typed surface
//!
//! Transports plug in through the [`Dialer`] and [`LedgerTransport`] traits;
//! [`GrpcDialer`] is the production implementation.

pub mod aggregator;
pub mod client;
pub mod connector;
pub mod endpoint;
pub mod error;
pub mod grpc;
pub mod model;
pub mod transport;

pub use aggregator::{count_verified, Aggregator, DEFAULT_FAN_OUT};
pub use client::{ClientOptions, LedgerClient};
pub use connector::{ConnectionState, ConnectionStatus, Connector, ConnectorConfig};
pub use endpoint::{EndpointIdentity, EndpointOverrides};
pub use error::{ConnectError, FailureKind, TransportFailure};
pub use grpc::{parse_host, GrpcDialer, GrpcTransport};
pub use model::{
    is_verified_note, normalize_notes, AggregateSummary, CallResult, NewStep, Step,
    UNASSIGNED_TIMESTAMP,
};
pub use transport::{Dialer, LedgerTransport};
