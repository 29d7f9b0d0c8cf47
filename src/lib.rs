/*!
 * BlockTrace - product provenance on an append-only ledger
 *
 * The ledger connector and summary aggregation live in `blocktrace-connect`;
 * this crate adds configuration, logging and terminal output for the CLI.
 */

pub mod config;
pub mod error;
pub mod logging;
pub mod output;

pub use blocktrace_connect as connect;
pub use config::{ClientConfig, LogLevel};
pub use error::{BlockTraceError, Result, EXIT_FATAL, EXIT_PARTIAL, EXIT_SUCCESS};

use blocktrace_connect::{ConnectError, EndpointIdentity, LedgerClient};

/// Resolve the endpoint and build a gRPC ledger client from configuration.
///
/// A malformed host is reported as a configuration error before anything is dialed.
pub fn build_client(config: &ClientConfig) -> Result<(EndpointIdentity, LedgerClient)> {
    let endpoint = EndpointIdentity::resolve(&config.endpoint_overrides());
    let client = LedgerClient::grpc(endpoint.clone(), config.client_options()?).map_err(|e| {
        match e {
            ConnectError::InvalidEndpoint(detail) => {
                BlockTraceError::Config(format!("Invalid ledger host {}", detail))
            }
            other => other.into(),
        }
    })?;
    Ok((endpoint, client))
}
