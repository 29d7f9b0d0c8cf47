/*!
 * Error types for the BlockTrace client
 */

use blocktrace_connect::{ConnectError, FailureKind};
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BlockTraceError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Error, Debug)]
pub enum BlockTraceError {
    /// Configuration file or flag problem
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection, timeout, remote call or aggregation failure
    #[error(transparent)]
    Ledger(#[from] ConnectError),

    /// The ledger reached a verdict and refused the write
    #[error("Ledger rejected the step: {0}")]
    Rejected(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl BlockTraceError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            BlockTraceError::Rejected(_) => EXIT_PARTIAL,
            _ => EXIT_FATAL,
        }
    }

    /// Operator guidance for ledger failures
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            BlockTraceError::Ledger(err) => err.kind().map(|kind| match kind {
                FailureKind::ServiceNotFound => {
                    "Deploy the ledger service or check the configured service id"
                }
                FailureKind::NetworkUnreachable => {
                    "Start the ledger (blocktrace-ledger) or check the configured host"
                }
                FailureKind::TrustBootstrap => {
                    "Restart the ledger with a clean state or update trusted_root_key"
                }
                FailureKind::Timeout => "Retry, or raise handshake_timeout_ms / call_timeout_ms",
                FailureKind::Unclassified => "Re-run with --verbose for details",
            }),
            BlockTraceError::Config(_) => {
                Some("Check the config file and the --host / --service-id flags")
            }
            _ => None,
        }
    }
}
