/// Generated gRPC protocol definitions for the BlockTrace ledger.
///
/// Shared by the client-side connector and the reference ledger service.
pub mod blocktrace {
    pub mod v1 {
        tonic::include_proto!("blocktrace.v1");
    }
}

/// Metadata key carrying the session id issued by `Handshake`.
pub const SESSION_HEADER: &str = "x-blocktrace-session";

// Re-export commonly used types for convenience
pub use blocktrace::v1::*;
