//! Endpoint identity resolution for the ledger service

use serde::{Deserialize, Serialize};
use std::fmt;

/// Environment variable consulted first for the service identifier
pub const SERVICE_ID_ENV_PRIMARY: &str = "CANISTER_ID_BLOCKTRACE_BACKEND";

/// Environment variable consulted second for the service identifier
pub const SERVICE_ID_ENV_SECONDARY: &str = "CANISTER_ID";

/// Environment variable consulted for the ledger host
pub const HOST_ENV: &str = "BLOCKTRACE_LEDGER_HOST";

/// Service identifier of the default local deployment
pub const FALLBACK_SERVICE_ID: &str = "uxrrr-q7777-77774-qaaaq-cai";

/// Ledger host of the default local deployment
pub const FALLBACK_HOST: &str = "http://127.0.0.1:8081";

/// Explicit values that take precedence over the environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointOverrides {
    pub host: Option<String>,
    pub service_id: Option<String>,
}

/// Where the ledger lives. Resolved once and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointIdentity {
    /// Network address of the ledger host (e.g. "http://127.0.0.1:8081")
    pub host: String,

    /// Identifier of the ledger service on that host
    pub service_id: String,
}

impl EndpointIdentity {
    pub fn new(host: impl Into<String>, service_id: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            service_id: service_id.into(),
        }
    }

    /// Resolve against the process environment
    pub fn resolve(overrides: &EndpointOverrides) -> Self {
        Self::resolve_with(overrides, |name| std::env::var(name).ok())
    }

    /// Resolve with a custom environment lookup.
    ///
    /// Precedence per field: override, then environment, then the
    /// hardcoded fallback. The service identifier checks
    /// [`SERVICE_ID_ENV_PRIMARY`] before [`SERVICE_ID_ENV_SECONDARY`].
    pub fn resolve_with<F>(overrides: &EndpointOverrides, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let primary = lookup(SERVICE_ID_ENV_PRIMARY);
        let secondary = lookup(SERVICE_ID_ENV_SECONDARY);
        let service_id = resolve_first(
            [
                overrides.service_id.as_deref(),
                primary.as_deref(),
                secondary.as_deref(),
            ],
            FALLBACK_SERVICE_ID,
        );

        let host_env = lookup(HOST_ENV);
        let host = resolve_first(
            [overrides.host.as_deref(), host_env.as_deref()],
            FALLBACK_HOST,
        );

        Self { host, service_id }
    }
}

impl fmt::Display for EndpointIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.service_id, self.host)
    }
}

/// First candidate that is non-empty after trimming, trimmed; else `fallback`.
pub fn resolve_first<'a, I>(candidates: I, fallback: &str) -> String
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|candidate| !candidate.is_empty())
        .unwrap_or(fallback)
        .to_string()
}
