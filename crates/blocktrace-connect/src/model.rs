//! Provenance data model shared by the connector and the aggregator

use blocktrace_proto as proto;
use serde::{Deserialize, Serialize};

/// Timestamp sent with every append; the ledger replaces it with its own clock.
pub const UNASSIGNED_TIMESTAMP: u64 = 0;

/// One immutable provenance event ("step") as stored by the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub product_id: String,
    pub actor_name: String,
    pub role: String,
    pub action: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Nanoseconds since the Unix epoch, assigned by the ledger
    pub timestamp: u64,
}

impl Step {
    /// A step is verified when it carries a note with visible text
    pub fn is_verified(&self) -> bool {
        is_verified_note(self.notes.as_deref())
    }
}

impl From<Step> for proto::Step {
    fn from(step: Step) -> Self {
        Self {
            product_id: step.product_id,
            actor_name: step.actor_name,
            role: step.role,
            action: step.action,
            location: step.location,
            notes: step.notes,
            timestamp: step.timestamp,
        }
    }
}

impl From<proto::Step> for Step {
    fn from(step: proto::Step) -> Self {
        Self {
            product_id: step.product_id,
            actor_name: step.actor_name,
            role: step.role,
            action: step.action,
            location: step.location,
            notes: step.notes,
            timestamp: step.timestamp,
        }
    }
}

/// Caller-side request to append a step.
///
/// `timestamp` exists so callers holding a full event can pass it through;
/// it is never transmitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStep {
    pub product_id: String,
    pub actor_name: String,
    pub role: String,
    pub action: String,
    pub location: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub timestamp: Option<u64>,
}

impl NewStep {
    pub fn new(
        product_id: impl Into<String>,
        actor_name: impl Into<String>,
        role: impl Into<String>,
        action: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            actor_name: actor_name.into(),
            role: role.into(),
            action: action.into(),
            location: location.into(),
            notes: None,
            timestamp: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Build the event to transmit: timestamp zeroed, notes normalized
    pub fn into_event(self) -> Step {
        Step {
            product_id: self.product_id,
            actor_name: self.actor_name,
            role: self.role,
            action: self.action,
            location: self.location,
            notes: normalize_notes(self.notes.as_deref()),
            timestamp: UNASSIGNED_TIMESTAMP,
        }
    }
}

/// Absent, empty and whitespace-only notes become `None`; anything else is trimmed.
pub fn normalize_notes(notes: Option<&str>) -> Option<String> {
    notes
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Blank notes count as unverified, same as a missing note
pub fn is_verified_note(notes: Option<&str>) -> bool {
    notes.is_some_and(|text| !text.trim().is_empty())
}

/// Outcome of a write that reached the ledger: accepted or rejected by its rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallResult<T> {
    Ok(T),
    Err(String),
}

impl<T> CallResult<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, CallResult::Ok(_))
    }

    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }

    pub fn into_result(self) -> Result<T, String> {
        match self {
            CallResult::Ok(value) => Ok(value),
            CallResult::Err(message) => Err(message),
        }
    }
}

impl From<proto::AppendStepResponse> for CallResult<String> {
    fn from(response: proto::AppendStepResponse) -> Self {
        use proto::append_step_response::Outcome;

        match response.outcome {
            Some(Outcome::Ok(message)) => CallResult::Ok(message),
            Some(Outcome::Err(message)) => CallResult::Err(message),
            None => CallResult::Err("ledger returned an empty append outcome".to_string()),
        }
    }
}

/// Cross-entity statistics derived from the ledger at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub entity_count: u64,
    pub event_count: u64,
    pub verified_event_count: u64,

    /// Entities whose history could not be read; their steps are not counted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_entities: Vec<String>,
}

impl AggregateSummary {
    /// True when at least one entity was skipped and the verified count may be low
    pub fn is_partial(&self) -> bool {
        !self.failed_entities.is_empty()
    }
}
