//! Aggregator: cross-entity provenance statistics
//!
//! A refresh reads the entity list and the total event count in parallel,
//! then fans out one history query per entity with bounded concurrency.
//! A failing history query is logged and skipped; only the two
//! foundational queries can fail the whole refresh.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::connector::Connector;
use crate::error::ConnectError;
use crate::model::{AggregateSummary, Step};

/// Default number of history queries in flight at once
pub const DEFAULT_FAN_OUT: usize = 8;

pub struct Aggregator {
    connector: Arc<Connector>,
    fan_out: usize,

    /// Last computed summary; concurrent refreshes are last-write-wins
    last: RwLock<Option<AggregateSummary>>,
}

impl Aggregator {
    pub fn new(connector: Arc<Connector>) -> Self {
        Self::with_fan_out(connector, DEFAULT_FAN_OUT)
    }

    /// `fan_out` is clamped to at least one query in flight
    pub fn with_fan_out(connector: Arc<Connector>, fan_out: usize) -> Self {
        Self {
            connector,
            fan_out: fan_out.max(1),
            last: RwLock::new(None),
        }
    }

    pub fn fan_out(&self) -> usize {
        self.fan_out
    }

    /// Snapshot of the most recent successful refresh
    pub async fn last_summary(&self) -> Option<AggregateSummary> {
        self.last.read().await.clone()
    }

    /// Recompute the summary from the live ledger
    pub async fn refresh(&self) -> Result<AggregateSummary, ConnectError> {
        let (entities, total) = tokio::join!(
            self.connector.list_entities(),
            self.connector.get_total_event_count()
        );

        let entities = entities.map_err(|e| ConnectError::aggregation("list_entities", e))?;
        let event_count =
            total.map_err(|e| ConnectError::aggregation("get_total_event_count", e))?;

        debug!(
            "Fanning out history queries for {} entities ({} in flight)",
            entities.len(),
            self.fan_out
        );

        let outcomes: Vec<(String, Result<u64, ConnectError>)> = stream::iter(entities.iter().cloned())
            .map(|product_id| async move {
                let verified = self
                    .connector
                    .get_history(&product_id)
                    .await
                    .map(|history| count_verified(&history));
                (product_id, verified)
            })
            .buffer_unordered(self.fan_out)
            .collect()
            .await;

        let mut verified_event_count = 0u64;
        let mut failed_entities = Vec::new();

        for (product_id, outcome) in outcomes {
            match outcome {
                Ok(verified) => verified_event_count += verified,
                Err(e) => {
                    warn!("Skipping history of {} in summary: {}", product_id, e);
                    failed_entities.push(product_id);
                }
            }
        }
        failed_entities.sort();

        let summary = AggregateSummary {
            entity_count: entities.len() as u64,
            event_count,
            verified_event_count,
            failed_entities,
        };

        if summary.is_partial() {
            warn!(
                "Summary is partial: {} of {} entities could not be read",
                summary.failed_entities.len(),
                summary.entity_count
            );
        } else {
            info!(
                "Summary refreshed: {} entities, {} events, {} verified",
                summary.entity_count, summary.event_count, summary.verified_event_count
            );
        }

        *self.last.write().await = Some(summary.clone());

        Ok(summary)
    }
}

/// Number of verified steps in one history
pub fn count_verified(history: &[Step]) -> u64 {
    history.iter().filter(|step| step.is_verified()).count() as u64
}
