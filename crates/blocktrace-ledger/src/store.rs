//! In-memory, append-only step store with JSON snapshots.

use blocktrace_proto as proto;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum StoreError {
    /// A required field was blank; the message is shown to callers verbatim
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),

    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// A step as persisted by the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredStep {
    pub product_id: String,
    pub actor_name: String,
    pub role: String,
    pub action: String,
    pub location: String,
    pub notes: Option<String>,
    pub timestamp: u64,
}

impl From<proto::Step> for StoredStep {
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

impl From<StoredStep> for proto::Step {
    fn from(step: StoredStep) -> Self {
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

#[derive(Default)]
struct Inner {
    history: HashMap<String, Vec<StoredStep>>,
    last_timestamp: u64,
}

/// Product histories keyed by product id.
///
/// Timestamps are assigned here and strictly increase, so history order
/// equals append order.
#[derive(Default)]
pub struct LedgerStore {
    inner: RwLock<Inner>,
}

fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append a step, returning the product id.
    ///
    /// The caller's timestamp is replaced and a blank note is stored as absent.
    pub async fn append(&self, step: StoredStep) -> Result<String, StoreError> {
        let required = [
            ("Product ID", &step.product_id),
            ("Actor name", &step.actor_name),
            ("Role", &step.role),
            ("Action", &step.action),
            ("Location", &step.location),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(StoreError::EmptyField(*field));
        }

        let mut step = step;
        if step.notes.as_deref().is_some_and(|n| n.trim().is_empty()) {
            step.notes = None;
        }

        let mut inner = self.inner.write().await;
        let timestamp = now_nanos().max(inner.last_timestamp.saturating_add(1));
        inner.last_timestamp = timestamp;
        step.timestamp = timestamp;

        debug!("Adding step: {:?}", step);

        let product_id = step.product_id.clone();
        inner
            .history
            .entry(product_id.clone())
            .or_default()
            .push(step);

        info!("Step added for product {}", product_id);
        Ok(product_id)
    }

    /// History of one product ordered by timestamp; empty when unknown
    pub async fn history(&self, product_id: &str) -> Vec<StoredStep> {
        let inner = self.inner.read().await;
        let mut history = inner.history.get(product_id).cloned().unwrap_or_default();
        history.sort_by_key(|step| step.timestamp);

        debug!("Retrieved {} steps for product {}", history.len(), product_id);
        history
    }

    pub async fn products(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        let mut products: Vec<String> = inner.history.keys().cloned().collect();
        products.sort();
        products
    }

    pub async fn total_steps(&self) -> u64 {
        let inner = self.inner.read().await;
        inner.history.values().map(|steps| steps.len() as u64).sum()
    }

    pub async fn describe(&self) -> String {
        let inner = self.inner.read().await;
        let products = inner.history.len();
        let steps: usize = inner.history.values().map(Vec::len).sum();
        format!("BlockTrace Ledger - Products: {}, Total Steps: {}", products, steps)
    }

    /// Write all histories to `path` as JSON
    pub async fn save_snapshot(&self, path: &Path) -> Result<(), StoreError> {
        let data: BTreeMap<String, Vec<StoredStep>> = {
            let inner = self.inner.read().await;
            inner
                .history
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };

        let json = serde_json::to_vec_pretty(&data)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, path).await?;

        info!("Saved snapshot of {} products to {}", data.len(), path.display());
        Ok(())
    }

    /// Replace the store contents with a snapshot written by [`save_snapshot`](Self::save_snapshot)
    pub async fn load_snapshot(&self, path: &Path) -> Result<usize, StoreError> {
        let bytes = fs::read(path).await?;
        let data: HashMap<String, Vec<StoredStep>> = serde_json::from_slice(&bytes)?;

        let last_timestamp = data
            .values()
            .flatten()
            .map(|step| step.timestamp)
            .max()
            .unwrap_or(0);
        let products = data.len();

        let mut inner = self.inner.write().await;
        inner.history = data;
        inner.last_timestamp = last_timestamp;

        info!("Restored {} products from {}", products, path.display());
        Ok(products)
    }
}
