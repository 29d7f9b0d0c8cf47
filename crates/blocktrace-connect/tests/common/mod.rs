//! In-memory ledger with failure injection, shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use blocktrace_connect::{
    CallResult, ClientOptions, Dialer, EndpointIdentity, FailureKind, LedgerClient,
    LedgerTransport, Step, TransportFailure,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
pub struct MockLedger {
    store: Mutex<BTreeMap<String, Vec<Step>>>,
    clock: AtomicU64,

    /// Every event exactly as the connector transmitted it
    transmitted: Mutex<Vec<Step>>,

    pub dials: AtomicUsize,
    pub probes: AtomicUsize,
    pub history_queries: AtomicUsize,

    /// History queries currently running, and the most ever seen at once
    histories_in_flight: AtomicUsize,
    max_histories_in_flight: AtomicUsize,
    history_delay: Mutex<Option<Duration>>,

    dial_failure: Mutex<Option<TransportFailure>>,
    probe_failure: Mutex<Option<TransportFailure>>,
    dial_delay: Mutex<Option<Duration>>,
    method_failures: Mutex<HashMap<&'static str, TransportFailure>>,
    failing_histories: Mutex<HashSet<String>>,
    hanging_methods: Mutex<HashSet<&'static str>>,
}

impl MockLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_dial(&self, kind: FailureKind, message: &str) {
        *self.dial_failure.lock().unwrap() = Some(TransportFailure::new(kind, message));
    }

    pub fn heal_dial(&self) {
        *self.dial_failure.lock().unwrap() = None;
    }

    pub fn fail_probe(&self, kind: FailureKind, message: &str) {
        *self.probe_failure.lock().unwrap() = Some(TransportFailure::new(kind, message));
    }

    pub fn delay_dial(&self, delay: Duration) {
        *self.dial_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_method(&self, method: &'static str, kind: FailureKind, message: &str) {
        self.method_failures
            .lock()
            .unwrap()
            .insert(method, TransportFailure::new(kind, message));
    }

    pub fn heal_method(&self, method: &'static str) {
        self.method_failures.lock().unwrap().remove(method);
    }

    pub fn fail_history_of(&self, product_id: &str) {
        self.failing_histories
            .lock()
            .unwrap()
            .insert(product_id.to_string());
    }

    /// Make every history query take `delay` before answering
    pub fn delay_history(&self, delay: Duration) {
        *self.history_delay.lock().unwrap() = Some(delay);
    }

    pub fn max_histories_in_flight(&self) -> usize {
        self.max_histories_in_flight.load(Ordering::SeqCst)
    }

    pub fn hang_method(&self, method: &'static str) {
        self.hanging_methods.lock().unwrap().insert(method);
    }

    /// Seed a step directly, bypassing the connector
    pub fn seed(&self, product_id: &str, notes: Option<&str>) {
        let timestamp = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        self.store
            .lock()
            .unwrap()
            .entry(product_id.to_string())
            .or_default()
            .push(Step {
                product_id: product_id.to_string(),
                actor_name: "Seeder".to_string(),
                role: "Auditor".to_string(),
                action: "Inspected".to_string(),
                location: "Lab".to_string(),
                notes: notes.map(str::to_string),
                timestamp,
            });
    }

    pub fn transmitted(&self) -> Vec<Step> {
        self.transmitted.lock().unwrap().clone()
    }

    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    async fn gate(&self, method: &'static str) -> Result<(), TransportFailure> {
        let hangs = self.hanging_methods.lock().unwrap().contains(method);
        if hangs {
            std::future::pending::<()>().await;
        }
        match self.method_failures.lock().unwrap().get(method) {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LedgerTransport for MockLedger {
    async fn describe_service(&self) -> Result<String, TransportFailure> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.probe_failure.lock().unwrap().clone() {
            return Err(failure);
        }
        self.gate("describe_service").await?;
        let store = self.store.lock().unwrap();
        Ok(format!("Mock Ledger - Products: {}", store.len()))
    }

    async fn append(&self, step: Step) -> Result<CallResult<String>, TransportFailure> {
        self.gate("append").await?;
        self.transmitted.lock().unwrap().push(step.clone());

        if step.product_id.trim().is_empty() {
            return Ok(CallResult::Err("Product ID cannot be empty".to_string()));
        }

        let mut stored = step;
        stored.timestamp = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        let product_id = stored.product_id.clone();
        self.store
            .lock()
            .unwrap()
            .entry(product_id.clone())
            .or_default()
            .push(stored);

        Ok(CallResult::Ok(format!(
            "Step added successfully for product {}",
            product_id
        )))
    }

    async fn get_history(&self, product_id: &str) -> Result<Vec<Step>, TransportFailure> {
        self.history_queries.fetch_add(1, Ordering::SeqCst);

        let delay = *self.history_delay.lock().unwrap();
        if let Some(delay) = delay {
            let running = self.histories_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_histories_in_flight
                .fetch_max(running, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            self.histories_in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        self.gate("get_history").await?;
        if self.failing_histories.lock().unwrap().contains(product_id) {
            return Err(TransportFailure::new(
                FailureKind::Unclassified,
                format!("history of {} unavailable", product_id),
            ));
        }
        Ok(self
            .store
            .lock()
            .unwrap()
            .get(product_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_entities(&self) -> Result<Vec<String>, TransportFailure> {
        self.gate("list_entities").await?;
        Ok(self.store.lock().unwrap().keys().cloned().collect())
    }

    async fn get_total_event_count(&self) -> Result<u64, TransportFailure> {
        self.gate("get_total_event_count").await?;
        Ok(self
            .store
            .lock()
            .unwrap()
            .values()
            .map(|steps| steps.len() as u64)
            .sum())
    }
}

pub struct MockDialer(pub Arc<MockLedger>);

#[async_trait]
impl Dialer for MockDialer {
    async fn dial(
        &self,
        _endpoint: &EndpointIdentity,
    ) -> Result<Arc<dyn LedgerTransport>, TransportFailure> {
        self.0.dials.fetch_add(1, Ordering::SeqCst);
        let delay = *self.0.dial_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(failure) = self.0.dial_failure.lock().unwrap().clone() {
            return Err(failure);
        }
        Ok(self.0.clone())
    }
}

pub fn endpoint() -> EndpointIdentity {
    EndpointIdentity::new("http://127.0.0.1:8081", "uxrrr-q7777-77774-qaaaq-cai")
}

pub fn client(ledger: &Arc<MockLedger>) -> LedgerClient {
    client_with(ledger, ClientOptions::default())
}

pub fn client_with(ledger: &Arc<MockLedger>, options: ClientOptions) -> LedgerClient {
    LedgerClient::with_dialer(endpoint(), Arc::new(MockDialer(ledger.clone())), options)
}
