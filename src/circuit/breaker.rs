use crate::circuit::evaluator::pre_call_decision;
use crate::circuit::state::{CircuitDecision, CircuitSnapshot};
use crate::circuit::transitions::{apply_transition, begin_probe};
use crate::config::CircuitThresholds;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Exception-ratio breaker guarding the primary gateway call in this process.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<Mutex<CircuitSnapshot>>,
    pub thresholds: CircuitThresholds,
}

impl CircuitBreaker {
    pub fn new(thresholds: CircuitThresholds) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CircuitSnapshot::new(chrono::Utc::now()))),
            thresholds,
        }
    }

    pub async fn acquire(&self) -> CircuitDecision {
        let now = chrono::Utc::now();
        let mut snapshot = self.inner.lock().await;
        let decision = pre_call_decision(&snapshot, now);
        if decision == CircuitDecision::Probe {
            if snapshot.probe_in_flight {
                tracing::warn!("half-open probe expired without an outcome, starting a new one");
            }
            *snapshot = begin_probe(snapshot.clone(), &self.thresholds, now);
        }
        decision
    }

    pub async fn record(&self, success: bool, was_probe: bool) {
        let now = chrono::Utc::now();
        let mut snapshot = self.inner.lock().await;
        let before = snapshot.state.clone();
        *snapshot = apply_transition(snapshot.clone(), &self.thresholds, success, was_probe, now);
        if snapshot.state != before {
            tracing::warn!("payment circuit {:?} -> {:?}", before, snapshot.state);
        }
    }

    pub async fn snapshot(&self) -> CircuitSnapshot {
        self.inner.lock().await.clone()
    }
}
