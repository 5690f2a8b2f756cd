use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub window_started_at: chrono::DateTime<chrono::Utc>,
    pub window_total: u32,
    pub window_failed: u32,
    pub opened_at: Option<chrono::DateTime<chrono::Utc>>,
    pub cooldown_until: Option<chrono::DateTime<chrono::Utc>>,
    pub probe_in_flight: bool,
    pub probe_expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl CircuitSnapshot {
    pub fn new(now: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            state: CircuitState::Closed,
            window_started_at: now,
            window_total: 0,
            window_failed: 0,
            opened_at: None,
            cooldown_until: None,
            probe_in_flight: false,
            probe_expires_at: None,
            updated_at: now,
        }
    }

    pub fn failure_ratio(&self) -> f64 {
        if self.window_total == 0 {
            return 0.0;
        }
        self.window_failed as f64 / self.window_total as f64
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CircuitDecision {
    Allow,
    Probe,
    Reject(String),
}
