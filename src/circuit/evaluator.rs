use crate::circuit::state::{CircuitDecision, CircuitSnapshot, CircuitState};

pub fn pre_call_decision(snapshot: &CircuitSnapshot, now: chrono::DateTime<chrono::Utc>) -> CircuitDecision {
    match snapshot.state {
        CircuitState::Closed => CircuitDecision::Allow,
        CircuitState::Open => {
            if snapshot.cooldown_until.is_some_and(|t| now >= t) {
                CircuitDecision::Probe
            } else {
                CircuitDecision::Reject("circuit open".to_string())
            }
        }
        CircuitState::HalfOpen => {
            // A probe whose caller went away never records; its deadline frees the slot.
            let probe_alive = snapshot.probe_in_flight && snapshot.probe_expires_at.is_some_and(|t| now < t);
            if probe_alive {
                CircuitDecision::Reject("half-open probe in flight".to_string())
            } else {
                CircuitDecision::Probe
            }
        }
    }
}
