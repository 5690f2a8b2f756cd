use crate::circuit::state::{CircuitSnapshot, CircuitState};
use crate::config::CircuitThresholds;

fn millis(d: std::time::Duration) -> chrono::Duration {
    chrono::Duration::milliseconds(d.as_millis() as i64)
}

fn reset_window(snapshot: &mut CircuitSnapshot, now: chrono::DateTime<chrono::Utc>) {
    snapshot.window_started_at = now;
    snapshot.window_total = 0;
    snapshot.window_failed = 0;
}

fn open(snapshot: &mut CircuitSnapshot, thresholds: &CircuitThresholds, now: chrono::DateTime<chrono::Utc>) {
    snapshot.state = CircuitState::Open;
    snapshot.opened_at = Some(now);
    snapshot.cooldown_until = Some(now + millis(thresholds.open_window));
    snapshot.probe_in_flight = false;
    snapshot.probe_expires_at = None;
    reset_window(snapshot, now);
}

pub fn begin_probe(
    mut snapshot: CircuitSnapshot,
    thresholds: &CircuitThresholds,
    now: chrono::DateTime<chrono::Utc>,
) -> CircuitSnapshot {
    snapshot.state = CircuitState::HalfOpen;
    snapshot.probe_in_flight = true;
    snapshot.probe_expires_at = Some(now + millis(thresholds.probe_timeout));
    snapshot.updated_at = now;
    snapshot
}

pub fn apply_transition(
    mut snapshot: CircuitSnapshot,
    thresholds: &CircuitThresholds,
    success: bool,
    was_probe: bool,
    now: chrono::DateTime<chrono::Utc>,
) -> CircuitSnapshot {
    if now - snapshot.window_started_at >= millis(thresholds.stat_interval) {
        reset_window(&mut snapshot, now);
    }

    if was_probe {
        if success {
            snapshot.state = CircuitState::Closed;
            snapshot.opened_at = None;
            snapshot.cooldown_until = None;
            snapshot.probe_in_flight = false;
            snapshot.probe_expires_at = None;
            reset_window(&mut snapshot, now);
        } else {
            open(&mut snapshot, thresholds, now);
        }
        snapshot.updated_at = now;
        return snapshot;
    }

    // Calls that started before the circuit opened do not count against the next window.
    if snapshot.state == CircuitState::Closed {
        snapshot.window_total += 1;
        if !success {
            snapshot.window_failed += 1;
        }
        if snapshot.window_total >= thresholds.min_requests && snapshot.failure_ratio() >= thresholds.failure_ratio {
            open(&mut snapshot, thresholds, now);
        }
    }

    snapshot.updated_at = now;
    snapshot
}
