use payments_retry::circuit::breaker::CircuitBreaker;
use payments_retry::circuit::evaluator::pre_call_decision;
use payments_retry::circuit::state::{CircuitDecision, CircuitSnapshot, CircuitState};
use payments_retry::circuit::transitions::{apply_transition, begin_probe};
use payments_retry::config::CircuitThresholds;
use std::time::Duration;

#[test]
fn stays_closed_below_minimum_request_count() {
    let now = chrono::Utc::now();
    let mut snapshot = CircuitSnapshot::new(now);
    for _ in 0..4 {
        snapshot = apply_transition(snapshot, &defaults(), false, false, now);
    }
    assert_eq!(snapshot.state, CircuitState::Closed);
}

#[test]
fn opens_when_failure_ratio_crosses_threshold() {
    let now = chrono::Utc::now();
    let mut snapshot = CircuitSnapshot::new(now);
    for ok in [true, true, true, false, false] {
        snapshot = apply_transition(snapshot, &defaults(), ok, false, now);
    }
    assert_eq!(snapshot.state, CircuitState::Open);
    assert_eq!(pre_call_decision(&snapshot, now), CircuitDecision::Reject("circuit open".to_string()));
}

#[test]
fn window_rolls_over_after_stat_interval() {
    let now = chrono::Utc::now();
    let mut snapshot = CircuitSnapshot::new(now);
    for _ in 0..4 {
        snapshot = apply_transition(snapshot, &defaults(), false, false, now);
    }
    let later = now + chrono::Duration::seconds(11);
    snapshot = apply_transition(snapshot, &defaults(), false, false, later);
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.window_total, 1);
}

#[test]
fn single_probe_after_open_window_then_closes_on_success() {
    let now = chrono::Utc::now();
    let mut snapshot = CircuitSnapshot::new(now);
    for _ in 0..5 {
        snapshot = apply_transition(snapshot, &defaults(), false, false, now);
    }
    let after = now + chrono::Duration::seconds(6);
    assert_eq!(pre_call_decision(&snapshot, after), CircuitDecision::Probe);

    snapshot = begin_probe(snapshot, &defaults(), after);
    assert_eq!(snapshot.state, CircuitState::HalfOpen);
    assert!(matches!(pre_call_decision(&snapshot, after), CircuitDecision::Reject(_)));

    snapshot = apply_transition(snapshot, &defaults(), true, true, after);
    assert_eq!(snapshot.state, CircuitState::Closed);
}

#[test]
fn failed_probe_reopens() {
    let now = chrono::Utc::now();
    let mut snapshot = CircuitSnapshot::new(now);
    snapshot.state = CircuitState::Open;
    snapshot = begin_probe(snapshot, &defaults(), now);
    snapshot = apply_transition(snapshot, &defaults(), false, true, now);
    assert_eq!(snapshot.state, CircuitState::Open);
    assert!(snapshot.cooldown_until.is_some_and(|t| t > now));
}

#[test]
fn half_open_slot_frees_after_deadline() {
    let now = chrono::Utc::now();
    let mut snapshot = CircuitSnapshot::new(now);
    snapshot.state = CircuitState::Open;
    snapshot = begin_probe(snapshot, &defaults(), now);

    let during = now + chrono::Duration::seconds(1);
    assert!(matches!(pre_call_decision(&snapshot, during), CircuitDecision::Reject(_)));

    let after = now + chrono::Duration::seconds(4);
    assert_eq!(pre_call_decision(&snapshot, after), CircuitDecision::Probe);
}

#[tokio::test]
async fn breaker_recovers_when_half_open_caller_never_records() {
    let breaker = CircuitBreaker::new(CircuitThresholds {
        min_requests: 1,
        open_window: Duration::from_millis(10),
        probe_timeout: Duration::from_millis(50),
        ..defaults()
    });
    breaker.record(false, false).await;
    assert_eq!(breaker.snapshot().await.state, CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(breaker.acquire().await, CircuitDecision::Probe);
    assert!(matches!(breaker.acquire().await, CircuitDecision::Reject(_)));

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(breaker.acquire().await, CircuitDecision::Probe);
    breaker.record(true, true).await;
    assert_eq!(breaker.snapshot().await.state, CircuitState::Closed);
}

fn defaults() -> CircuitThresholds {
    CircuitThresholds::default()
}
