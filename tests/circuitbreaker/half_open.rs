use resilient_http_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use std::thread::sleep;
use std::time::Duration;

const WAIT: Duration = Duration::from_millis(40);

fn opened(trials: usize) -> CircuitBreaker {
    let cb = CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .ring_buffer_size_in_closed_state(2)
            .wait_duration_in_open_state(WAIT)
            .permitted_calls_in_half_open_state(trials)
            .build(),
    );
    for _ in 0..2 {
        let _ = cb.execute(|| Err::<(), _>("down"));
    }
    assert_eq!(cb.state(), CircuitState::Open);
    cb
}

#[test]
fn first_call_after_wait_is_a_trial() {
    let cb = opened(1);
    assert!(cb.try_acquire().is_err());

    sleep(WAIT * 2);
    let permit = cb.try_acquire().expect("trial permitted");
    assert_eq!(permit.state(), CircuitState::HalfOpen);
    assert_eq!(cb.state(), CircuitState::HalfOpen);

    // Only one trial at a time.
    let rejected = cb.try_acquire().unwrap_err();
    assert_eq!(rejected.state, CircuitState::HalfOpen);

    permit.record_success();
    assert_eq!(cb.state(), CircuitState::Closed);
}

#[test]
fn every_trial_must_succeed_to_close() {
    let cb = opened(2);
    sleep(WAIT * 2);

    let first = cb.try_acquire().unwrap();
    let second = cb.try_acquire().unwrap();
    assert!(cb.try_acquire().is_err());

    first.record_success();
    assert_eq!(cb.state(), CircuitState::HalfOpen);
    second.record_success();
    assert_eq!(cb.state(), CircuitState::Closed);
}

#[test]
fn any_failed_trial_reopens() {
    let cb = opened(2);
    sleep(WAIT * 2);

    let first = cb.try_acquire().unwrap();
    let second = cb.try_acquire().unwrap();
    first.record_failure();
    assert_eq!(cb.state(), CircuitState::Open);

    // The other trial's outcome belongs to a finished half-open period.
    second.record_success();
    assert_eq!(cb.state(), CircuitState::Open);
}

#[test]
fn dropped_permit_frees_its_trial_slot() {
    let cb = opened(1);
    sleep(WAIT * 2);

    let permit = cb.try_acquire().unwrap();
    drop(permit);

    let permit = cb.try_acquire().expect("slot released");
    permit.record_success();
    assert_eq!(cb.state(), CircuitState::Closed);
}

#[test]
fn recovery_starts_with_an_empty_ring() {
    let cb = opened(1);
    sleep(WAIT * 2);
    cb.execute(|| Ok::<_, ()>(())).unwrap();

    let metrics = cb.metrics();
    assert_eq!(metrics.state, CircuitState::Closed);
    assert_eq!(metrics.buffered_calls, 0);

    let _ = cb.execute(|| Err::<(), _>("blip"));
    assert_eq!(cb.state(), CircuitState::Closed);
    assert_eq!(cb.metrics().failure_rate, None);
}

#[tokio::test]
async fn async_trial_closes_the_breaker() {
    let cb = opened(1);
    tokio::time::sleep(WAIT * 2).await;

    let value = cb
        .execute_async_with(Result::is_err, || async { Ok::<_, ()>(7) })
        .await
        .unwrap();
    assert_eq!(value, 7);
    assert_eq!(cb.state(), CircuitState::Closed);
}
