use resilient_http_circuitbreaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerEvent, CircuitState,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[test]
fn every_listener_sees_transitions() {
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let (a, b) = (Arc::clone(&first), Arc::clone(&second));

    let cb = CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .ring_buffer_size_in_closed_state(2)
            .on_state_transition(move |_, _| {
                a.fetch_add(1, Ordering::SeqCst);
            })
            .on_state_transition(move |_, _| {
                b.fetch_add(1, Ordering::SeqCst);
            })
            .build(),
    );
    for _ in 0..2 {
        let _ = cb.execute(|| Err::<(), _>("down"));
    }

    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

#[test]
fn call_events_follow_outcomes() {
    let permitted = Arc::new(AtomicUsize::new(0));
    let rejected = Arc::new(AtomicUsize::new(0));
    let successes = Arc::new(Mutex::new(Vec::new()));
    let failures = Arc::new(AtomicUsize::new(0));

    let cb = CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .ring_buffer_size_in_closed_state(2)
            .on_call_permitted({
                let permitted = Arc::clone(&permitted);
                move |_| {
                    permitted.fetch_add(1, Ordering::SeqCst);
                }
            })
            .on_call_rejected({
                let rejected = Arc::clone(&rejected);
                move |state| {
                    assert_eq!(state, CircuitState::Open);
                    rejected.fetch_add(1, Ordering::SeqCst);
                }
            })
            .on_success({
                let successes = Arc::clone(&successes);
                move |duration| successes.lock().unwrap().push(duration)
            })
            .on_failure({
                let failures = Arc::clone(&failures);
                move |_| {
                    failures.fetch_add(1, Ordering::SeqCst);
                }
            })
            .build(),
    );

    cb.execute(|| {
        std::thread::sleep(Duration::from_millis(5));
        Ok::<_, ()>(())
    })
    .unwrap();
    // Fills the ring at 50% and opens the breaker.
    let _ = cb.execute(|| Err::<(), _>(()));
    let _ = cb.execute(|| Err::<(), _>(()));
    let _ = cb.execute(|| Ok::<_, ()>(()));

    assert_eq!(permitted.load(Ordering::SeqCst), 2);
    assert_eq!(failures.load(Ordering::SeqCst), 1);
    assert_eq!(rejected.load(Ordering::SeqCst), 2);
    let successes = successes.lock().unwrap();
    assert_eq!(successes.len(), 1);
    assert!(successes[0] >= Duration::from_millis(5));
}

#[test]
fn panicking_listener_does_not_poison_breaker() {
    let cb = CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .on_call_permitted(|_| panic!("listener bug"))
            .build(),
    );

    assert_eq!(cb.execute(|| Ok::<_, ()>(1)).unwrap(), 1);
    assert_eq!(cb.execute(|| Ok::<_, ()>(2)).unwrap(), 2);
}

#[test]
fn events_carry_breaker_name() {
    let names = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&names);
    let cb = CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .name("payments")
            .on_event(move |event| {
                let name = match event {
                    CircuitBreakerEvent::StateTransition { pattern_name, .. }
                    | CircuitBreakerEvent::CallPermitted { pattern_name, .. }
                    | CircuitBreakerEvent::CallRejected { pattern_name, .. }
                    | CircuitBreakerEvent::SuccessRecorded { pattern_name, .. }
                    | CircuitBreakerEvent::FailureRecorded { pattern_name, .. }
                    | CircuitBreakerEvent::Reset { pattern_name, .. } => pattern_name.clone(),
                };
                sink.lock().unwrap().push(name);
            })
            .build(),
    );

    cb.execute(|| Ok::<_, ()>(())).unwrap();
    let names = names.lock().unwrap();
    assert_eq!(names.len(), 2);
    assert!(names.iter().all(|name| name == "payments"));
}

#[test]
fn rejection_error_names_the_breaker() {
    let cb = CircuitBreaker::new(CircuitBreakerConfig::builder().name("search").build());
    cb.force_open();

    let err = cb.try_acquire().unwrap_err();
    assert_eq!(err.name, "search");
    assert_eq!(err.state, CircuitState::Open);
    assert_eq!(
        err.to_string(),
        "circuit breaker 'search' is Open; call not permitted"
    );
}
