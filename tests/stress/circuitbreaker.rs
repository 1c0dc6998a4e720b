//! Circuit breaker stress tests

use resilient_http_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Test: 500k calls through a closed breaker
#[test]
#[ignore]
fn stress_half_million_calls() {
    let cb = CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .ring_buffer_size_in_closed_state(100)
            .build(),
    );

    let start = Instant::now();
    for _ in 0..500_000 {
        cb.execute(|| Ok::<_, ()>(())).unwrap();
    }
    let elapsed = start.elapsed();

    println!("500k calls completed in {:?}", elapsed);
    println!("Throughput: {:.0} calls/sec", 500_000.0 / elapsed.as_secs_f64());
    assert_eq!(cb.state(), CircuitState::Closed);
}

/// Test: rapid open/half-open/closed cycling from many threads
#[test]
#[ignore]
fn stress_thrashing_from_threads() {
    let cb = CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .ring_buffer_size_in_closed_state(10)
            .wait_duration_in_open_state(Duration::from_millis(1))
            .permitted_calls_in_half_open_state(2)
            .build(),
    );
    let transitions = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let cb = cb.clone();
            thread::spawn(move || {
                for i in 0..20_000usize {
                    let failed = (i / 50 + t) % 2 == 0;
                    let _ = cb.execute(|| if failed { Err(()) } else { Ok(()) });
                }
            })
        })
        .collect();

    let watcher = {
        let cb = cb.clone();
        let transitions = Arc::clone(&transitions);
        thread::spawn(move || {
            let mut last = cb.state();
            for _ in 0..10_000 {
                let now = cb.state();
                if now != last {
                    transitions.fetch_add(1, Ordering::Relaxed);
                    last = now;
                }
                thread::yield_now();
            }
        })
    };

    for handle in handles {
        handle.join().unwrap();
    }
    watcher.join().unwrap();

    let metrics = cb.metrics();
    println!("observed transitions: {}", transitions.load(Ordering::Relaxed));
    println!("rejected calls: {}", metrics.not_permitted_calls);
    assert!(metrics.buffered_calls <= 10);
}
