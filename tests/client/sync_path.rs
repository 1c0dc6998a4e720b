use crate::common::{ScriptedTransport, Step, get};
use http::StatusCode;
use resilient_http_client::circuitbreaker::{CircuitBreakerConfig, CircuitState};
use resilient_http_client::retry::RetryConfig;
use resilient_http_client::{
    HttpClientError, ResilientHttpClient, Response, TransportErrorKind, default_retry_config,
};

#[test]
fn server_error_then_success_is_retried() {
    let transport = ScriptedTransport::new([Step::Respond(500, "Error"), Step::Respond(200, "Success")]);
    let client = ResilientHttpClient::new(transport.clone()).unwrap();

    let response = client.make_request(&get("http://localhost/test")).unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().unwrap(), "Success");
    assert_eq!(transport.calls(), 2);
}

#[test]
fn io_error_then_success_is_retried() {
    let transport = ScriptedTransport::new([
        Step::Fail(TransportErrorKind::Io),
        Step::Respond(200, "Success"),
    ]);
    let client = ResilientHttpClient::new(transport.clone()).unwrap();

    let response = client.make_request(&get("http://localhost/test")).unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(transport.calls(), 2);
}

#[test]
fn exhausted_retries_return_last_server_error() {
    let transport = ScriptedTransport::statuses(&[500, 503]);
    let client = ResilientHttpClient::new(transport.clone()).unwrap();

    let response = client.make_request(&get("http://localhost/test")).unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(transport.calls(), 2);
}

#[test]
fn exhausted_retries_return_last_transport_error() {
    let transport = ScriptedTransport::always(Step::Fail(TransportErrorKind::Io));
    let client = ResilientHttpClient::new(transport.clone()).unwrap();

    let err = client.make_request(&get("http://localhost/test")).unwrap_err();
    let transport_err = err.transport_error().expect("transport error");
    assert_eq!(transport_err.kind(), TransportErrorKind::Io);
    assert_eq!(transport.calls(), 2);
}

#[test]
fn client_errors_are_not_retried() {
    let transport = ScriptedTransport::statuses(&[404]);
    let client = ResilientHttpClient::new(transport.clone()).unwrap();

    let response = client.make_request(&get("http://localhost/missing")).unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(transport.calls(), 1);
    assert_eq!(client.circuit_breaker().metrics().failed_calls, 0);
}

#[test]
fn non_transient_errors_are_not_retried() {
    let transport = ScriptedTransport::always(Step::Fail(TransportErrorKind::InvalidRequest));
    let client = ResilientHttpClient::new(transport.clone()).unwrap();

    let err = client.make_request(&get("http://localhost/test")).unwrap_err();
    assert!(!err.is_transient());
    assert!(!err.is_circuit_open());
    assert_eq!(transport.calls(), 1);
}

#[test]
fn breaker_opens_after_five_failed_calls() {
    let transport = ScriptedTransport::always(Step::Respond(500, "Error"));
    let client = ResilientHttpClient::builder(transport.clone())
        .retry(
            RetryConfig::builder()
                .max_attempts(1)
                .retry_on_result(Response::is_server_error)
                .build(),
        )
        .build()
        .unwrap();
    let request = get("http://localhost/test");

    for _ in 0..5 {
        let response = client.make_request(&request).unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
    assert_eq!(client.circuit_breaker().state(), CircuitState::Open);

    let err = client.make_request(&request).unwrap_err();
    assert!(matches!(err, HttpClientError::CircuitOpen { .. }));
    assert_eq!(transport.calls(), 5);
}

#[test]
fn breaker_opening_ends_the_retry_loop() {
    // With two attempts per call the fifth failure lands on the first
    // attempt of the third call, whose retry is then rejected.
    let transport = ScriptedTransport::always(Step::Respond(500, "Error"));
    let client = ResilientHttpClient::new(transport.clone()).unwrap();
    let request = get("http://localhost/test");

    for _ in 0..2 {
        let response = client.make_request(&request).unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    let err = client.make_request(&request).unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(transport.calls(), 5);

    for _ in 0..3 {
        assert!(client.make_request(&request).unwrap_err().is_circuit_open());
    }
    assert_eq!(transport.calls(), 5);
    assert_eq!(client.circuit_breaker().metrics().not_permitted_calls, 4);
}

#[test]
fn mixed_outcomes_below_threshold_keep_breaker_closed() {
    let transport = ScriptedTransport::statuses(&[200, 500, 200, 200, 200, 200]);
    let client = ResilientHttpClient::builder(transport.clone())
        .circuit_breaker_config(
            CircuitBreakerConfig::builder()
                .failure_rate_threshold(50.0)
                .ring_buffer_size_in_closed_state(5)
                .build(),
        )
        .build()
        .unwrap();
    let request = get("http://localhost/test");

    for _ in 0..5 {
        assert_eq!(client.make_request(&request).unwrap().status(), StatusCode::OK);
    }

    let metrics = client.circuit_breaker().metrics();
    assert_eq!(metrics.state, CircuitState::Closed);
    let rate = metrics.failure_rate.expect("ring buffer is full");
    assert!((rate - 20.0).abs() < 0.01);
}

#[test]
fn default_headers_reach_transport() {
    let transport = ScriptedTransport::default();
    let client = ResilientHttpClient::builder(transport.clone())
        .default_header(
            http::header::ACCEPT,
            http::HeaderValue::from_static("application/json"),
        )
        .build()
        .unwrap();

    let request = get("http://localhost/test")
        .to_builder()
        .header(http::header::ACCEPT, http::HeaderValue::from_static("text/plain"))
        .build();
    client.make_request(&request).unwrap();
    client.make_request(&get("http://localhost/other")).unwrap();

    let seen = transport.seen();
    assert_eq!(seen[0].headers()[http::header::ACCEPT], "text/plain");
    assert_eq!(seen[0].headers().get_all(http::header::ACCEPT).iter().count(), 1);
    assert_eq!(seen[1].headers()[http::header::ACCEPT], "application/json");
}

#[test]
fn retry_events_fire_through_client() {
    let retried = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = std::sync::Arc::clone(&retried);

    let transport = ScriptedTransport::statuses(&[502, 200]);
    let client = ResilientHttpClient::new(transport)
        .unwrap()
        .with_retry_policy({
            let defaults = default_retry_config();
            RetryConfig::builder()
                .max_attempts(defaults.max_attempts())
                .retry_on_error(HttpClientError::is_transient)
                .retry_on_result(Response::is_server_error)
                .on_retry(move |_attempt, _delay| {
                    counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                })
                .build()
        });

    client.make_request(&get("http://localhost/test")).unwrap();
    assert_eq!(retried.load(std::sync::atomic::Ordering::SeqCst), 1);
}
