//! Property tests for the client.
//!
//! Invariants tested:
//! - A logical request never reaches the transport more than max_attempts times
//! - A final 5xx or transport error is returned, never masked as success
//! - Blocking and async requests end with the same outcome

use super::common::{ScriptedTransport, Step, get};
use proptest::prelude::*;
use resilient_http_client::circuitbreaker::CircuitBreakerConfig;
use resilient_http_client::retry::RetryConfig;
use resilient_http_client::{
    HttpClientError, ResilientHttpClient, Response, TransportErrorKind,
};

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Respond(200, "Success")),
        Just(Step::Respond(404, "Missing")),
        Just(Step::Respond(500, "Error")),
        Just(Step::Respond(503, "Error")),
        Just(Step::Fail(TransportErrorKind::Io)),
        Just(Step::Fail(TransportErrorKind::InvalidRequest)),
    ]
}

fn client(transport: ScriptedTransport, max_attempts: usize) -> ResilientHttpClient<ScriptedTransport> {
    ResilientHttpClient::builder(transport)
        .retry(
            RetryConfig::builder()
                .max_attempts(max_attempts)
                .retry_on_error(HttpClientError::is_transient)
                .retry_on_result(Response::is_server_error)
                .build(),
        )
        // Large enough that the breaker stays closed for the whole script.
        .circuit_breaker_config(
            CircuitBreakerConfig::builder()
                .ring_buffer_size_in_closed_state(100)
                .build(),
        )
        .scheduler_threads(1)
        .build()
        .unwrap()
}

fn summarize(result: Result<Response, HttpClientError>) -> Result<u16, &'static str> {
    result
        .map(|response| response.status().as_u16())
        .map_err(|err| err.kind_str())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    #[test]
    fn transport_calls_are_bounded(
        script in prop::collection::vec(step(), 1..8),
        max_attempts in 1usize..5,
    ) {
        let transport = ScriptedTransport::new(script.clone());
        transport.set_fallback(Step::Respond(500, "Error"));
        let client = client(transport.clone(), max_attempts);

        let result = client.make_request(&get("http://localhost/prop"));
        prop_assert!(transport.calls() >= 1);
        prop_assert!(transport.calls() <= max_attempts);

        let last = &script.get(transport.calls() - 1).cloned().unwrap_or(Step::Respond(500, "Error"));
        match (last, summarize(result)) {
            (Step::Respond(status, _), outcome) => prop_assert_eq!(outcome, Ok(*status)),
            (Step::Fail(TransportErrorKind::Io), outcome) => prop_assert_eq!(outcome, Err("io")),
            (Step::Fail(_), outcome) => prop_assert_eq!(outcome, Err("invalid_request")),
            (Step::Slow(..), _) => unreachable!(),
        }
    }

    #[test]
    fn async_and_blocking_agree(
        script in prop::collection::vec(step(), 1..6),
        max_attempts in 1usize..4,
    ) {
        let blocking = ScriptedTransport::new(script.clone());
        let expected = summarize(client(blocking.clone(), max_attempts).make_request(&get("http://localhost/prop")));

        let non_blocking = ScriptedTransport::new(script);
        let actual = summarize(futures::executor::block_on(
            client(non_blocking.clone(), max_attempts).make_async_request(get("http://localhost/prop")),
        ));

        prop_assert_eq!(actual, expected);
        prop_assert_eq!(non_blocking.calls(), blocking.calls());
    }
}
