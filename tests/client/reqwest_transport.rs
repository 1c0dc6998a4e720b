use crate::common::{MockHttp, init_tracing};
use http::StatusCode;
use resilient_http_client::retry::RetryConfig;
use resilient_http_client::{
    HttpClientError, Request, ReqwestTransport, ResilientHttpClient, Response, TransportErrorKind,
};
use std::net::TcpListener;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, ResponseTemplate};

fn client() -> ResilientHttpClient<ReqwestTransport> {
    init_tracing();
    ResilientHttpClient::new(ReqwestTransport::new().unwrap()).unwrap()
}

/// Answers `status` once on `GET route`, then falls through to later mocks.
fn fail_once(route: &str, status: u16) -> Mock {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string("Error"))
        .up_to_n_times(1)
}

fn succeed(route: &str) -> Mock {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string("Success"))
}

#[test]
fn retries_server_error_against_real_server() {
    let server = MockHttp::start();
    server.mount(fail_once("/test", 500));
    server.mount(succeed("/test"));
    let client = client();

    let request = Request::get(server.uri("/test")).build();
    let response = client.make_request(&request).unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().unwrap(), "Success");
    assert_eq!(server.received().len(), 2);
}

#[test]
fn async_request_against_real_server() {
    let server = MockHttp::start();
    server.mount(fail_once("/test", 503));
    server.mount(succeed("/test"));
    let client = client();

    let request = Request::get(server.uri("/test")).build();
    let response = server.block_on(client.make_async_request(request)).unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().unwrap(), "Success");
    assert_eq!(server.received().len(), 2);
}

#[test]
fn exhausted_retries_return_last_server_error() {
    let server = MockHttp::start();
    server.mount(
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Unavailable")),
    );
    let client = client();

    let response = client
        .make_request(&Request::get(server.uri("/down")).build())
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.text().unwrap(), "Unavailable");
    assert_eq!(server.received().len(), 2);
}

#[test]
fn slow_server_times_out() {
    let server = MockHttp::start();
    server.mount(
        Mock::given(method("GET"))
            .and(path("/timeout"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(2)),
            ),
    );
    let client = ResilientHttpClient::builder(ReqwestTransport::new().unwrap())
        .retry(
            RetryConfig::builder()
                .max_attempts(1)
                .retry_on_error(HttpClientError::is_transient)
                .retry_on_result(Response::is_server_error)
                .build(),
        )
        .build()
        .unwrap()
        .with_timeout(Duration::from_secs(1));

    let started = Instant::now();
    let err = client
        .make_request(&Request::get(server.uri("/timeout")).build())
        .unwrap_err();

    assert!(err.is_timeout(), "expected timeout, got {err}");
    assert!(started.elapsed() < Duration::from_millis(1900));
}

#[test]
fn refused_connection_is_a_transient_io_error() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let client = client()
        .with_connect_timeout(Duration::from_millis(500))
        .unwrap();
    assert_eq!(client.transport().connect_timeout(), Some(Duration::from_millis(500)));

    let uri: http::Uri = format!("http://{addr}/closed").parse().unwrap();
    let err = client.make_request(&Request::get(uri).build()).unwrap_err();

    let transport_err = err.transport_error().expect("transport error");
    assert_eq!(transport_err.kind(), TransportErrorKind::Io);
    assert!(err.is_transient());
    assert_eq!(client.circuit_breaker().metrics().failed_calls, 2);
}

#[test]
fn post_body_reaches_server() {
    let server = MockHttp::start();
    server.mount(
        Mock::given(method("POST"))
            .and(path("/items"))
            .and(header("content-type", "application/json"))
            .and(body_string(r#"{"name":"widget"}"#))
            .respond_with(ResponseTemplate::new(201).set_body_string("created")),
    );
    let client = client();

    let request = Request::post(server.uri("/items"))
        .header(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        )
        .body(r#"{"name":"widget"}"#)
        .build();
    let response = client.make_request(&request).unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.text().unwrap(), "created");
    assert_eq!(server.received().len(), 1);
}
