//! Downstream client tests
//!
//! Breaker and deadline behaviour of a single service client against a
//! wiremock server.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde_json::json;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use reservation_service::{
    models::{DateRange, ObjectId},
    resilience::{BreakerMode, BreakerSettings, CallContext, CallError, CircuitBreaker, ResilientClient},
    services::AccommodationClient,
};

use crate::common::requests_to;

fn accommodation_client(server: &MockServer, settings: BreakerSettings) -> AccommodationClient {
    let breaker = Arc::new(CircuitBreaker::new("accommodation", settings));
    AccommodationClient::new(ResilientClient::new(
        reqwest::Client::new(),
        server.uri(),
        breaker,
    ))
}

fn july() -> DateRange {
    DateRange {
        start_date: "2030-07-01T00:00:00Z".parse().unwrap(),
        end_date: "2030-07-10T00:00:00Z".parse().unwrap(),
    }
}

#[tokio::test]
async fn test_breaker_opens_and_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = accommodation_client(
        &server,
        BreakerSettings {
            failure_threshold: 5,
            reset_timeout: Duration::from_millis(100),
            half_open_max_calls: 1,
        },
    );
    let ctx = CallContext::background();

    for _ in 0..5 {
        let err = client.search(&ctx, &july()).await.unwrap_err();
        assert_eq!(err.remote_status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }
    assert_eq!(client.client().breaker().mode(), BreakerMode::Open);

    let err = client.search(&ctx, &july()).await.unwrap_err();
    assert!(err.is_breaker_open());
    assert_eq!(requests_to(&server).await, 5);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(client.client().breaker().mode(), BreakerMode::HalfOpen);

    server.reset().await;
    let id = ObjectId::new();
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "objectIds": [id] })))
        .mount(&server)
        .await;

    let found = client.search(&ctx, &july()).await.unwrap();
    assert_eq!(found, vec![id]);

    let status = client.client().breaker().status();
    assert_eq!(status.mode, BreakerMode::Closed);
    assert_eq!(status.consecutive_failures, 0);
}

#[tokio::test]
async fn test_failed_trial_reopens_breaker() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = accommodation_client(
        &server,
        BreakerSettings {
            failure_threshold: 1,
            reset_timeout: Duration::from_millis(50),
            half_open_max_calls: 1,
        },
    );
    let ctx = CallContext::background();

    client.search(&ctx, &july()).await.unwrap_err();
    assert_eq!(client.client().breaker().mode(), BreakerMode::Open);

    tokio::time::sleep(Duration::from_millis(80)).await;
    let err = client.search(&ctx, &july()).await.unwrap_err();
    assert!(matches!(err, CallError::Remote { .. }));
    assert_eq!(client.client().breaker().mode(), BreakerMode::Open);
    assert_eq!(requests_to(&server).await, 2);
}

#[tokio::test]
async fn test_deadline_expiry_is_a_timeout_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "objectIds": [] }))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let client = accommodation_client(&server, BreakerSettings::default());
    let ctx = CallContext::with_timeout(Duration::from_millis(50));

    let err = client.search(&ctx, &july()).await.unwrap_err();

    assert!(err.is_timeout(), "expected timeout, got {err}");
    let status = client.client().breaker().status();
    assert_eq!(status.consecutive_failures, 1);
    assert_eq!(status.mode, BreakerMode::Closed);
}

#[tokio::test]
async fn test_expired_context_sends_nothing() {
    let server = MockServer::start().await;
    let client = accommodation_client(&server, BreakerSettings::default());
    let ctx = CallContext::with_timeout(Duration::ZERO);
    tokio::time::sleep(Duration::from_millis(5)).await;

    let err = client.search(&ctx, &july()).await.unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(requests_to(&server).await, 0);
    assert_eq!(client.client().breaker().status().consecutive_failures, 0);
}

#[tokio::test]
async fn test_unexpected_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = accommodation_client(&server, BreakerSettings::default());
    let err = client
        .search(&CallContext::background(), &july())
        .await
        .unwrap_err();

    assert!(matches!(err, CallError::Decode { .. }));
}

#[tokio::test]
async fn test_remote_error_carries_request_details() {
    let server = MockServer::start().await;
    let id = ObjectId::new();
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = accommodation_client(&server, BreakerSettings::default());
    let err = client
        .exists(&CallContext::background(), id, "t")
        .await
        .unwrap_err();

    match err {
        CallError::Remote {
            method,
            url,
            status,
        } => {
            assert_eq!(method, Method::GET);
            assert_eq!(url, format!("{}/{}/exists", server.uri(), id));
            assert_eq!(status, StatusCode::NOT_FOUND);
        }
        other => panic!("expected remote error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_bearer_token_is_forwarded() {
    let server = MockServer::start().await;
    let id = ObjectId::new();
    Mock::given(method("GET"))
        .and(path(format!("/{}/exists", id)))
        .and(header("authorization", "Bearer caller-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "exists": true })))
        .expect(1)
        .mount(&server)
        .await;

    let client = accommodation_client(&server, BreakerSettings::default());
    let exists = client
        .exists(&CallContext::background(), id, "caller-token")
        .await
        .unwrap();

    assert!(exists);
}

#[tokio::test]
async fn test_unreachable_service_is_a_transport_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let breaker = Arc::new(CircuitBreaker::new("accommodation", BreakerSettings::default()));
    let client = AccommodationClient::new(ResilientClient::new(
        reqwest::Client::new(),
        uri,
        breaker.clone(),
    ));

    let err = client
        .search(&CallContext::background(), &july())
        .await
        .unwrap_err();

    assert!(err.is_transport());
    assert_eq!(breaker.status().consecutive_failures, 1);
}

#[tokio::test]
async fn test_transport_timeout_before_deadline_is_a_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "objectIds": [] }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let http = reqwest::Client::builder()
        .read_timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    let breaker = Arc::new(CircuitBreaker::new("accommodation", BreakerSettings::default()));
    let client = AccommodationClient::new(ResilientClient::new(http, server.uri(), breaker.clone()));
    let ctx = CallContext::with_timeout(Duration::from_secs(10));

    let err = client.search(&ctx, &july()).await.unwrap_err();

    assert!(err.is_transport(), "expected transport failure, got {err}");
    assert!(!ctx.is_expired());
    assert_eq!(breaker.status().consecutive_failures, 1);
}
