//! API integration tests
//!
//! Full request flows through the router with mocked sibling services.

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;
use wiremock::{
    matchers::{body_partial_json, method, path},
    Mock, ResponseTemplate,
};

use reservation_service::{
    config::BreakerConfig,
    db::ReservationRepository,
    models::{AvailablePeriod, ObjectId, Reservation},
};

use crate::common::{
    date_range_body, period_body, requests_to, reservation_body, test_config, DownstreamMocks,
    TestApp, TokenFactory,
};

/// Host `hana` creates a period for a fresh accommodation
async fn seed_period(app: &TestApp) -> (AvailablePeriod, ObjectId) {
    let host = ObjectId::new();
    let accommodation = ObjectId::new();
    app.mocks.user_id("hana", host).await;
    app.mocks.accommodation_exists(accommodation, true).await;

    let token = TokenFactory::new().host("hana");
    let response = app
        .post_json("/periods", period_body(accommodation), Some(&token))
        .await;
    response.assert_created();

    (response.json(), host)
}

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let app = TestApp::new().await;
    let response = app.get("/health", None).await;

    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_detailed_health_lists_breakers() {
    let app = TestApp::new().await;
    let response = app.get("/health/detailed", None).await;

    response.assert_ok();

    let json: serde_json::Value = response.json();
    let services: Vec<&str> = json["downstreams"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["service"].as_str().unwrap())
        .collect();
    assert_eq!(services, vec!["profile", "accommodation", "notification"]);
    assert_eq!(json["downstreams"][0]["mode"], "closed");
}

#[tokio::test]
async fn test_create_period_assigns_owner_and_id() {
    let app = TestApp::new().await;

    let (period, host) = seed_period(&app).await;

    assert!(period.id.is_some());
    assert_eq!(period.id_user, Some(host));
    assert_eq!(app.repo.period_count().await, 1);
}

#[tokio::test]
async fn test_create_period_for_unknown_accommodation_is_rejected() {
    let app = TestApp::new().await;
    let accommodation = ObjectId::new();
    app.mocks.user_id("hana", ObjectId::new()).await;
    app.mocks.accommodation_exists(accommodation, false).await;

    let token = TokenFactory::new().host("hana");
    app.post_json("/periods", period_body(accommodation), Some(&token))
        .await
        .assert_bad_request();

    assert_eq!(app.repo.period_count().await, 0);
}

#[tokio::test]
async fn test_invalid_period_fails_validation_before_downstream_calls() {
    let app = TestApp::new().await;
    let token = TokenFactory::new().host("hana");
    let mut body = period_body(ObjectId::new());
    body["endDate"] = json!("2030-06-01T00:00:00Z");

    app.post_json("/periods", body, Some(&token))
        .await
        .assert_bad_request();

    assert_eq!(app.mocks.total_requests().await, 0);
}

#[tokio::test]
async fn test_update_period_by_owner() {
    let app = TestApp::new().await;
    let (period, _) = seed_period(&app).await;

    let mut body = serde_json::to_value(&period).unwrap();
    body["price"] = json!(150.0);

    let token = TokenFactory::new().host("hana");
    let response = app.put_json("/periods", body, Some(&token)).await;

    response.assert_created();
    let updated: AvailablePeriod = response.json();
    assert_eq!(updated.price, 150.0);
}

#[tokio::test]
async fn test_update_period_by_other_host_is_rejected() {
    let app = TestApp::new().await;
    let (period, _) = seed_period(&app).await;
    app.mocks.user_id("otto", ObjectId::new()).await;

    let mut body = serde_json::to_value(&period).unwrap();
    body["price"] = json!(1.0);

    let token = TokenFactory::new().host("otto");
    let response = app.put_json("/periods", body, Some(&token)).await;

    response.assert_bad_request();
    assert!(response.text().contains("not the owner"));

    let stored = app
        .repo
        .find_period(period.id.unwrap(), period.id_accommodation)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.price, 120.0);
}

#[tokio::test]
async fn test_period_lookups() {
    let app = TestApp::new().await;
    let (period, _) = seed_period(&app).await;
    let id = period.id.unwrap();

    let list: Vec<AvailablePeriod> = app
        .get(
            &format!("/periods/accommodation/{}", period.id_accommodation),
            None,
        )
        .await
        .assert_ok()
        .json();
    assert_eq!(list.len(), 1);

    let found: AvailablePeriod = app
        .get(
            &format!("/periods/{}/{}", id, period.id_accommodation),
            None,
        )
        .await
        .assert_ok()
        .json();
    assert_eq!(found.id, Some(id));

    app.get(&format!("/periods/{}/{}", id, ObjectId::new()), None)
        .await
        .assert_not_found();

    app.get("/periods/accommodation/not-an-id", None)
        .await
        .assert_bad_request();
}

#[tokio::test]
async fn test_reservation_for_missing_accommodation_is_not_persisted() {
    let app = TestApp::new().await;
    let accommodation = ObjectId::new();
    app.mocks.user_id("gina", ObjectId::new()).await;
    app.mocks.accommodation_exists(accommodation, false).await;
    app.mocks.accept_notifications().await;

    let token = TokenFactory::new().guest("gina");
    app.post_json(
        "/reservations",
        reservation_body(ObjectId::new(), accommodation),
        Some(&token),
    )
    .await
    .assert_bad_request();

    assert_eq!(app.repo.reservation_count().await, 0);
    assert_eq!(requests_to(&app.mocks.notification).await, 0);
}

#[tokio::test]
async fn test_reservation_lifecycle_notifies_host() {
    let app = TestApp::new().await;
    let (period, host) = seed_period(&app).await;
    let guest = ObjectId::new();
    app.mocks.user_id("gina", guest).await;

    Mock::given(method("POST"))
        .and(path("/notifications"))
        .and(body_partial_json(json!({ "userId": host })))
        .respond_with(ResponseTemplate::new(201))
        .expect(2)
        .mount(&app.mocks.notification)
        .await;

    let token = TokenFactory::new().guest("gina");
    let created: Reservation = app
        .post_json(
            "/reservations",
            reservation_body(period.id.unwrap(), period.id_accommodation),
            Some(&token),
        )
        .await
        .assert_created()
        .json();
    assert_eq!(created.id_user, Some(guest));

    let mine: Vec<Reservation> = app
        .get("/reservations/user/gina", Some(&token))
        .await
        .assert_ok()
        .json();
    assert_eq!(mine.len(), 1);

    let for_period: Vec<Reservation> = app
        .get(
            &format!("/reservations/period/{}", period.id.unwrap()),
            None,
        )
        .await
        .assert_ok()
        .json();
    assert_eq!(for_period.len(), 1);

    let uri = format!(
        "/reservations/{}/{}",
        period.id.unwrap(),
        created.id.unwrap()
    );
    app.delete(&uri, None, Some(&token))
        .await
        .assert_status(StatusCode::ACCEPTED);
    app.delete(&uri, None, Some(&token))
        .await
        .assert_not_found();

    assert_eq!(app.repo.reservation_count().await, 0);
}

#[tokio::test]
async fn test_failed_notification_does_not_change_response() {
    let app = TestApp::new().await;
    let (period, _) = seed_period(&app).await;
    app.mocks.user_id("gina", ObjectId::new()).await;
    app.mocks.fail_notifications().await;

    let token = TokenFactory::new().guest("gina");
    app.post_json(
        "/reservations",
        reservation_body(period.id.unwrap(), period.id_accommodation),
        Some(&token),
    )
    .await
    .assert_created();

    assert_eq!(requests_to(&app.mocks.notification).await, 1);
    assert_eq!(app.repo.reservation_count().await, 1);
}

#[tokio::test]
async fn test_expired_reservations_for_caller() {
    let app = TestApp::new().await;
    let guest = ObjectId::new();
    app.mocks.user_id("gina", guest).await;

    let past = app
        .repo
        .insert_period(AvailablePeriod {
            id: None,
            id_accommodation: ObjectId::new(),
            id_user: Some(ObjectId::new()),
            start_date: "2020-01-01T00:00:00Z".parse().unwrap(),
            end_date: "2020-02-01T00:00:00Z".parse().unwrap(),
            price: 50.0,
            price_per_guest: false,
        })
        .await
        .unwrap();
    app.repo
        .insert_reservation(Reservation {
            id: None,
            id_period: past.id.unwrap(),
            id_accommodation: past.id_accommodation,
            id_user: Some(guest),
            start_date: "2020-01-10T00:00:00Z".parse().unwrap(),
            end_date: "2020-01-12T00:00:00Z".parse().unwrap(),
            guest_number: 1,
            price: 100.0,
        })
        .await
        .unwrap();

    let token = TokenFactory::new().guest("gina");
    let expired: Vec<Reservation> = app
        .get("/reservations/expired", Some(&token))
        .await
        .assert_ok()
        .json();
    assert_eq!(expired.len(), 1);

    // Only past stays remain, so the history can be cleared
    app.delete(&format!("/reservations/user/{}", guest), None, None)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    assert_eq!(app.repo.reservation_count().await, 0);
}

#[tokio::test]
async fn test_user_with_active_reservation_cannot_be_cleared() {
    let app = TestApp::new().await;
    let (period, _) = seed_period(&app).await;
    let guest = ObjectId::new();
    app.mocks.user_id("gina", guest).await;
    app.mocks.accept_notifications().await;

    let token = TokenFactory::new().guest("gina");
    app.post_json(
        "/reservations",
        reservation_body(period.id.unwrap(), period.id_accommodation),
        Some(&token),
    )
    .await
    .assert_created();

    app.delete(&format!("/reservations/user/{}", guest), None, None)
        .await
        .assert_bad_request();
    assert_eq!(app.repo.reservation_count().await, 1);
}

#[tokio::test]
async fn test_search_returns_covering_accommodations() {
    let app = TestApp::new().await;
    let (period, _) = seed_period(&app).await;

    let found: serde_json::Value = app
        .post_json(
            "/search",
            date_range_body("2030-07-10T00:00:00Z", "2030-07-12T00:00:00Z"),
            None,
        )
        .await
        .assert_ok()
        .json();
    assert_eq!(found, json!({ "objectIds": [period.id_accommodation] }));

    let none: serde_json::Value = app
        .post_json(
            "/search",
            date_range_body("2030-08-10T00:00:00Z", "2030-08-12T00:00:00Z"),
            None,
        )
        .await
        .assert_ok()
        .json();
    assert_eq!(none, json!({ "objectIds": [] }));
}

#[tokio::test]
async fn test_delete_periods_for_accommodations() {
    let app = TestApp::new().await;
    let (period, _) = seed_period(&app).await;

    let token = TokenFactory::new().host("hana");
    app.delete(
        "/periods",
        Some(json!({ "objectIds": [period.id_accommodation] })),
        Some(&token),
    )
    .await
    .assert_status(StatusCode::NO_CONTENT);

    assert_eq!(app.repo.period_count().await, 0);
}

#[tokio::test]
async fn test_downstream_status_mapping() {
    let app = TestApp::new().await;
    app.mocks.profile_status(404).await;

    let token = TokenFactory::new().guest("ghost");
    app.get("/reservations/expired", Some(&token))
        .await
        .assert_bad_request();

    let app = TestApp::new().await;
    app.mocks.profile_status(503).await;
    app.get("/reservations/expired", Some(&token))
        .await
        .assert_status(StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_open_breaker_fails_fast_with_503() {
    let app = TestApp::with_breaker(BreakerConfig {
        failure_threshold: 2,
        reset_timeout_secs: 60,
        half_open_max_calls: 1,
    })
    .await;
    app.mocks.profile_status(500).await;

    let token = TokenFactory::new().guest("gina");
    for _ in 0..2 {
        app.get("/reservations/expired", Some(&token))
            .await
            .assert_status(StatusCode::BAD_GATEWAY);
    }

    app.get("/reservations/expired", Some(&token))
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(requests_to(&app.mocks.profile).await, 2);

    let health = app.get("/health/detailed", None).await;
    health.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let json: serde_json::Value = health.json();
    assert_eq!(json["downstreams"][0]["mode"], "open");
}

#[tokio::test]
async fn test_username_cannot_escape_profile_path() {
    let app = TestApp::new().await;
    app.mocks.profile_status(404).await;

    let token = TokenFactory::new().guest("gina");
    app.get("/reservations/user/..%2F..%2Fadmin%2Fsecrets", Some(&token))
        .await
        .assert_bad_request();

    let paths: Vec<String> = app
        .mocks
        .profile
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(paths, vec!["/users/..%2F..%2Fadmin%2Fsecrets/id".to_string()]);
}

#[tokio::test]
async fn test_request_deadline_cancels_downstream_work() {
    let mocks = DownstreamMocks::start().await;
    let mut config = test_config(&mocks);
    config.server.request_timeout_secs = Some(1);
    let app = TestApp::with_config(config, mocks);

    Mock::given(method("GET"))
        .and(path("/users/hana/id"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": ObjectId::new() }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&app.mocks.profile)
        .await;
    let accommodation = ObjectId::new();
    app.mocks.accommodation_exists(accommodation, true).await;

    let token = TokenFactory::new().host("hana");
    let started = std::time::Instant::now();
    app.post_json("/periods", period_body(accommodation), Some(&token))
        .await
        .assert_status(StatusCode::GATEWAY_TIMEOUT);
    assert!(started.elapsed() < Duration::from_secs(3));

    let profile = app.state.downstreams.profile.client().breaker().status();
    assert_eq!(profile.consecutive_failures, 1);
    assert_eq!(requests_to(&app.mocks.profile).await, 1);
    assert_eq!(requests_to(&app.mocks.accommodation).await, 0);
    assert_eq!(app.repo.period_count().await, 0);
}
