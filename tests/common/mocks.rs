//! Mock sibling services for testing
//!
//! Each downstream service runs as its own wiremock server so tests can
//! assert exactly which calls the service made.

use serde_json::json;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use reservation_service::models::ObjectId;

/// Mock profile, accommodation and notification services
pub struct DownstreamMocks {
    pub profile: MockServer,
    pub accommodation: MockServer,
    pub notification: MockServer,
}

impl DownstreamMocks {
    pub async fn start() -> Self {
        Self {
            profile: MockServer::start().await,
            accommodation: MockServer::start().await,
            notification: MockServer::start().await,
        }
    }

    /// Profile service resolves `username` to `id`
    pub async fn user_id(&self, username: &str, id: ObjectId) {
        Mock::given(method("GET"))
            .and(path(format!("/users/{}/id", username)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": id })))
            .mount(&self.profile)
            .await;
    }

    /// Profile service answers every lookup with `status`
    pub async fn profile_status(&self, status: u16) {
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.profile)
            .await;
    }

    /// Accommodation service reports whether `id` exists
    pub async fn accommodation_exists(&self, id: ObjectId, exists: bool) {
        Mock::given(method("GET"))
            .and(path(format!("/{}/exists", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "exists": exists })))
            .mount(&self.accommodation)
            .await;
    }

    /// Notification service accepts every notification
    pub async fn accept_notifications(&self) {
        Mock::given(method("POST"))
            .and(path("/notifications"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&self.notification)
            .await;
    }

    /// Notification service fails every notification
    pub async fn fail_notifications(&self) {
        Mock::given(method("POST"))
            .and(path("/notifications"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&self.notification)
            .await;
    }

    /// Requests received by all three services
    pub async fn total_requests(&self) -> usize {
        requests_to(&self.profile).await
            + requests_to(&self.accommodation).await
            + requests_to(&self.notification).await
    }
}

/// Requests received by one mock server
pub async fn requests_to(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or_default()
}
