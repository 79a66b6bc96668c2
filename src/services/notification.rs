//! Notification service client
//!
//! Notifications are best effort: a failed delivery is logged and never
//! changes the outcome of the request that triggered it.

use reqwest::Method;
use serde::Serialize;
use tracing::{debug, warn};

use crate::models::ObjectId;
use crate::resilience::{CallContext, CallOutcome, ResilientClient};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationRequest<'a> {
    user_id: ObjectId,
    message: &'a str,
}

#[derive(Clone)]
pub struct NotificationClient {
    client: ResilientClient,
}

impl NotificationClient {
    pub fn new(client: ResilientClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ResilientClient {
        &self.client
    }

    /// `POST /notifications`
    pub async fn send(&self, ctx: &CallContext, user_id: ObjectId, message: &str) -> CallOutcome<()> {
        self.client
            .request(Method::POST, "/notifications")
            .json(&NotificationRequest { user_id, message })
            .send(ctx)
            .await
    }

    /// Send and log the outcome; never fails
    pub async fn notify(&self, ctx: &CallContext, user_id: ObjectId, message: &str) {
        match self.send(ctx, user_id, message).await {
            Ok(()) => debug!(%user_id, "Notification delivered"),
            Err(e) => warn!(%user_id, error = %e, "Failed to deliver notification"),
        }
    }
}
