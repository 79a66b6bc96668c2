//! Profile service client
//!
//! Resolves usernames carried in tokens to the user identifiers the store
//! keys reservations by.

use reqwest::Method;
use serde::Deserialize;

use crate::models::ObjectId;
use crate::resilience::{CallContext, CallOutcome, ResilientClient};

#[derive(Debug, Deserialize)]
struct UserIdResponse {
    id: ObjectId,
}

#[derive(Clone)]
pub struct ProfileClient {
    client: ResilientClient,
}

impl ProfileClient {
    pub fn new(client: ResilientClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ResilientClient {
        &self.client
    }

    /// `GET /users/{username}/id` on behalf of the token's owner
    pub async fn user_id(
        &self,
        ctx: &CallContext,
        username: &str,
        token: &str,
    ) -> CallOutcome<ObjectId> {
        let path = format!("/users/{}/id", urlencoding::encode(username));
        let response: UserIdResponse = self
            .client
            .request(Method::GET, &path)
            .bearer_auth(token)
            .call(ctx)
            .await?;
        Ok(response.id)
    }
}
