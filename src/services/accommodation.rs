//! Accommodation service client

use reqwest::Method;
use serde::Deserialize;

use crate::models::{DateRange, ObjectId, ObjectIdList};
use crate::resilience::{CallContext, CallOutcome, ResilientClient};

#[derive(Debug, Deserialize)]
struct ExistsResponse {
    exists: bool,
}

#[derive(Clone)]
pub struct AccommodationClient {
    client: ResilientClient,
}

impl AccommodationClient {
    pub fn new(client: ResilientClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ResilientClient {
        &self.client
    }

    /// Accommodations matching a date window (`POST /search`)
    pub async fn search(&self, ctx: &CallContext, range: &DateRange) -> CallOutcome<Vec<ObjectId>> {
        let list: ObjectIdList = self
            .client
            .request(Method::POST, "/search")
            .json(range)
            .call(ctx)
            .await?;
        Ok(list.object_ids)
    }

    /// Whether the accommodation is known (`GET /{id}/exists`)
    pub async fn exists(&self, ctx: &CallContext, id: ObjectId, token: &str) -> CallOutcome<bool> {
        let response: ExistsResponse = self
            .client
            .request(Method::GET, &format!("/{}/exists", id))
            .bearer_auth(token)
            .call(ctx)
            .await?;
        Ok(response.exists)
    }
}
