//! Breaker-guarded HTTP client for sibling services
//!
//! Every outbound call goes through [`ResilientClient`], which:
//! - refuses the call up front while the service's breaker is open
//! - bounds the exchange by the caller's deadline
//! - reports the outcome to the breaker (non-2xx and transport errors are failures)
//! - decodes the 2xx body into the type the call site expects

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{header::CONTENT_TYPE, Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use super::circuit_breaker::CircuitBreaker;

/// Deadline inherited from the request that triggers outbound calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallContext {
    deadline: Option<Instant>,
}

impl CallContext {
    /// Context without a deadline; the transport's own defaults apply
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Why a downstream call did not produce a value
#[derive(Debug, Error)]
pub enum CallError {
    /// Breaker refused the call; nothing was sent
    #[error("{service} is unavailable: circuit breaker open")]
    BreakerOpen { service: String },

    /// The caller's deadline expired before a response arrived
    #[error("{method} {url} timed out")]
    Timeout { method: Method, url: String },

    /// No response was obtained
    #[error("{method} {url} failed: {source}")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// 2xx response whose body does not match the expected shape
    #[error("{method} {url} returned an unexpected body: {source}")]
    Decode {
        method: Method,
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Downstream answered with a non-2xx status
    #[error("{method} {url} responded with status {status}")]
    Remote {
        method: Method,
        url: String,
        status: StatusCode,
    },

    /// The request could not be built; nothing was sent
    #[error("invalid request to {url}: {reason}")]
    InvalidRequest { url: String, reason: String },
}

impl CallError {
    /// Transport-class failures: no usable answer, but not a timeout either
    pub fn is_transport(&self) -> bool {
        matches!(self, CallError::Transport { .. } | CallError::Decode { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CallError::Timeout { .. })
    }

    pub fn is_breaker_open(&self) -> bool {
        matches!(self, CallError::BreakerOpen { .. })
    }

    /// Status code of a [`CallError::Remote`]
    pub fn remote_status(&self) -> Option<StatusCode> {
        match self {
            CallError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result of one resilient call
pub type CallOutcome<T> = Result<T, CallError>;

/// HTTP client bound to one sibling service and its breaker
#[derive(Clone)]
pub struct ResilientClient {
    http: Client,
    base_url: String,
    breaker: Arc<CircuitBreaker>,
}

impl ResilientClient {
    pub fn new(http: Client, base_url: impl Into<String>, breaker: Arc<CircuitBreaker>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            breaker,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Start building a call to `path`, relative to the base URL
    pub fn request(&self, method: Method, path: &str) -> CallBuilder<'_> {
        CallBuilder {
            client: self,
            url: join_url(&self.base_url, path),
            method,
            body: None,
            bearer: None,
        }
    }

    /// Issue `method path` with an optional JSON body and decode the answer
    pub async fn call<B, T>(
        &self,
        ctx: &CallContext,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> CallOutcome<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder.call(ctx).await
    }
}

/// One pending call; finish with [`CallBuilder::call`] or [`CallBuilder::send`]
pub struct CallBuilder<'a> {
    client: &'a ResilientClient,
    method: Method,
    url: String,
    body: Option<Result<Vec<u8>, String>>,
    bearer: Option<String>,
}

impl CallBuilder<'_> {
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        self.body = Some(serde_json::to_vec(body).map_err(|e| e.to_string()));
        self
    }

    /// Forward the caller's bearer token
    pub fn bearer_auth(mut self, token: &str) -> Self {
        self.bearer = Some(token.to_string());
        self
    }

    /// Execute and decode the 2xx body as `T`
    pub async fn call<T: DeserializeOwned>(self, ctx: &CallContext) -> CallOutcome<T> {
        let method = self.method.clone();
        let url = self.url.clone();
        let body = self.execute(ctx).await?;

        serde_json::from_slice(&body).map_err(|source| {
            warn!(%method, %url, error = %source, "Downstream returned a body that does not match the contract");
            CallError::Decode {
                method,
                url,
                source,
            }
        })
    }

    /// Execute and discard the 2xx body
    pub async fn send(self, ctx: &CallContext) -> CallOutcome<()> {
        self.execute(ctx).await.map(|_| ())
    }

    async fn execute(mut self, ctx: &CallContext) -> Result<Vec<u8>, CallError> {
        let body = match self.body.take().transpose() {
            Ok(body) => body,
            Err(reason) => {
                return Err(CallError::InvalidRequest {
                    url: self.url,
                    reason,
                })
            }
        };

        let client = self.client;
        let breaker = &client.breaker;
        let permit = breaker.try_acquire().map_err(|_| {
            debug!(service = %breaker.name(), url = %self.url, "Call rejected by open circuit breaker");
            CallError::BreakerOpen {
                service: breaker.name().to_string(),
            }
        })?;

        if ctx.is_expired() {
            // Never dispatched: the permit is dropped unreported
            return Err(self.timeout_error());
        }

        let mut request = client.http.request(self.method.clone(), &self.url);
        if let Some(ref token) = self.bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        debug!(method = %self.method, url = %self.url, "Sending downstream request");

        let response = match within(ctx, request.send()).await {
            Some(Ok(response)) => response,
            Some(Err(err)) => {
                permit.failure();
                return Err(self.transport_error(err));
            }
            None => {
                permit.failure();
                return Err(self.timeout_error());
            }
        };

        let status = response.status();
        if !status.is_success() {
            permit.failure();
            warn!(
                service = %breaker.name(),
                method = %self.method,
                url = %self.url,
                status = status.as_u16(),
                "Downstream responded with an error status"
            );
            return Err(CallError::Remote {
                method: self.method,
                url: self.url,
                status,
            });
        }

        match within(ctx, response.bytes()).await {
            Some(Ok(bytes)) => {
                permit.success();
                Ok(bytes.to_vec())
            }
            Some(Err(err)) => {
                permit.failure();
                Err(self.transport_error(err))
            }
            None => {
                permit.failure();
                Err(self.timeout_error())
            }
        }
    }

    fn timeout_error(&self) -> CallError {
        warn!(
            service = %self.client.breaker.name(),
            method = %self.method,
            url = %self.url,
            "Request deadline expired before the downstream answered"
        );
        CallError::Timeout {
            method: self.method.clone(),
            url: self.url.clone(),
        }
    }

    /// Failures of the transport itself, including its own connect/read
    /// timeouts; only the caller's deadline yields [`CallError::Timeout`]
    fn transport_error(&self, err: reqwest::Error) -> CallError {
        warn!(
            service = %self.client.breaker.name(),
            method = %self.method,
            url = %self.url,
            is_connect = err.is_connect(),
            is_timeout = err.is_timeout(),
            error = %err,
            "Downstream request failed"
        );

        CallError::Transport {
            method: self.method.clone(),
            url: self.url.clone(),
            source: err,
        }
    }
}

/// Run `fut` until the caller's deadline; `None` once it has passed
async fn within<F: Future>(ctx: &CallContext, fut: F) -> Option<F::Output> {
    match ctx.deadline() {
        Some(at) => timeout_at(at, fut).await.ok(),
        None => Some(fut.await),
    }
}

fn join_url(base: &str, path: &str) -> String {
    if path.is_empty() {
        base.to_string()
    } else if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}
