//! Outbound JSON-RPC client.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{Result, RpcError};
use crate::message::{ErrorObject, JsonRpcRequest};

/// Client for a single named collaborator.
///
/// Each call opens its own connection (idle pooling is disabled), is attempted
/// exactly once, and is bounded by the timeout passed to [`RpcClient::call`].
/// Clones share the request ID counter.
#[derive(Debug, Clone)]
pub struct RpcClient {
    collaborator: String,
    endpoint: String,
    http: reqwest::Client,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    /// Creates a client for `collaborator` listening at `endpoint`.
    ///
    /// Fails if the unpooled HTTP client cannot be built; there is no pooled
    /// fallback.
    pub fn new(collaborator: impl Into<String>, endpoint: impl Into<String>) -> Result<Self> {
        let collaborator = collaborator.into();
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| RpcError::ClientSetup {
                collaborator: collaborator.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            collaborator,
            endpoint: endpoint.into(),
            http,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Returns the collaborator name used in errors and metrics.
    pub fn collaborator(&self) -> &str {
        &self.collaborator
    }

    /// Returns the endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Calls `method` with `params` and decodes the `result` member as `R`.
    ///
    /// `timeout` of `None` waits indefinitely.
    #[tracing::instrument(skip(self, params), fields(collaborator = %self.collaborator))]
    pub async fn call<P, R>(&self, method: &str, params: &P, timeout: Option<Duration>) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        metrics::counter!(
            "rpc_calls_total",
            "collaborator" => self.collaborator.clone(),
            "method" => method.to_string()
        )
        .increment(1);

        let result = self.dispatch(method, params, timeout).await;
        if let Err(e) = &result {
            metrics::counter!(
                "rpc_failures_total",
                "collaborator" => self.collaborator.clone(),
                "method" => method.to_string(),
                "kind" => e.kind()
            )
            .increment(1);
            tracing::debug!(error = %e, "rpc call failed");
        }
        result
    }

    async fn dispatch<P, R>(&self, method: &str, params: &P, timeout: Option<Duration>) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(method, params, id);

        let mut builder = self.http.post(&self.endpoint).json(&request);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.classify(method, e))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.classify(method, e))?;

        // Decoded as a map: `"result": null` is a valid success and must stay
        // distinguishable from a missing `result`.
        let mut envelope: Map<String, Value> = serde_json::from_slice(&body).map_err(|e| {
            let reason = if status.is_success() {
                format!("undecodable body: {e}")
            } else {
                format!("HTTP {status} with undecodable body")
            };
            self.malformed(method, reason)
        })?;

        if let Some(error) = envelope.remove("error").filter(|e| !e.is_null()) {
            let reason = match serde_json::from_value::<ErrorObject>(error.clone()) {
                Ok(error) => error.to_string(),
                Err(_) => format!("remote error {error}"),
            };
            return Err(self.malformed(method, reason));
        }

        let echoed = envelope.get("id").unwrap_or(&Value::Null);
        if *echoed != Value::from(id) {
            return Err(self.malformed(
                method,
                format!("response id {echoed} does not echo request id {id}"),
            ));
        }

        let result = envelope
            .remove("result")
            .ok_or_else(|| self.malformed(method, "neither result nor error present".to_string()))?;

        serde_json::from_value(result)
            .map_err(|e| self.malformed(method, format!("unexpected result shape: {e}")))
    }

    fn classify(&self, method: &str, err: reqwest::Error) -> RpcError {
        if err.is_timeout() {
            RpcError::Timeout {
                collaborator: self.collaborator.clone(),
                method: method.to_string(),
            }
        } else if err.is_decode() {
            self.malformed(method, err.to_string())
        } else {
            RpcError::Unreachable {
                collaborator: self.collaborator.clone(),
                method: method.to_string(),
                reason: err.to_string(),
            }
        }
    }

    fn malformed(&self, method: &str, reason: String) -> RpcError {
        RpcError::MalformedResponse {
            collaborator: self.collaborator.clone(),
            method: method.to_string(),
            reason,
        }
    }
}
