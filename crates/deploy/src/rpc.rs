//! Shared JSON-RPC plumbing for talking to an execution node.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};

/// Default timeout for a single RPC request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// A JSON-RPC 2.0 client bound to one endpoint.
#[derive(Debug, Clone)]
pub struct RpcClient {
    client: reqwest::Client,
    url: Url,
}

impl RpcClient {
    /// Create a client for `url` with a per-request timeout.
    pub fn new(url: Url, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, url })
    }

    /// The endpoint this client talks to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Make a JSON-RPC call and deserialize the result.
    ///
    /// Transport failures and timeouts map to [`Error::Network`]; error
    /// responses from the node are classified by message into the crate
    /// taxonomy.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&serde_json::json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": 1
            }))
            .send()
            .await
            .map_err(|e| Error::Network(format!("failed to send {method} request: {e}")))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::Network(format!("failed to parse {method} response: {e}")))?;

        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown");
            return Err(classify_rpc_error(method, message));
        }

        let result = body
            .get("result")
            .ok_or_else(|| Error::Network(format!("no result in {method} response")))?
            .clone();

        serde_json::from_value(result)
            .map_err(|e| Error::Network(format!("failed to deserialize {method} result: {e}")))
    }
}

/// Classify a JSON-RPC error response into the crate taxonomy.
///
/// Nodes report failure reasons only through free-form messages, so this is
/// a message scan: revert markers mean the contract logic rejected the call,
/// signing/unlock markers mean the node refused to act for the account, and
/// everything else is treated as a transient node-side failure.
pub(crate) fn classify_rpc_error(method: &str, message: &str) -> Error {
    let lowered = message.to_lowercase();

    if lowered.contains("revert") {
        return Error::Reverted(format!("{method}: {message}"));
    }

    const AUTH_MARKERS: &[&str] = &[
        "authentication needed",
        "could not decrypt",
        "unknown account",
        "no key for given address",
        "account is locked",
        "invalid password",
    ];
    if AUTH_MARKERS.iter().any(|m| lowered.contains(m)) {
        return Error::Authentication(format!("{method}: {message}"));
    }

    Error::Network(format!("{method} failed: {message}"))
}
