//! JSON-RPC over HTTP with bounded retries.
//!
//! Transient failures (see [`RpcError::is_retryable`]) are retried with
//! exponential backoff, honouring `Retry-After` when a node rate-limits us.

use std::time::Duration;

use l2scope_common::config::RpcSettings;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::error::RpcError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each one after it.
    pub base_backoff: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self::from(&RpcSettings::default())
    }
}

impl From<&RpcSettings> for RpcConfig {
    fn from(settings: &RpcSettings) -> Self {
        Self {
            timeout: Duration::from_secs(settings.timeout_secs),
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            max_retries: settings.max_retries,
            base_backoff: Duration::from_millis(settings.base_backoff_ms),
        }
    }
}

impl RpcConfig {
    /// Wait before retry number `retry` (0-based) after `err`.
    pub fn backoff(&self, err: &RpcError, retry: u32) -> Duration {
        match err.retry_after() {
            Some(secs) => Duration::from_secs(secs),
            None => self
                .base_backoff
                .saturating_mul(2u32.saturating_pow(retry)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    url: Url,
    config: RpcConfig,
}

impl RpcClient {
    pub fn with_config(url: Url, config: RpcConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { http, url, config }
    }

    /// Call `method` and deserialize its `result`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, RpcError> {
        let result = self.call(method, params).await?;
        serde_json::from_value(result).map_err(|err| RpcError::ParseError {
            method: method.into(),
            field: "result".into(),
            cause: err.to_string(),
        })
    }

    /// Call `method`, retrying transient failures up to `max_retries` times.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let mut retries = 0;
        loop {
            let err = match self.send(method, &payload).await {
                Ok(result) => return Ok(result),
                Err(err) => err,
            };
            if !err.is_retryable() || retries == self.config.max_retries {
                if retries == 0 {
                    return Err(err);
                }
                return Err(RpcError::RetryExhausted {
                    method: method.into(),
                    attempts: retries + 1,
                    last_error: Box::new(err),
                });
            }
            let wait = self.config.backoff(&err, retries);
            debug!(method, retries, ?wait, %err, "Transient RPC failure, retrying");
            tokio::time::sleep(wait).await;
            retries += 1;
        }
    }

    async fn send(&self, method: &str, payload: &Value) -> Result<Value, RpcError> {
        let response = self
            .http
            .post(self.url.clone())
            .json(payload)
            .send()
            .await
            .map_err(|err| self.transport_error(method, &err))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse().ok());
            return Err(RpcError::HttpError {
                method: method.into(),
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
                retry_after_secs,
            });
        }

        let envelope: Value = response.json().await.map_err(|err| RpcError::ParseError {
            method: method.into(),
            field: "body".into(),
            cause: err.to_string(),
        })?;
        parse_response(method, envelope)
    }

    fn transport_error(&self, method: &str, err: &reqwest::Error) -> RpcError {
        if err.is_timeout() {
            RpcError::Timeout {
                method: method.into(),
                elapsed_ms: u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            RpcError::ConnectionFailed {
                url: self.url.to_string(),
                cause: err.to_string(),
            }
        }
    }
}

/// Split a JSON-RPC envelope into its `result` or `error`.
///
/// A `null` result is a valid answer (an unmined receipt, for instance).
pub(crate) fn parse_response(method: &str, mut envelope: Value) -> Result<Value, RpcError> {
    if let Some(error) = envelope.get("error") {
        return Err(RpcError::JsonRpcError {
            method: method.into(),
            code: error.get("code").and_then(Value::as_i64).unwrap_or(-1),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("no message")
                .to_string(),
        });
    }
    match envelope.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(RpcError::ParseError {
            method: method.into(),
            field: "result".into(),
            cause: "field is absent".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_config(max_retries: u32) -> RpcConfig {
        RpcConfig {
            timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(1),
            max_retries,
            base_backoff: Duration::from_millis(1),
        }
    }

    #[test]
    fn backoff_doubles_unless_the_node_says_otherwise() {
        let config = RpcConfig {
            base_backoff: Duration::from_millis(250),
            ..RpcConfig::default()
        };
        let refused = RpcError::ConnectionFailed {
            url: "http://node".into(),
            cause: "refused".into(),
        };
        assert_eq!(config.backoff(&refused, 0), Duration::from_millis(250));
        assert_eq!(config.backoff(&refused, 3), Duration::from_secs(2));

        let limited = RpcError::HttpError {
            method: "eth_call".into(),
            status: 429,
            body: String::new(),
            retry_after_secs: Some(5),
        };
        assert_eq!(config.backoff(&limited, 3), Duration::from_secs(5));
    }

    #[test]
    fn envelopes_are_split_into_result_or_error() {
        assert_eq!(
            parse_response("eth_blockNumber", json!({"jsonrpc": "2.0", "id": 1, "result": "0x10"}))
                .unwrap(),
            json!("0x10")
        );
        assert_eq!(
            parse_response(
                "eth_getTransactionReceipt",
                json!({"jsonrpc": "2.0", "id": 1, "result": null}),
            )
            .unwrap(),
            Value::Null
        );

        let rejected = parse_response(
            "eth_sendRawTransaction",
            json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32000, "message": "nonce too low"}}),
        )
        .unwrap_err();
        assert!(matches!(
            rejected,
            RpcError::JsonRpcError { code: -32000, ref message, .. } if message == "nonce too low"
        ));

        let empty = parse_response("eth_blockNumber", json!({"jsonrpc": "2.0", "id": 1}));
        assert!(matches!(empty, Err(RpcError::ParseError { .. })));
    }

    #[tokio::test]
    async fn unreachable_node_exhausts_retries() {
        // Nothing listens on the discard port.
        let url = Url::parse("http://127.0.0.1:9").unwrap();
        let client = RpcClient::with_config(url, quick_config(2));

        match client.call("eth_chainId", json!([])).await.unwrap_err() {
            RpcError::RetryExhausted {
                attempts,
                last_error,
                ..
            } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last_error, RpcError::ConnectionFailed { .. }));
            }
            other => panic!("expected RetryExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn permanent_failures_are_not_wrapped() {
        let url = Url::parse("http://127.0.0.1:9").unwrap();
        let client = RpcClient::with_config(url, quick_config(0));
        let err = client.call("eth_chainId", json!([])).await.unwrap_err();
        assert!(matches!(err, RpcError::ConnectionFailed { .. }));
    }
}
