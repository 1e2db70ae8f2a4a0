//! Error types for the chain, compiler and oracle collaborators.

use ethereum_types::H256;

/// Failure of a single JSON-RPC exchange, or of all its retries.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RpcError {
    #[error("Cannot reach {url}: {cause}")]
    ConnectionFailed { url: String, cause: String },

    #[error("{method} got no answer within {elapsed_ms}ms")]
    Timeout { method: String, elapsed_ms: u64 },

    #[error("{method} returned HTTP {status}: {body}")]
    HttpError {
        method: String,
        status: u16,
        body: String,
        /// Seconds from the `Retry-After` header, when the node sent one.
        retry_after_secs: Option<u64>,
    },

    #[error("{method} rejected with code {code}: {message}")]
    JsonRpcError {
        method: String,
        code: i64,
        message: String,
    },

    #[error("Malformed {method} response ({field}): {cause}")]
    ParseError {
        method: String,
        field: String,
        cause: String,
    },

    #[error("{method} still failing after {attempts} attempt(s): {last_error}")]
    RetryExhausted {
        method: String,
        attempts: u32,
        last_error: Box<RpcError>,
    },
}

impl RpcError {
    /// Connection drops, timeouts, rate limiting and gateway errors.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RpcError::ConnectionFailed { .. }
                | RpcError::Timeout { .. }
                | RpcError::HttpError {
                    status: 429 | 502 | 503 | 504,
                    ..
                }
        )
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            RpcError::HttpError {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }

    /// The innermost error, unwrapping retry exhaustion.
    pub fn root(&self) -> &RpcError {
        match self {
            RpcError::RetryExhausted { last_error, .. } => last_error.root(),
            other => other,
        }
    }

    /// Whether the node rejected the method itself, as opposed to the call.
    ///
    /// Public endpoints answer `debug_*` with -32601, or with -32000 and a
    /// "not supported"/"not available" message.
    pub fn is_method_unavailable(&self) -> bool {
        match self.root() {
            RpcError::JsonRpcError { code, message, .. } => {
                let message = message.to_ascii_lowercase();
                *code == -32601
                    || message.contains("method not found")
                    || message.contains("not supported")
                    || message.contains("not available")
                    || message.contains("does not exist")
            }
            RpcError::HttpError { status, .. } => matches!(*status, 403 | 404 | 405),
            _ => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChainClientError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("Tracing unsupported by node ({method}): {reason}")]
    TracingUnsupported { method: String, reason: String },

    #[error("No receipt for {hash:#x} after {waited_secs}s")]
    ReceiptTimeout { hash: H256, waited_secs: u64 },

    #[error("Deployment failed: {0}")]
    DeploymentFailed(String),

    #[error("Transaction {0:#x} reverted")]
    Reverted(H256),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error(transparent)]
    Abi(#[from] AbiError),

    #[error("Unexpected response: {0}")]
    Custom(String),
}

impl ChainClientError {
    /// Classify a failed `debug_traceTransaction` call.
    pub fn from_trace_error(method: &str, err: RpcError) -> Self {
        if err.is_method_unavailable() {
            ChainClientError::TracingUnsupported {
                method: method.to_string(),
                reason: err.root().to_string(),
            }
        } else {
            ChainClientError::Rpc(err)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("Invalid private key: {0}")]
    InvalidKey(String),
    #[error("Failed to convert recovery id: {0}")]
    RecoveryId(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AbiError {
    #[error("Function `{0}` not found in ABI")]
    FunctionNotFound(String),
    #[error("Function `{function}` expects {expected} argument(s), got {got}")]
    ArgumentCount {
        function: String,
        expected: usize,
        got: usize,
    },
    #[error("Invalid {ty} argument `{value}`: {reason}")]
    InvalidArgument {
        ty: String,
        value: String,
        reason: String,
    },
    #[error("Unsupported ABI type: {0}")]
    UnsupportedType(String),
    #[error("Malformed ABI: {0}")]
    Malformed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CompilerError {
    #[error("Compilation failed:\n{}", .0.join("\n"))]
    Compilation(Vec<String>),
    #[error("Contract `{0}` not found in compiler output")]
    ContractNotFound(String),
    #[error("Failed to run compiler: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Invalid compiler output: {0}")]
    InvalidOutput(String),
}

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("No price available for {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16, retry_after_secs: Option<u64>) -> RpcError {
        RpcError::HttpError {
            method: "eth_getBalance".into(),
            status,
            body: String::new(),
            retry_after_secs,
        }
    }

    #[test]
    fn transient_failures_are_retried() {
        assert!(
            RpcError::ConnectionFailed {
                url: "http://127.0.0.1:8545".into(),
                cause: "connection refused".into(),
            }
            .is_retryable()
        );
        assert!(http(503, None).is_retryable());

        let limited = http(429, Some(7));
        assert!(limited.is_retryable());
        assert_eq!(limited.retry_after(), Some(7));

        assert!(!http(401, None).is_retryable());
        assert!(!http(404, None).is_retryable());
        assert_eq!(http(500, Some(3)).retry_after(), Some(3));
        assert!(!http(500, None).is_retryable());
        assert!(
            !RpcError::JsonRpcError {
                method: "eth_sendRawTransaction".into(),
                code: -32000,
                message: "nonce too low".into(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn detects_missing_debug_namespace() {
        let missing = RpcError::JsonRpcError {
            method: "debug_traceTransaction".into(),
            code: -32601,
            message: "the method debug_traceTransaction does not exist/is not available".into(),
        };
        assert!(missing.is_method_unavailable());

        let wrapped = RpcError::RetryExhausted {
            method: "debug_traceTransaction".into(),
            attempts: 2,
            last_error: Box::new(missing),
        };
        assert!(wrapped.is_method_unavailable());

        let reverted = RpcError::JsonRpcError {
            method: "debug_traceTransaction".into(),
            code: -32000,
            message: "transaction 0xabc not found".into(),
        };
        assert!(!reverted.is_method_unavailable());
    }

    #[test]
    fn classifies_trace_errors() {
        let unsupported = ChainClientError::from_trace_error(
            "debug_traceTransaction",
            RpcError::JsonRpcError {
                method: "debug_traceTransaction".into(),
                code: -32000,
                message: "tracing is not supported on this endpoint".into(),
            },
        );
        assert!(matches!(unsupported, ChainClientError::TracingUnsupported { .. }));

        let transient = ChainClientError::from_trace_error(
            "debug_traceTransaction",
            RpcError::Timeout {
                method: "debug_traceTransaction".into(),
                elapsed_ms: 30_000,
            },
        );
        assert!(matches!(transient, ChainClientError::Rpc(_)));
    }

    #[test]
    fn compilation_error_lists_every_diagnostic() {
        let err = CompilerError::Compilation(vec![
            "ParserError: Expected ';'".into(),
            "TypeError: Undeclared identifier".into(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("Expected ';'"));
        assert!(msg.contains("Undeclared identifier"));
    }
}
