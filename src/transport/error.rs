//! Upstream RPC errors.

use super::timeout::RequestTimeout;
use alloy::transports::{TransportError, TransportErrorKind};
use thiserror::Error;

/// JSON-RPC error code returned for unknown methods.
const METHOD_NOT_FOUND_CODE: i64 = -32601;

/// A failed upstream call.
///
/// Only the [`RpcErrorKind`] is rendered so that a row error reads like `request timed out`; the
/// chain and method are carried as fields for logs and metrics.
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct RpcError {
    /// Key of the chain the call was made to.
    pub chain: String,
    /// The JSON-RPC method.
    pub method: &'static str,
    /// What went wrong.
    pub kind: RpcErrorKind,
}

impl RpcError {
    /// Creates a new [`RpcError`].
    pub fn new(chain: impl Into<String>, method: &'static str, kind: RpcErrorKind) -> Self {
        Self { chain: chain.into(), method, kind }
    }

    /// Classifies an alloy [`TransportError`].
    pub fn from_transport(chain: &str, method: &'static str, err: TransportError) -> Self {
        let kind = if err.is_timeout() {
            RpcErrorKind::Timeout
        } else if err.is_method_not_found() {
            RpcErrorKind::MethodNotFound
        } else {
            match err {
                TransportError::ErrorResp(payload) => RpcErrorKind::ErrorResponse {
                    code: payload.code,
                    message: payload.message.to_string(),
                },
                TransportError::NullResp => RpcErrorKind::Malformed("null response".to_string()),
                TransportError::DeserError { err, .. } => RpcErrorKind::Malformed(err.to_string()),
                TransportError::Transport(kind) => RpcErrorKind::Transport(kind.to_string()),
                other => RpcErrorKind::Transport(other.to_string()),
            }
        };
        Self::new(chain, method, kind)
    }

    /// Whether the upstream does not implement the method.
    pub fn is_method_not_found(&self) -> bool {
        matches!(self.kind, RpcErrorKind::MethodNotFound)
    }

    /// Whether the call ran into the request timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, RpcErrorKind::Timeout)
    }
}

/// Failure classes of an upstream call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcErrorKind {
    /// No response within the configured timeout.
    #[error("request timed out")]
    Timeout,
    /// The node does not implement the method.
    #[error("method not found")]
    MethodNotFound,
    /// The node answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    ErrorResponse {
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },
    /// Connection or HTTP level failure.
    #[error("http error: {0}")]
    Transport(String),
    /// The result could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// An extension trait for [`TransportError`].
pub trait TransportErrExt {
    /// Returns true if the node rejected the call because it does not know the method.
    ///
    /// Besides the standard `-32601` code this matches the messages geth and some hosted
    /// providers return with a generic code.
    fn is_method_not_found(&self) -> bool;

    /// Returns true if the error was produced by the
    /// [`TimeoutLayer`](super::timeout::TimeoutLayer).
    fn is_timeout(&self) -> bool;
}

impl TransportErrExt for TransportError {
    fn is_method_not_found(&self) -> bool {
        self.as_error_resp()
            .map(|err| {
                let message = err.message.to_ascii_lowercase();
                err.code == METHOD_NOT_FOUND_CODE
                    || message.contains("method not found")
                    || (message.starts_with("the method") && message.contains("does not exist"))
            })
            .unwrap_or_default()
    }

    fn is_timeout(&self) -> bool {
        match self {
            TransportError::Transport(TransportErrorKind::Custom(err)) => {
                err.downcast_ref::<RequestTimeout>().is_some()
            }
            _ => false,
        }
    }
}
