//! Gasboard API errors.
//!
//! Fee estimation failures are reported inside the rows of a response, so the only errors the API
//! itself returns are about the request.

use jsonrpsee::types::error::{ErrorObject, INVALID_PARAMS_CODE};
use thiserror::Error;

/// Errors returned by the `fees_` namespace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// A requested currency is not a currency code.
    #[error("invalid currency code '{0}'")]
    InvalidCurrency(String),
    /// More currencies were requested than a response may carry.
    #[error("too many currencies requested: {requested}, at most {max} are allowed")]
    TooManyCurrencies {
        /// Number of requested currencies.
        requested: usize,
        /// Maximum number of currencies.
        max: usize,
    },
}

impl From<ApiError> for ErrorObject<'static> {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::InvalidCurrency(_) | ApiError::TooManyCurrencies { .. } => {
                invalid_params(err.to_string())
            }
        }
    }
}

/// Constructs an invalid params JSON‑RPC error.
fn invalid_params(msg: impl Into<String>) -> ErrorObject<'static> {
    rpc_err(INVALID_PARAMS_CODE, msg)
}

/// Constructs a JSON‑RPC error with `code` and `message`.
fn rpc_err(code: i32, msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned(code, msg.into(), None::<()>)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_to_invalid_params() {
        let err: ErrorObject<'static> = ApiError::InvalidCurrency("U$D".into()).into();
        assert_eq!(err.code(), INVALID_PARAMS_CODE);
        assert_eq!(err.message(), "invalid currency code 'U$D'");
        assert!(err.data().is_none());
    }
}
