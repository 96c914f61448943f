//! Error types for admission checks
use crate::request::{Exchange, RequestType};
use std::time::Duration;
use thiserror::Error;

/// Failure talking to the shared counter store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be reached (connection refused, dropped, ...).
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
    /// The store answered with an error (script failure, wrong type, ...).
    #[error("counter store error: {0}")]
    Backend(String),
}

/// Invalid rule or weight configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("rule `{key}`: window must be greater than zero")]
    ZeroWindow { key: String },
    #[error("rule `{key}`: window must be a whole number of seconds")]
    FractionalWindow { key: String },
    #[error("rule `{key}`: threshold must be greater than zero")]
    ZeroThreshold { key: String },
    #[error("unknown exchange `{0}`")]
    UnknownExchange(String),
    #[error("exchange `{0}` is configured more than once")]
    DuplicateExchange(String),
    #[error("failed to read config: {0}")]
    Io(String),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

/// Unified error type for the admission path.
///
/// Every variant is a denial: callers must not issue the outbound call when
/// `pre_check` returns an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// No limiter set handles this request type on this exchange.
    #[error("unsupported request type `{request_type}` for {exchange}")]
    UnsupportedRequestType { exchange: Exchange, request_type: RequestType },
    /// No limiter set is registered for this exchange.
    #[error("no limiters registered for {0}")]
    UnsupportedExchange(Exchange),
    /// The shared store failed; the check could not be evaluated.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The caller cancelled the check before the store answered.
    #[error("admission check cancelled")]
    Cancelled,
    /// The store did not answer within the deadline.
    #[error("admission check timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AdmissionError {
    /// Check if this error is a store failure
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }
    /// Check if this error is caller cancellation or a deadline
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Timeout(_))
    }
    /// Check if this error is a wiring problem rather than a transient one
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedRequestType { .. } | Self::UnsupportedExchange(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn unsupported_request_type_display() {
        let err = AdmissionError::UnsupportedRequestType {
            exchange: Exchange::Okx,
            request_type: RequestType::Normal,
        };
        let msg = err.to_string();
        assert!(msg.contains("unsupported request type"));
        assert!(msg.contains("request"));
        assert!(msg.contains("okx"));
        assert!(err.is_unsupported());
        assert!(!err.is_store());
    }

    #[test]
    fn store_error_is_transparent() {
        let err: AdmissionError = StoreError::Unavailable("connection refused".into()).into();
        assert_eq!(err.to_string(), "counter store unavailable: connection refused");
        assert!(err.is_store());
        assert!(err.source().is_none());
    }

    #[test]
    fn timeout_display_includes_duration() {
        let err = AdmissionError::Timeout(Duration::from_millis(250));
        assert!(err.to_string().contains("250ms"));
        assert!(err.is_cancelled());
        assert!(AdmissionError::Cancelled.is_cancelled());
    }

    #[test]
    fn config_error_wraps() {
        let err: AdmissionError = ConfigError::ZeroWindow { key: "binance:spot:x".into() }.into();
        assert!(err.to_string().contains("binance:spot:x"));
    }
}
