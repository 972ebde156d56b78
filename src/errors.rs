//! Error types for the x402-gate library.
//!
//! [`X402Error`] mostly covers what can go wrong while building a gate: bad
//! route tables, prices, addresses and networks. The few per-request failures
//! (an unusable `Host` header) are turned into a
//! [`Rejection`](crate::gate::Rejection) by the gate.

use thiserror::Error;

/// Main error type for x402-gate operations.
#[derive(Error, Debug)]
pub enum X402Error {
    /// Error during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error reading a configuration file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Unsupported or unknown network
    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),

    /// Invalid address format, or an address that does not belong to the network's chain family
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Invalid route pattern
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    /// Request `Host` header that cannot form a resource URL
    #[error("Invalid host: {0}")]
    InvalidHost(String),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error parsing URL
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),
}

/// Result type alias for x402-gate operations.
pub type Result<T> = std::result::Result<T, X402Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = X402Error::InvalidAmount("test error".to_string());
        assert_eq!(err.to_string(), "Invalid amount: test error");

        let err = X402Error::ConfigError("no default asset for base".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: no default asset for base"
        );
    }

    #[test]
    fn test_error_conversion() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let x402_err: X402Error = json_err.into();
        assert!(matches!(x402_err, X402Error::JsonError(_)));

        let url_err = url::Url::parse("not a url").unwrap_err();
        let x402_err: X402Error = url_err.into();
        assert!(matches!(x402_err, X402Error::UrlParseError(_)));
    }
}
