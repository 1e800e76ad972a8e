//! Relying-party error types.
//!
//! This module defines errors raised while constructing a relying party,
//! building authentication requests, and decoding protocol messages.

use std::sync::Arc;

use openid_rp_storage::{BoxError, StorageError};
use thiserror::Error;

/// Errors raised by relying-party operations.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`; new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RelyingPartyError {
    /// A constructor or operation argument was inconsistent.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation needs an inbound request or application state that was
    /// not supplied.
    #[error("Request context unavailable: {0}")]
    ContextUnavailable(String),

    /// The user-supplied identifier is not a valid OpenID identifier.
    #[error("Invalid identifier '{identifier}': {reason}")]
    InvalidIdentifier {
        /// The offending input, trimmed.
        identifier: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The realm is malformed.
    #[error("Invalid realm '{realm}': {reason}")]
    InvalidRealm {
        /// The offending realm text.
        realm: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No OpenID endpoint could be discovered for an identifier.
    #[error("Discovery failed for {identifier}: {message}")]
    DiscoveryFailed {
        /// The identifier discovery ran against.
        identifier: String,
        /// What went wrong.
        message: String,
        /// The underlying transport or parse error, when there is one.
        #[source]
        source: Option<BoxError>,
    },

    /// A URL involved in the request is not HTTPS while SSL is required.
    #[error("Secure connection required: {0}")]
    SslRequired(String),

    /// A protocol message could not be encoded or decoded.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The association and nonce store failed.
    ///
    /// Wraps the original [`StorageError`] to preserve the source chain.
    #[error("Storage error: {0}")]
    Storage(
        /// The underlying storage error.
        #[from]
        StorageError,
    ),

    /// Settings are invalid, or shared application state holds a value of
    /// the wrong type.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RelyingPartyError {
    /// Creates an `InvalidIdentifier` error.
    #[must_use]
    pub fn invalid_identifier(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier { identifier: identifier.into(), reason: reason.into() }
    }

    /// Creates an `InvalidRealm` error.
    #[must_use]
    pub fn invalid_realm(realm: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRealm { realm: realm.into(), reason: reason.into() }
    }

    /// Creates a `DiscoveryFailed` error without an underlying source.
    #[must_use]
    pub fn discovery_failed(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DiscoveryFailed { identifier: identifier.into(), message: message.into(), source: None }
    }

    /// Creates a `DiscoveryFailed` error carrying the error that caused it.
    #[must_use]
    pub fn discovery_failed_with_source(
        identifier: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::DiscoveryFailed {
            identifier: identifier.into(),
            message: message.into(),
            source: Some(Arc::new(source)),
        }
    }
}

/// A malformed or unacceptable protocol message.
///
/// Response parsers report failures with this type; the relying party turns
/// it into a [`Failed`](crate::AuthenticationStatus::Failed) response rather
/// than propagating it.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProtocolError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl ProtocolError {
    /// Creates a protocol error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), source: None }
    }

    /// Creates a protocol error with a message and source error.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type alias for relying-party operations.
pub type Result<T> = std::result::Result<T, RelyingPartyError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn test_error_display() {
        let err = RelyingPartyError::InvalidArgument("query is required".into());
        assert_eq!(err.to_string(), "Invalid argument: query is required");

        let err = RelyingPartyError::invalid_identifier("ftp://x", "unsupported scheme");
        assert_eq!(err.to_string(), "Invalid identifier 'ftp://x': unsupported scheme");

        let err = RelyingPartyError::invalid_realm("http://a#b", "fragment not allowed");
        assert_eq!(err.to_string(), "Invalid realm 'http://a#b': fragment not allowed");

        let err = RelyingPartyError::discovery_failed("http://u.example", "no endpoint");
        assert_eq!(err.to_string(), "Discovery failed for http://u.example: no endpoint");
    }

    #[test]
    fn test_storage_error_preserves_source_chain() {
        let err: RelyingPartyError = StorageError::connection("connection refused").into();
        assert_eq!(err.to_string(), "Storage error: Connection error: connection refused");

        let source = err.source().expect("source exists");
        assert_eq!(source.to_string(), "Connection error: connection refused");
    }

    #[test]
    fn test_protocol_error_conversion() {
        let err: RelyingPartyError = ProtocolError::new("missing openid.mode").into();
        assert!(matches!(err, RelyingPartyError::Protocol(_)));
        assert_eq!(err.to_string(), "Protocol error: missing openid.mode");
    }

    #[test]
    fn test_protocol_error_source() {
        let io = std::io::Error::other("truncated");
        let err = ProtocolError::with_source("bad key-value form", io);
        assert_eq!(err.message(), "bad key-value form");
        assert_eq!(err.source().map(ToString::to_string).as_deref(), Some("truncated"));
        assert!(ProtocolError::new("x").source().is_none());
    }

    #[test]
    fn test_discovery_error_source() {
        let io = std::io::Error::other("refused");
        let err = RelyingPartyError::discovery_failed_with_source("=alice", "fetch failed", io);
        assert!(err.source().is_some());
    }
}
