//! Error types for tracelens.
//!
//! Only construction-time and resolution-time failures surface to the user;
//! per-probe and per-lookup failures are absorbed into absent data so a
//! trace runs to completion under partial failure.

use thiserror::Error;

/// Result type alias using the tracelens [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tracelens operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Raw socket creation was refused for lack of privileges.
    #[error("Permission denied: {operation} requires {required_privilege}")]
    PrivilegeDenied {
        /// The operation that was denied
        operation: String,
        /// The privilege level required
        required_privilege: String,
    },

    /// The target name did not resolve to an IPv4 address.
    #[error("Cannot resolve '{host}': {message}")]
    ResolveFailed {
        /// The host that failed to resolve
        host: String,
        /// Error message
        message: String,
    },

    /// An unknown probe protocol name was requested.
    #[error("Unknown protocol '{name}' (supported: icmp, tcp, udp)")]
    ProtocolUnsupported {
        /// The protocol name
        name: String,
    },

    /// Feature not supported on platform
    #[error("{feature} is not supported on {platform}")]
    UnsupportedOnPlatform {
        /// The feature name
        feature: String,
        /// The platform
        platform: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true if this is a privilege denied error.
    #[must_use]
    pub fn is_privilege_denied(&self) -> bool {
        matches!(self, Self::PrivilegeDenied { .. })
    }

    /// Creates a privilege denied error.
    #[must_use]
    pub fn privilege_denied(operation: impl Into<String>, required: impl Into<String>) -> Self {
        Self::PrivilegeDenied {
            operation: operation.into(),
            required_privilege: required.into(),
        }
    }

    /// Creates a resolution failure error.
    #[must_use]
    pub fn resolve_failed(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ResolveFailed {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported platform error.
    #[must_use]
    pub fn unsupported(feature: impl Into<String>, platform: impl Into<String>) -> Self {
        Self::UnsupportedOnPlatform {
            feature: feature.into(),
            platform: platform.into(),
        }
    }
}
