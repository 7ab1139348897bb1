// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Soporte sync client.

use std::time::Duration;

use thiserror::Error;

/// The primary error type shared by every Soporte crate.
///
/// Network and credential failures are carried as values; callers turn them
/// into state flags (connection status, banners) rather than panicking.
#[derive(Debug, Error)]
pub enum SoporteError {
    /// Configuration errors (invalid TOML, bad URLs, out-of-range values).
    #[error("configuration error: {0}")]
    Config(String),

    /// The session credential is malformed or expired. Forces a logout.
    #[error("invalid credential: {0}")]
    CredentialInvalid(String),

    /// Real-time transport failure (handshake, socket error, closed stream).
    #[error("connection error: {message}")]
    Connection {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// REST collaborator returned a non-success status or was unreachable.
    #[error("request failed: {message}")]
    RequestFailed {
        status: Option<u16>,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An entity without a usable `id`, or a payload that is not an object.
    #[error("malformed entity: {0}")]
    MalformedEntity(String),

    /// A scope join or leave was rejected by the transport.
    #[error("subscription to `{scope}` failed: {message}")]
    SubscriptionFailed { scope: String, message: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Unknown action name. The only programmer-error class.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SoporteError {
    /// Shorthand for a connection error without an underlying source.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a REST failure carrying the HTTP status.
    pub fn request(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            message: message.into(),
            source: None,
        }
    }

    /// HTTP status of a failed request, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RequestFailed { status, .. } => *status,
            _ => None,
        }
    }

    /// True when the failure means the session must be torn down.
    ///
    /// A 401 from the REST collaborator is treated the same as a credential
    /// that fails to decode locally.
    pub fn forces_logout(&self) -> bool {
        matches!(self, Self::CredentialInvalid(_)) || self.status() == Some(401)
    }
}
