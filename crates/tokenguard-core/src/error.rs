//! Error types for the tokenguard pipeline

use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

use crate::classify::ErrorKind;

/// Result type alias using TokenError
pub type Result<T> = std::result::Result<T, TokenError>;

/// Errors surfaced to callers of the token pipeline
///
/// Every variant is recoverable: callers are expected to treat
/// `RetryNotAllowed` and `DeadlineExceeded` as "try again later".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The remote executor failed (or returned an empty token) and no
    /// fallback credential was permitted
    #[error("Remote token request failed ({kind}): {message}")]
    RemoteCallFailed { kind: ErrorKind, message: String },

    /// A retry was attempted inside the cooldown window
    #[error("Retry is not allowed until {unblock_at}: {cause}")]
    RetryNotAllowed {
        cause: Box<TokenError>,
        unblock_at: DateTime<Utc>,
    },

    /// The deadline wrapper fired before the request completed
    #[error("Token request exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),

    /// The request queue worker is gone
    #[error("Token request queue is closed")]
    QueueClosed,

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TokenError {
    /// Whether the caller should simply retry later
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TokenError::RetryNotAllowed { .. } | TokenError::DeadlineExceeded(_)
        )
    }

    /// The error kind of the underlying remote failure, if any
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            TokenError::RemoteCallFailed { kind, .. } => Some(*kind),
            TokenError::RetryNotAllowed { cause, .. } => cause.kind(),
            _ => None,
        }
    }
}

/// Errors raised while building a fallback credential
///
/// These never leave the fallback generator: each one is mapped to a
/// sentinel token value (see [`crate::fallback::FallbackSentinel`]).
#[derive(Error, Debug)]
pub enum CredentialError {
    /// No usable public key is configured
    #[error("No encryption key configured")]
    NoEncryptionKeyConfigured,

    /// The encryption step failed
    #[error("Encryption unavailable: {0}")]
    EncryptionUnavailable(String),

    /// Invalid key material
    #[error("Invalid public key: {0}")]
    InvalidKey(String),

    /// Any other failure while assembling the credential
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for CredentialError {
    fn from(err: serde_json::Error) -> Self {
        CredentialError::Internal(err.to_string())
    }
}

impl From<base64::DecodeError> for CredentialError {
    fn from(err: base64::DecodeError) -> Self {
        CredentialError::InvalidKey(err.to_string())
    }
}

impl From<chacha20poly1305::Error> for CredentialError {
    fn from(err: chacha20poly1305::Error) -> Self {
        CredentialError::EncryptionUnavailable(err.to_string())
    }
}
