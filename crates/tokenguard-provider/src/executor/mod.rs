//! Token executors - single attempts against the remote attestation service

pub mod mock;

pub use mock::{MockExecutor, MockStep};

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use tokenguard_core::TokenStrategy;

/// Message used when the remote service fails without one
pub const DEFAULT_FAILURE_MESSAGE: &str = "AppCheck failed";

/// Failure of a single executor attempt
///
/// Opaque to the provider except for its message, which is classified.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ExecutorError {
    /// Failure message reported by the remote service
    pub message: String,
    /// Service-specific error code, if any
    pub code: Option<i32>,
}

impl ExecutorError {
    /// Create an error with the given message
    ///
    /// An empty message is replaced with [`DEFAULT_FAILURE_MESSAGE`].
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            message: if message.trim().is_empty() {
                DEFAULT_FAILURE_MESSAGE.to_string()
            } else {
                message
            },
            code: None,
        }
    }

    /// Attach a service error code
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }
}

/// Performs one attempt to obtain a token from the remote service
///
/// Implementations must not retry internally and must tolerate being
/// called repeatedly. The provider serializes calls, so an executor never
/// sees overlapping attempts from the same provider.
#[async_trait]
pub trait TokenExecutor: Send + Sync {
    /// Request a token using `strategy`
    ///
    /// # Returns
    /// * `Ok(String)` - The raw token (may be empty if the service misbehaves)
    /// * `Err(ExecutorError)` - If the attempt failed
    async fn attempt(&self, strategy: TokenStrategy) -> Result<String, ExecutorError>;

    /// Get a description of this executor (for logging)
    fn description(&self) -> &str {
        "token executor"
    }
}

#[async_trait]
impl<T: TokenExecutor + ?Sized> TokenExecutor for Arc<T> {
    async fn attempt(&self, strategy: TokenStrategy) -> Result<String, ExecutorError> {
        (**self).attempt(strategy).await
    }

    fn description(&self) -> &str {
        (**self).description()
    }
}
