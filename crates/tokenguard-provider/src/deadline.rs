//! Deadline wrapper
//!
//! Bounds the wall-clock time a caller waits for one token request.
//! On overrun only the caller's wait is abandoned: the inner request keeps
//! running on its own task, still drives the provider's state machine, and
//! its result is discarded.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use tokenguard_core::{Result, Token, TokenError, TokenStrategy};

use crate::provider::TokenProvider;
use crate::state::ProviderState;

/// Provider that fails requests running past a deadline
pub struct DeadlineTokenProvider {
    inner: Arc<dyn TokenProvider>,
    deadline: Duration,
}

impl DeadlineTokenProvider {
    /// Wrap `inner`; a zero deadline disables the timer
    pub fn new(inner: Arc<dyn TokenProvider>, deadline: Duration) -> Self {
        Self { inner, deadline }
    }

    /// The configured deadline
    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

#[async_trait]
impl TokenProvider for DeadlineTokenProvider {
    fn state(&self) -> ProviderState {
        self.inner.state()
    }

    async fn provide_token(&self, strategy: TokenStrategy) -> Result<Token> {
        if self.deadline.is_zero() {
            return self.inner.provide_token(strategy).await;
        }

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move { inner.provide_token(strategy).await });

        match tokio::time::timeout(self.deadline, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(TokenError::Internal(format!("token request task failed: {}", e))),
            Err(_) => {
                warn!(
                    deadline_ms = self.deadline.as_millis() as u64,
                    strategy = %strategy,
                    "Token request exceeded deadline"
                );
                Err(TokenError::DeadlineExceeded(self.deadline))
            }
        }
    }
}
