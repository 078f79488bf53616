//! Token providers - the cooldown state machine
//!
//! [`CooldownTokenProvider`] wraps a [`TokenExecutor`] with:
//! - a guard so that at most one request runs its critical section at a time
//! - a cooldown window after every hard failure, during which requests are
//!   refused without reaching the executor
//! - error classification and, where the [`HardFailPolicy`] permits, a
//!   fallback credential in place of a hard failure

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use tokenguard_core::{
    classify, Clock, FallbackGenerator, HardFailPolicy, Result, SystemClock, Token, TokenError,
    TokenStrategy,
};

use crate::executor::{ExecutorError, TokenExecutor};
use crate::observer::{TracingObserver, TransitionObserver, LOG_TAG};
use crate::state::ProviderState;

/// Message used when the executor reports success without a token
const EMPTY_TOKEN_MESSAGE: &str = "Token executor returned an empty token";

/// Provides attestation tokens
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current state (for diagnostics and tests)
    fn state(&self) -> ProviderState;

    /// Obtain a token
    ///
    /// # Returns
    /// * `Ok(Token)` - A genuine token, or a fallback credential when the
    ///   remote failure permits one
    /// * `Err(TokenError)` - If the request failed, was refused during
    ///   cooldown, or ran past its deadline
    async fn provide_token(&self, strategy: TokenStrategy) -> Result<Token>;
}

/// Provider enforcing single-flight execution and a cooldown after failures
pub struct CooldownTokenProvider {
    executor: Arc<dyn TokenExecutor>,
    fallback: Option<Arc<FallbackGenerator>>,
    policy: HardFailPolicy,
    cooldown: chrono::Duration,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn TransitionObserver>,
    guard: Mutex<()>,
    state: RwLock<ProviderState>,
}

impl CooldownTokenProvider {
    /// Create a provider with no cooldown and no fallback
    pub fn new(executor: Arc<dyn TokenExecutor>) -> Self {
        Self {
            executor,
            fallback: None,
            policy: HardFailPolicy::default(),
            cooldown: chrono::Duration::zero(),
            clock: Arc::new(SystemClock),
            observer: Arc::new(TracingObserver),
            guard: Mutex::new(()),
            state: RwLock::new(ProviderState::Idle),
        }
    }

    /// Block retries for `cooldown` after every failure
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = chrono::Duration::from_std(cooldown).unwrap_or(chrono::Duration::MAX);
        self
    }

    /// Answer permitted failures with a fallback credential
    pub fn with_fallback(mut self, generator: Arc<FallbackGenerator>) -> Self {
        self.fallback = Some(generator);
        self
    }

    /// Set which error kinds must fail hard
    pub fn with_policy(mut self, policy: HardFailPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the clock used for cooldown windows
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the transition observer
    pub fn with_observer(mut self, observer: Arc<dyn TransitionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Record a new state and report it
    ///
    /// Must only be called while `guard` is held.
    fn transition(&self, next: ProviderState) {
        let message = format!(
            "state changed: [{}], thread: [{:?}]",
            next,
            std::thread::current().id()
        );
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
        self.observer.on_transition(LOG_TAG, &message);
    }

    fn unblock_time(&self, failed_at: DateTime<Utc>) -> DateTime<Utc> {
        failed_at
            .checked_add_signed(self.cooldown)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Classify a failed attempt and decide between fallback and failure
    ///
    /// A served fallback leaves the state untouched: it opens no cooldown
    /// and never counts as `Ready`.
    fn handle_failure(&self, failure: ExecutorError) -> Result<Token> {
        let kind = classify(&failure.message);

        if let Some(generator) = &self.fallback {
            if self.policy.permits_fallback(kind) {
                let token = generator.generate(kind).with_message(failure.message);
                info!(kind = %kind, "Serving fallback credential");
                return Ok(token);
            }
        }

        let failed_at = self.clock.now();
        let cause = TokenError::RemoteCallFailed {
            kind,
            message: failure.message.clone(),
        };
        warn!(kind = %kind, error = %failure, "Token request failed");
        self.transition(ProviderState::Error {
            cause: cause.clone(),
            occurred_at: failed_at,
            unblock_at: self.unblock_time(failed_at),
        });
        Err(cause)
    }
}

#[async_trait]
impl TokenProvider for CooldownTokenProvider {
    fn state(&self) -> ProviderState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn provide_token(&self, strategy: TokenStrategy) -> Result<Token> {
        let _guard = self.guard.lock().await;
        debug!(
            strategy = %strategy,
            executor = self.executor.description(),
            thread = ?std::thread::current().id(),
            "Token request is executing"
        );

        if let Some((original_cause, unblock_at)) = self.state().refuse_retry(self.clock.now()) {
            debug!(unblock_at = %unblock_at, "Retry refused during cooldown");
            self.transition(ProviderState::RetryBlocked {
                original_cause: original_cause.clone(),
                unblock_at,
            });
            return Err(TokenError::RetryNotAllowed {
                cause: Box::new(original_cause),
                unblock_at,
            });
        }

        match self.executor.attempt(strategy).await {
            Ok(value) if !value.is_empty() => {
                let token = Token::genuine(value);
                self.transition(ProviderState::Ready(token.clone()));
                Ok(token)
            }
            Ok(_) => self.handle_failure(ExecutorError::new(EMPTY_TOKEN_MESSAGE)),
            Err(failure) => self.handle_failure(failure),
        }
    }
}
