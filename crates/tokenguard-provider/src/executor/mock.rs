//! Mock Token Executor
//!
//! For testing purposes - replays a script of outcomes.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::executor::{ExecutorError, TokenExecutor};
use tokenguard_core::TokenStrategy;

/// One scripted attempt
#[derive(Debug, Clone)]
pub struct MockStep {
    outcome: Result<String, ExecutorError>,
    latency: Duration,
}

impl MockStep {
    /// Succeed with `token`
    pub fn ok(token: impl Into<String>) -> Self {
        Self {
            outcome: Ok(token.into()),
            latency: Duration::ZERO,
        }
    }

    /// Succeed with an empty token
    pub fn empty() -> Self {
        Self::ok("")
    }

    /// Fail with `message`
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            outcome: Err(ExecutorError::new(message)),
            latency: Duration::ZERO,
        }
    }

    /// Take `latency` before completing
    pub fn after(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

/// Scripted executor for testing
///
/// Steps are consumed in order. Once the script runs out, every attempt
/// succeeds with `mock-token-{n}` (n = 1-based attempt number) after the
/// default latency. Attempt intervals are recorded so tests can check that
/// attempts never overlap.
#[derive(Debug, Default)]
pub struct MockExecutor {
    script: Mutex<VecDeque<MockStep>>,
    default_latency: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    intervals: Mutex<Vec<(Instant, Instant)>>,
    strategies: Mutex<Vec<TokenStrategy>>,
}

impl MockExecutor {
    /// Create an executor that always succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step to the script
    pub fn with_step(self, step: MockStep) -> Self {
        self.push(step);
        self
    }

    /// Latency of unscripted attempts
    pub fn with_default_latency(mut self, latency: Duration) -> Self {
        self.default_latency = latency;
        self
    }

    /// Append a step to the script
    pub fn push(&self, step: MockStep) {
        lock(&self.script).push_back(step);
    }

    /// Number of attempts started
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of attempts observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// (start, end) of every completed attempt, in completion order
    pub fn intervals(&self) -> Vec<(Instant, Instant)> {
        lock(&self.intervals).clone()
    }

    /// Strategies passed to each attempt, in call order
    pub fn strategies(&self) -> Vec<TokenStrategy> {
        lock(&self.strategies).clone()
    }
}

#[async_trait]
impl TokenExecutor for MockExecutor {
    fn description(&self) -> &str {
        "mock token executor"
    }

    async fn attempt(&self, strategy: TokenStrategy) -> Result<String, ExecutorError> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        lock(&self.strategies).push(strategy);

        let step = lock(&self.script).pop_front().unwrap_or_else(|| {
            MockStep::ok(format!("mock-token-{}", attempt)).after(self.default_latency)
        });

        let start = Instant::now();
        if !step.latency.is_zero() {
            tokio::time::sleep(step.latency).await;
        }
        lock(&self.intervals).push((start, Instant::now()));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        step.outcome
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
