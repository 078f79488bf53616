//! Attestation client - the assembled pipeline
//!
//! ```text
//! caller ─► RequestCoalescer ─► DeadlineTokenProvider ─► CooldownTokenProvider ─► TokenExecutor
//!                                                                 │
//!                                                                 └─► FallbackGenerator
//! ```

use std::sync::Arc;
use tracing::info;

use tokenguard_core::{
    Clock, FallbackGenerator, IdentitySource, Result, SystemClock, Token, TokenStrategy,
};

use crate::coalescer::{PendingToken, RequestCoalescer};
use crate::config::ClientConfig;
use crate::deadline::DeadlineTokenProvider;
use crate::executor::TokenExecutor;
use crate::observer::{TracingObserver, TransitionObserver};
use crate::provider::{CooldownTokenProvider, TokenProvider};
use crate::state::ProviderState;

/// Builder for [`AttestationClient`]
pub struct AttestationClientBuilder {
    executor: Arc<dyn TokenExecutor>,
    config: ClientConfig,
    identity: Option<Arc<dyn IdentitySource>>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn TransitionObserver>,
}

impl AttestationClientBuilder {
    /// Start a builder around `executor`
    pub fn new(executor: Arc<dyn TokenExecutor>) -> Self {
        Self {
            executor,
            config: ClientConfig::default(),
            identity: None,
            clock: Arc::new(SystemClock),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Use `config` instead of the defaults
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Device identity embedded in fallback credentials
    pub fn with_identity_source(mut self, source: impl IdentitySource + 'static) -> Self {
        self.identity = Some(Arc::new(source));
        self
    }

    /// Clock for cooldown windows and credential timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Receiver of state transition reports
    pub fn with_observer(mut self, observer: Arc<dyn TransitionObserver>) -> Self {
        self.observer = observer;
        self
    }

    fn fallback_generator(&self) -> Option<Arc<FallbackGenerator>> {
        if !self.config.fallback.enabled {
            return None;
        }

        let mut generator =
            FallbackGenerator::from_config(&self.config.fallback).with_clock(Arc::clone(&self.clock));
        if let Some(source) = &self.identity {
            let source = Arc::clone(source);
            generator = generator.with_identity_source(move || source.device_identity());
        }
        Some(Arc::new(generator))
    }

    /// Assemble the provider chain without the request queue
    pub fn build_provider(&self) -> Arc<dyn TokenProvider> {
        let mut cooldown = CooldownTokenProvider::new(Arc::clone(&self.executor))
            .with_cooldown(self.config.cooldown())
            .with_policy(self.config.hard_fail_policy())
            .with_clock(Arc::clone(&self.clock))
            .with_observer(Arc::clone(&self.observer));
        if let Some(generator) = self.fallback_generator() {
            cooldown = cooldown.with_fallback(generator);
        }

        Arc::new(DeadlineTokenProvider::new(
            Arc::new(cooldown),
            self.config.deadline(),
        ))
    }

    /// Assemble the full client
    ///
    /// Must be called inside a tokio runtime (the request worker is spawned).
    pub fn build(self) -> AttestationClient {
        let provider = self.build_provider();
        info!(
            executor = self.executor.description(),
            cooldown_ms = self.config.cooldown_ms,
            deadline_ms = self.config.deadline_ms,
            fallback = self.config.fallback.enabled,
            "Attestation client ready"
        );

        AttestationClient {
            queue: RequestCoalescer::spawn(provider),
            config: self.config,
        }
    }
}

/// Front door for obtaining attestation tokens
pub struct AttestationClient {
    queue: RequestCoalescer,
    config: ClientConfig,
}

impl AttestationClient {
    /// Build a client with the given executor and configuration
    pub fn new(executor: Arc<dyn TokenExecutor>, config: ClientConfig) -> Self {
        AttestationClientBuilder::new(executor)
            .with_config(config)
            .build()
    }

    /// Start a builder
    pub fn builder(executor: Arc<dyn TokenExecutor>) -> AttestationClientBuilder {
        AttestationClientBuilder::new(executor)
    }

    /// Obtain a standard token, optionally bypassing any remote cache
    pub async fn get_token(&self, force_refresh: bool) -> Result<Token> {
        self.get_token_with(TokenStrategy::standard(force_refresh)).await
    }

    /// Obtain a limited-use token
    pub async fn get_limited_use_token(&self) -> Result<Token> {
        self.get_token_with(TokenStrategy::Limited).await
    }

    /// Obtain a token with an explicit strategy
    pub async fn get_token_with(&self, strategy: TokenStrategy) -> Result<Token> {
        self.queue.request(strategy).await
    }

    /// Enqueue a request without waiting for it
    pub fn submit(&self, strategy: TokenStrategy) -> PendingToken {
        self.queue.submit(strategy)
    }

    /// Current provider state
    pub fn state(&self) -> ProviderState {
        self.queue.state()
    }

    /// Active configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Stop accepting requests and wait for queued ones to finish
    pub async fn shutdown(self) {
        self.queue.shutdown().await;
    }
}
