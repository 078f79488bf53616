//! tokenguard provider
//!
//! Client-side pipeline for obtaining attestation tokens from a remote
//! service that is slow, rate-limited and sometimes down.
//!
//! ## Architecture
//!
//! Each layer wraps the next:
//!
//! - **RequestCoalescer**: FIFO queue drained by a single worker
//! - **DeadlineTokenProvider**: bounds how long a caller waits
//! - **CooldownTokenProvider**: single-flight guard plus the
//!   Idle/Ready/Error/RetryBlocked state machine
//! - **TokenExecutor**: one attempt against the remote service
//!
//! Remote failures are classified; unless the kind is a hard failure, a
//! sealed fallback credential is returned in place of the real token.
//!
//! ## Usage
//!
//! ```ignore
//! use tokenguard_provider::{AttestationClient, ClientConfig};
//!
//! let client = AttestationClient::new(executor, ClientConfig::from_env()?);
//! let token = client.get_token(false).await?;
//! if !token.is_genuine() {
//!     tracing::warn!("serving fallback credential");
//! }
//! ```
//!
//! The library emits `tracing` events; installing a subscriber is up to
//! the host application.

pub mod client;
pub mod coalescer;
pub mod config;
pub mod deadline;
pub mod executor;
pub mod observer;
pub mod provider;
pub mod state;

pub use client::{AttestationClient, AttestationClientBuilder};
pub use coalescer::{PendingToken, RequestCoalescer};
pub use config::ClientConfig;
pub use deadline::DeadlineTokenProvider;
pub use executor::{ExecutorError, MockExecutor, MockStep, TokenExecutor};
pub use observer::{TracingObserver, TransitionObserver, LOG_TAG};
pub use provider::{CooldownTokenProvider, TokenProvider};
pub use state::ProviderState;

pub use tokenguard_core::{ErrorKind, Result, Token, TokenError, TokenStrategy};
