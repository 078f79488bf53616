//! # tokenguard core
//!
//! Types and primitives shared by the tokenguard token pipeline.
//!
//! ## Key Concepts
//!
//! - **Token**: an attestation bearer value, either genuine (issued by the
//!   remote service) or a locally synthesized fallback credential
//! - **ErrorKind**: classification of a remote failure, used to decide
//!   whether a fallback credential may stand in for the real token
//! - **Fallback credential**: a short-lived payload carrying the device
//!   identity, sealed to the attestation backend's X25519 key
//! - **Clock**: injectable time source for cooldowns and payload timestamps

pub mod classify;
pub mod clock;
pub mod crypto;
pub mod error;
pub mod fallback;
pub mod types;

pub use classify::{classify, ErrorKind, HardFailPolicy};
pub use clock::{Clock, ManualClock, SystemClock};
pub use crypto::SealingKey;
pub use error::{CredentialError, Result, TokenError};
pub use fallback::{
    FallbackConfig, FallbackGenerator, FallbackPayload, FallbackSentinel, IdentitySource,
    StaticIdentity,
};
pub use types::{Token, TokenStrategy, TOKEN_FAIL};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
