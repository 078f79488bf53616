//! Core token types

use serde::{Deserialize, Serialize};

/// Value handed out when a token carries no usable value
pub const TOKEN_FAIL: &str = "TokenFail";

/// How to ask the remote service for a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStrategy {
    /// Regular refreshable token; `force_refresh` bypasses the remote cache
    Standard { force_refresh: bool },
    /// Single-use token for replay-sensitive requests
    Limited,
}

impl TokenStrategy {
    /// Standard strategy with the given refresh flag
    pub fn standard(force_refresh: bool) -> Self {
        TokenStrategy::Standard { force_refresh }
    }
}

impl Default for TokenStrategy {
    fn default() -> Self {
        TokenStrategy::Standard { force_refresh: false }
    }
}

impl std::fmt::Display for TokenStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenStrategy::Standard { force_refresh: true } => write!(f, "standard(refresh)"),
            TokenStrategy::Standard { force_refresh: false } => write!(f, "standard"),
            TokenStrategy::Limited => write!(f, "limited"),
        }
    }
}

/// An attestation token
///
/// Either obtained from the remote service (`genuine`) or synthesized
/// locally as a fallback credential. Immutable once built.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    value: String,
    genuine: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl Token {
    /// A token obtained from the remote attestation service
    pub fn genuine(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            genuine: true,
            message: None,
        }
    }

    /// A locally synthesized token
    pub fn fallback(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            genuine: false,
            message: None,
        }
    }

    /// Attach the error message that caused a fallback
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The bearer value; [`TOKEN_FAIL`] if the token is empty
    pub fn value(&self) -> &str {
        if self.value.is_empty() {
            TOKEN_FAIL
        } else {
            &self.value
        }
    }

    /// Whether the token was issued by the remote service
    pub fn is_genuine(&self) -> bool {
        self.genuine && !self.value.is_empty()
    }

    /// Whether the token carries no value
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Error message recorded when the token was synthesized
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

// Bearer values stay out of logs
impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("value", &format_args!("[{} chars]", self.value.len()))
            .field("genuine", &self.genuine)
            .field("message", &self.message)
            .finish()
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let origin = if self.genuine { "genuine" } else { "fallback" };
        write!(f, "{} token, {} chars", origin, self.value.len())
    }
}
