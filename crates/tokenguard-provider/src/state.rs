//! Provider state - the cooldown state machine's data

use chrono::{DateTime, Utc};

use tokenguard_core::{Token, TokenError};

/// State of a token provider
///
/// Exactly one variant is held at a time. Transitions only happen while
/// the provider's guard is held.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProviderState {
    /// No request has failed yet
    #[default]
    Idle,

    /// The last request produced a genuine token
    ///
    /// Kept for diagnostics only; the token is never served from here.
    Ready(Token),

    /// The last request failed; retries are blocked until `unblock_at`
    Error {
        cause: TokenError,
        occurred_at: DateTime<Utc>,
        unblock_at: DateTime<Utc>,
    },

    /// A retry was refused inside the cooldown window
    RetryBlocked {
        original_cause: TokenError,
        unblock_at: DateTime<Utc>,
    },
}

impl ProviderState {
    /// Short name of the variant
    pub fn name(&self) -> &'static str {
        match self {
            ProviderState::Idle => "idle",
            ProviderState::Ready(_) => "ready",
            ProviderState::Error { .. } => "error",
            ProviderState::RetryBlocked { .. } => "retry_blocked",
        }
    }

    /// End of the current cooldown window, if any
    pub fn unblock_at(&self) -> Option<DateTime<Utc>> {
        match self {
            ProviderState::Idle | ProviderState::Ready(_) => None,
            ProviderState::Error { unblock_at, .. }
            | ProviderState::RetryBlocked { unblock_at, .. } => Some(*unblock_at),
        }
    }

    /// Whether a request at `now` may reach the executor
    pub fn allows_retry(&self, now: DateTime<Utc>) -> bool {
        match self.unblock_at() {
            Some(unblock_at) => now >= unblock_at,
            None => true,
        }
    }

    /// The cause and end of the cooldown refusing a request at `now`
    ///
    /// `None` means the request may proceed. A repeated refusal keeps the
    /// original cause and does not move `unblock_at`.
    pub fn refuse_retry(&self, now: DateTime<Utc>) -> Option<(TokenError, DateTime<Utc>)> {
        match self {
            ProviderState::Error {
                cause, unblock_at, ..
            } if now < *unblock_at => Some((cause.clone(), *unblock_at)),
            ProviderState::RetryBlocked {
                original_cause,
                unblock_at,
            } if now < *unblock_at => Some((original_cause.clone(), *unblock_at)),
            _ => None,
        }
    }

    /// The failure behind the current cooldown, if any
    pub fn cause(&self) -> Option<&TokenError> {
        match self {
            ProviderState::Error { cause, .. } => Some(cause),
            ProviderState::RetryBlocked { original_cause, .. } => Some(original_cause),
            ProviderState::Idle | ProviderState::Ready(_) => None,
        }
    }
}

impl std::fmt::Display for ProviderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderState::Idle => write!(f, "Idle"),
            ProviderState::Ready(token) => write!(f, "Ready [{}]", token),
            ProviderState::Error {
                cause, unblock_at, ..
            } => write!(f, "Error: [{}], unblock time: [{}]", cause, unblock_at),
            ProviderState::RetryBlocked {
                original_cause,
                unblock_at,
            } => write!(
                f,
                "RetryBlocked: error: [{}], unblock time: [{}]",
                original_cause, unblock_at
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tokenguard_core::ErrorKind;

    fn failure() -> TokenError {
        TokenError::RemoteCallFailed {
            kind: ErrorKind::Other,
            message: "network down".into(),
        }
    }

    #[test]
    fn test_idle_and_ready_always_allow_retry() {
        let now = Utc::now();
        assert!(ProviderState::Idle.allows_retry(now));
        assert!(ProviderState::Ready(Token::genuine("t")).allows_retry(now));
        assert!(ProviderState::Idle.refuse_retry(now).is_none());
    }

    #[test]
    fn test_error_blocks_until_unblock_time() {
        let now = Utc::now();
        let state = ProviderState::Error {
            cause: failure(),
            occurred_at: now,
            unblock_at: now + Duration::seconds(5),
        };

        assert!(!state.allows_retry(now + Duration::seconds(4)));
        assert!(state.allows_retry(now + Duration::seconds(5)));

        let (cause, unblock_at) = state.refuse_retry(now + Duration::seconds(1)).unwrap();
        assert_eq!(cause, failure());
        assert_eq!(unblock_at, now + Duration::seconds(5));
    }

    #[test]
    fn test_repeated_refusal_keeps_window() {
        let now = Utc::now();
        let blocked = ProviderState::RetryBlocked {
            original_cause: failure(),
            unblock_at: now + Duration::seconds(5),
        };

        let (cause, unblock_at) = blocked.refuse_retry(now + Duration::seconds(3)).unwrap();
        assert_eq!(cause, failure());
        assert_eq!(Some(unblock_at), blocked.unblock_at());
        assert_eq!(blocked.cause(), Some(&failure()));
        assert!(blocked.refuse_retry(now + Duration::seconds(5)).is_none());
    }

    #[test]
    fn test_display_does_not_leak_token() {
        let state = ProviderState::Ready(Token::genuine("secret-value"));
        let shown = state.to_string();
        assert!(shown.starts_with("Ready"));
        assert!(!shown.contains("secret-value"));
    }
}
