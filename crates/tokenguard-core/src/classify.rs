//! Classification of remote failures
//!
//! The remote attestation service only reports failures as free-form
//! messages. [`classify`] maps a message to an [`ErrorKind`], and
//! [`HardFailPolicy`] decides which kinds may be answered with a fallback
//! credential and which must surface to the caller as a failure.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Marker the remote service puts in attestation rejections
pub const ATTESTATION_FAILED_MARKER: &str = "App attestation failed";

/// Known kinds of remote failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The service rejected the device/app attestation
    AttestationFailed,
    /// Anything else (network, quota, empty token, ...)
    Other,
}

impl ErrorKind {
    /// Value reported to the server and used as the failure message
    pub fn value(&self) -> &'static str {
        match self {
            ErrorKind::AttestationFailed => ATTESTATION_FAILED_MARKER,
            ErrorKind::Other => "Others",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::AttestationFailed => write!(f, "attestation_failed"),
            ErrorKind::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "attestation_failed" | "app_attestation_failed" | "attestation-failed" => {
                Ok(ErrorKind::AttestationFailed)
            }
            "other" | "others" => Ok(ErrorKind::Other),
            _ => Err(format!("Unknown error kind: {}", s)),
        }
    }
}

/// Classify a failure message
pub fn classify(message: &str) -> ErrorKind {
    if message.contains(ATTESTATION_FAILED_MARKER) {
        ErrorKind::AttestationFailed
    } else {
        ErrorKind::Other
    }
}

/// Decides which error kinds must fail hard instead of falling back
///
/// The effective set is the caller's tracked kinds merged with the
/// built-in defaults, which always contain `AttestationFailed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardFailPolicy {
    kinds: BTreeSet<ErrorKind>,
}

impl HardFailPolicy {
    /// Kinds that always fail hard
    pub const DEFAULT_KINDS: [ErrorKind; 1] = [ErrorKind::AttestationFailed];

    /// Build a policy from the caller's tracked kinds
    pub fn new(tracked: impl IntoIterator<Item = ErrorKind>) -> Self {
        let kinds = tracked
            .into_iter()
            .chain(Self::DEFAULT_KINDS)
            .collect();
        Self { kinds }
    }

    /// Whether a failure of this kind may be answered with a fallback token
    pub fn permits_fallback(&self, kind: ErrorKind) -> bool {
        !self.kinds.contains(&kind)
    }

    /// The merged hard-fail set
    pub fn kinds(&self) -> impl Iterator<Item = ErrorKind> + '_ {
        self.kinds.iter().copied()
    }
}

impl Default for HardFailPolicy {
    fn default() -> Self {
        Self::new([])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_attestation_marker() {
        assert_eq!(
            classify("Error returned from API. code: 403 body: App attestation failed."),
            ErrorKind::AttestationFailed
        );
        assert_eq!(classify("Too many attempts."), ErrorKind::Other);
        assert_eq!(classify(""), ErrorKind::Other);
    }

    #[test]
    fn test_error_kind_parsing() {
        assert_eq!("attestation_failed".parse::<ErrorKind>().unwrap(), ErrorKind::AttestationFailed);
        assert_eq!("OTHERS".parse::<ErrorKind>().unwrap(), ErrorKind::Other);
        assert!("network".parse::<ErrorKind>().is_err());
    }

    #[test]
    fn test_default_policy_blocks_attestation_failures() {
        let policy = HardFailPolicy::default();
        assert!(!policy.permits_fallback(ErrorKind::AttestationFailed));
        assert!(policy.permits_fallback(ErrorKind::Other));
    }

    #[test]
    fn test_tracked_kinds_are_merged_with_defaults() {
        let policy = HardFailPolicy::new([ErrorKind::Other]);
        assert!(!policy.permits_fallback(ErrorKind::Other));
        assert!(!policy.permits_fallback(ErrorKind::AttestationFailed));
        assert_eq!(policy.kinds().count(), 2);
    }
}
