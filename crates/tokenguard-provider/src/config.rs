//! Client configuration
//!
//! Loaded from serde (any format the host prefers) or from environment
//! variables:
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `TOKENGUARD_COOLDOWN_MS` | Retry block after a failure | `5000` |
//! | `TOKENGUARD_DEADLINE_MS` | Per-request deadline, `0` disables | `0` |
//! | `TOKENGUARD_TRACKED_ERRORS` | Comma list of hard-fail error kinds | empty |
//! | `TOKENGUARD_FALLBACK_ENABLED` | Allow fallback credentials | `true` |
//! | `TOKENGUARD_FALLBACK_PUBLIC_KEY` | Base64 X25519 backend key | none |
//! | `TOKENGUARD_DEVICE_IDENTITY` | Default device identity | none |
//! | `TOKENGUARD_FALLBACK_VALIDITY_MS` | Fallback credential lifetime | `30000` |

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use tokenguard_core::{ErrorKind, FallbackConfig, HardFailPolicy, Result, TokenError};

/// Default cooldown after a failed request, in milliseconds
pub const DEFAULT_COOLDOWN_MS: u64 = 5_000;

/// Token client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Retry block after a failure
    pub cooldown_ms: u64,
    /// Per-request deadline (0 = none)
    pub deadline_ms: u64,
    /// Error kinds that must fail hard, on top of the defaults
    pub tracked_errors: Vec<ErrorKind>,
    /// Fallback credential settings
    pub fallback: FallbackConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            deadline_ms: 0,
            tracked_errors: Vec::new(),
            fallback: FallbackConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from `TOKENGUARD_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(value) = lookup("TOKENGUARD_COOLDOWN_MS") {
            config.cooldown_ms = parse_value("TOKENGUARD_COOLDOWN_MS", &value)?;
        }
        if let Some(value) = lookup("TOKENGUARD_DEADLINE_MS") {
            config.deadline_ms = parse_value("TOKENGUARD_DEADLINE_MS", &value)?;
        }
        if let Some(value) = lookup("TOKENGUARD_TRACKED_ERRORS") {
            config.tracked_errors = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<ErrorKind>().map_err(TokenError::Config))
                .collect::<Result<_>>()?;
        }
        if let Some(value) = lookup("TOKENGUARD_FALLBACK_ENABLED") {
            config.fallback.enabled = parse_value("TOKENGUARD_FALLBACK_ENABLED", &value)?;
        }
        if let Some(value) = lookup("TOKENGUARD_FALLBACK_VALIDITY_MS") {
            config.fallback.validity_ms = parse_value("TOKENGUARD_FALLBACK_VALIDITY_MS", &value)?;
        }
        config.fallback.public_key = lookup("TOKENGUARD_FALLBACK_PUBLIC_KEY")
            .filter(|v| !v.trim().is_empty())
            .or(config.fallback.public_key);
        config.fallback.default_identity = lookup("TOKENGUARD_DEVICE_IDENTITY")
            .filter(|v| !v.trim().is_empty())
            .or(config.fallback.default_identity);

        Ok(config)
    }

    /// Cooldown after a failure
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Per-request deadline (zero = none)
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    /// Merged hard-fail policy
    pub fn hard_fail_policy(&self) -> HardFailPolicy {
        HardFailPolicy::new(self.tracked_errors.iter().copied())
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| TokenError::Config(format!("{} has invalid value '{}': {}", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.cooldown(), Duration::from_secs(5));
        assert!(config.deadline().is_zero());
        assert!(config.fallback.enabled);
        assert_eq!(config.fallback.validity_ms, 30_000);
    }

    #[test]
    fn test_env_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("TOKENGUARD_COOLDOWN_MS", "250"),
            ("TOKENGUARD_DEADLINE_MS", " 1000 "),
            ("TOKENGUARD_TRACKED_ERRORS", "other, attestation_failed,"),
            ("TOKENGUARD_FALLBACK_ENABLED", "false"),
            ("TOKENGUARD_FALLBACK_PUBLIC_KEY", "a2V5"),
            ("TOKENGUARD_DEVICE_IDENTITY", "sig"),
        ]))
        .unwrap();

        assert_eq!(config.cooldown(), Duration::from_millis(250));
        assert_eq!(config.deadline(), Duration::from_secs(1));
        assert_eq!(
            config.tracked_errors,
            vec![ErrorKind::Other, ErrorKind::AttestationFailed]
        );
        assert!(!config.fallback.enabled);
        assert_eq!(config.fallback.public_key.as_deref(), Some("a2V5"));
        assert_eq!(config.fallback.default_identity.as_deref(), Some("sig"));
        assert!(!config.hard_fail_policy().permits_fallback(ErrorKind::Other));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = ClientConfig::from_lookup(lookup(&[("TOKENGUARD_COOLDOWN_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, TokenError::Config(msg) if msg.contains("TOKENGUARD_COOLDOWN_MS")));

        let err = ClientConfig::from_lookup(lookup(&[("TOKENGUARD_TRACKED_ERRORS", "network")]))
            .unwrap_err();
        assert!(matches!(err, TokenError::Config(_)));
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"cooldown_ms": 100, "tracked_errors": ["other"], "fallback": {"public_key": "a2V5"}}"#,
        )
        .unwrap();

        assert_eq!(config.cooldown_ms, 100);
        assert_eq!(config.deadline_ms, 0);
        assert_eq!(config.tracked_errors, vec![ErrorKind::Other]);
        assert!(config.fallback.enabled);
        assert_eq!(config.fallback.validity_ms, 30_000);
    }
}
