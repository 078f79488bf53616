//! Fallback credential generation
//!
//! When the remote attestation path fails in a way that is allowed to
//! degrade, the client synthesizes a short-lived credential itself:
//!
//! 1. Resolve the device identity (installation signature)
//! 2. Build a [`FallbackPayload`] valid for a fixed window
//! 3. Serialize it canonically (compact JSON, fixed field order)
//! 4. Seal it to the backend's public key
//! 5. Base64-encode the envelope
//!
//! The generator never fails: any error along the way is logged and
//! replaced with a [`FallbackSentinel`] value the backend recognizes.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::classify::ErrorKind;
use crate::clock::{Clock, SystemClock};
use crate::crypto::SealingKey;
use crate::error::CredentialError;
use crate::types::Token;

/// Default validity window of a fallback credential, in milliseconds
pub const DEFAULT_VALIDITY_MS: u64 = 30_000;

/// Token values returned in place of a credential that could not be built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FallbackSentinel {
    /// Encryption failed
    NoEncrypt,
    /// No usable public key is configured
    NoPubKey,
    /// Any other failure
    TokenLocalException,
}

impl FallbackSentinel {
    /// Wire value of the sentinel
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackSentinel::NoEncrypt => "NO_ENCRYPT",
            FallbackSentinel::NoPubKey => "NO_PUB_KEY",
            FallbackSentinel::TokenLocalException => "TOKEN_LOCAL_EXCEPTION",
        }
    }

    /// Recognize a sentinel token value
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NO_ENCRYPT" => Some(FallbackSentinel::NoEncrypt),
            "NO_PUB_KEY" => Some(FallbackSentinel::NoPubKey),
            "TOKEN_LOCAL_EXCEPTION" => Some(FallbackSentinel::TokenLocalException),
            _ => None,
        }
    }
}

impl From<&CredentialError> for FallbackSentinel {
    fn from(err: &CredentialError) -> Self {
        match err {
            CredentialError::NoEncryptionKeyConfigured | CredentialError::InvalidKey(_) => {
                FallbackSentinel::NoPubKey
            }
            CredentialError::EncryptionUnavailable(_) => FallbackSentinel::NoEncrypt,
            CredentialError::Internal(_) => FallbackSentinel::TokenLocalException,
        }
    }
}

impl std::fmt::Display for FallbackSentinel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The plaintext of a fallback credential
///
/// Field order is part of the format: `sha1`, `exp`, `iat`. Timestamps are
/// epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackPayload {
    /// Device installation signature
    #[serde(rename = "sha1")]
    pub device_identity: String,

    /// Expiry (epoch ms)
    #[serde(rename = "exp")]
    pub expires_at: i64,

    /// Issue time (epoch ms)
    #[serde(rename = "iat")]
    pub issued_at: i64,
}

impl FallbackPayload {
    /// Build a payload issued at `issued_at` and valid for `validity`
    pub fn new(device_identity: impl Into<String>, issued_at: DateTime<Utc>, validity: Duration) -> Self {
        Self {
            device_identity: device_identity.into(),
            expires_at: (issued_at + validity).timestamp_millis(),
            issued_at: issued_at.timestamp_millis(),
        }
    }

    /// Compact JSON encoding with stable field order
    pub fn to_canonical_json(&self) -> Result<String, CredentialError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Supplies the device identity (installation signature hash)
pub trait IdentitySource: Send + Sync {
    /// The identity, if the host can determine one
    fn device_identity(&self) -> Option<String>;
}

impl<F> IdentitySource for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn device_identity(&self) -> Option<String> {
        self()
    }
}

/// Identity source returning a fixed value
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(pub Option<String>);

impl IdentitySource for StaticIdentity {
    fn device_identity(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Fallback credential settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Whether failures may be answered with a fallback credential at all
    pub enabled: bool,
    /// Base64 X25519 public key of the attestation backend
    pub public_key: Option<String>,
    /// Identity used when the identity source yields nothing
    pub default_identity: Option<String>,
    /// Validity window of a credential
    pub validity_ms: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            public_key: None,
            default_identity: None,
            validity_ms: DEFAULT_VALIDITY_MS,
        }
    }
}

impl FallbackConfig {
    /// Validity window as a chrono duration
    pub fn validity(&self) -> Duration {
        Duration::milliseconds(i64::try_from(self.validity_ms).unwrap_or(i64::MAX))
    }
}

/// Builds sealed fallback credentials
pub struct FallbackGenerator {
    key: Option<SealingKey>,
    identity: Arc<dyn IdentitySource>,
    default_identity: Option<String>,
    validity: Duration,
    clock: Arc<dyn Clock>,
    rng: Mutex<Box<dyn CryptoRngCore + Send>>,
}

impl std::fmt::Debug for FallbackGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackGenerator")
            .field("key", &self.key)
            .field("default_identity", &self.default_identity)
            .field("validity", &self.validity)
            .finish()
    }
}

impl FallbackGenerator {
    /// Create a generator sealing to `key`
    ///
    /// `None` makes every credential the `NO_PUB_KEY` sentinel.
    pub fn new(key: Option<SealingKey>) -> Self {
        Self {
            key,
            identity: Arc::new(StaticIdentity(None)),
            default_identity: None,
            validity: Duration::milliseconds(DEFAULT_VALIDITY_MS as i64),
            clock: Arc::new(SystemClock),
            rng: Mutex::new(Box::new(OsRng)),
        }
    }

    /// Create a generator from configuration
    ///
    /// A malformed key is logged and treated as absent.
    pub fn from_config(config: &FallbackConfig) -> Self {
        let key = config
            .public_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .and_then(|encoded| match SealingKey::from_base64(encoded) {
                Ok(key) => Some(key),
                Err(e) => {
                    warn!(error = %e, "Ignoring malformed fallback public key");
                    None
                }
            });

        let mut generator = Self::new(key).with_validity(config.validity());
        if let Some(identity) = &config.default_identity {
            generator = generator.with_default_identity(identity.clone());
        }
        generator
    }

    /// Set the identity source
    pub fn with_identity_source(mut self, source: impl IdentitySource + 'static) -> Self {
        self.identity = Arc::new(source);
        self
    }

    /// Set the identity used when the source yields nothing
    pub fn with_default_identity(mut self, identity: impl Into<String>) -> Self {
        self.default_identity = Some(identity.into());
        self
    }

    /// Set the validity window
    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    /// Set the clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the randomness source used for ephemeral keys and nonces
    pub fn with_rng(mut self, rng: impl CryptoRngCore + Send + 'static) -> Self {
        self.rng = Mutex::new(Box::new(rng));
        self
    }

    /// Whether a sealing key is configured
    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    /// Build a fallback credential for a failure of kind `kind`
    ///
    /// Always returns a non-genuine token: either the sealed credential or
    /// a sentinel value.
    pub fn generate(&self, kind: ErrorKind) -> Token {
        match self.try_generate() {
            Ok(credential) => {
                debug!(kind = %kind, "Generated fallback credential");
                Token::fallback(credential)
            }
            Err(e) => {
                let sentinel = FallbackSentinel::from(&e);
                warn!(
                    kind = %kind,
                    error = %e,
                    sentinel = %sentinel,
                    "Fallback credential generation failed"
                );
                Token::fallback(sentinel.as_str())
            }
        }
    }

    fn try_generate(&self) -> Result<String, CredentialError> {
        let key = self
            .key
            .as_ref()
            .ok_or(CredentialError::NoEncryptionKeyConfigured)?;

        let payload = FallbackPayload::new(self.resolve_identity(), self.clock.now(), self.validity);
        let plaintext = payload.to_canonical_json()?;

        let mut rng = self
            .rng
            .lock()
            .map_err(|_| CredentialError::Internal("rng lock poisoned".into()))?;
        let envelope = key.seal(plaintext.as_bytes(), &mut **rng)?;

        Ok(STANDARD.encode(envelope))
    }

    fn resolve_identity(&self) -> String {
        self.identity
            .device_identity()
            .filter(|identity| !identity.trim().is_empty())
            .or_else(|| self.default_identity.clone())
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn frozen_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()))
    }

    fn test_key() -> SealingKey {
        let secret = x25519_dalek::StaticSecret::random_from_rng(StdRng::seed_from_u64(99));
        SealingKey::from_bytes(x25519_dalek::PublicKey::from(&secret).to_bytes())
    }

    #[test]
    fn test_payload_canonical_json() {
        let issued = Utc.timestamp_millis_opt(1_000).unwrap();
        let payload = FallbackPayload::new("abc=", issued, Duration::seconds(30));

        assert_eq!(
            payload.to_canonical_json().unwrap(),
            r#"{"sha1":"abc=","exp":31000,"iat":1000}"#
        );
    }

    #[test]
    fn test_no_key_yields_sentinel() {
        let token = FallbackGenerator::new(None).generate(ErrorKind::Other);

        assert!(!token.is_genuine());
        assert_eq!(token.value(), "NO_PUB_KEY");
        assert_eq!(FallbackSentinel::parse(token.value()), Some(FallbackSentinel::NoPubKey));
    }

    #[test]
    fn test_low_order_key_yields_no_encrypt() {
        let generator = FallbackGenerator::new(Some(SealingKey::from_bytes([0u8; 32])));
        assert_eq!(generator.generate(ErrorKind::Other).value(), "NO_ENCRYPT");
    }

    #[test]
    fn test_malformed_config_key_is_treated_as_absent() {
        let config = FallbackConfig {
            public_key: Some("definitely not a key".into()),
            ..FallbackConfig::default()
        };
        let generator = FallbackGenerator::from_config(&config);

        assert!(!generator.has_key());
        assert_eq!(generator.generate(ErrorKind::Other).value(), "NO_PUB_KEY");
    }

    #[test]
    fn test_identity_falls_back_to_default() {
        let generator = FallbackGenerator::new(None)
            .with_identity_source(|| Some("   ".to_string()))
            .with_default_identity(" default-sig ");
        assert_eq!(generator.resolve_identity(), "default-sig");

        let generator = FallbackGenerator::new(None)
            .with_identity_source(|| Some("device-sig".to_string()))
            .with_default_identity("default-sig");
        assert_eq!(generator.resolve_identity(), "device-sig");

        assert_eq!(FallbackGenerator::new(None).resolve_identity(), "");
    }

    #[test]
    fn test_generated_credential_is_base64_envelope() {
        let generator = FallbackGenerator::new(Some(test_key()))
            .with_default_identity("sig")
            .with_clock(frozen_clock())
            .with_rng(StdRng::seed_from_u64(5));

        let token = generator.generate(ErrorKind::Other);
        let envelope = STANDARD.decode(token.value()).unwrap();

        let plaintext_len = r#"{"sha1":"sig","exp":1700000030000,"iat":1700000000000}"#.len();
        assert_eq!(envelope.len(), 32 + 12 + plaintext_len + 16);
        assert!(!token.value().contains('\n'));
    }
}
