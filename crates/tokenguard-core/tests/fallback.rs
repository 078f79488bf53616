//! Fallback credential generation tests
//!
//! These tests verify the generator's external contract:
//! - Deterministic output for a frozen clock and seeded RNG
//! - A different instant produces a different credential
//! - Sentinel values instead of errors

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokenguard_core::{
    ErrorKind, FallbackConfig, FallbackGenerator, FallbackSentinel, ManualClock, SealingKey,
};
use x25519_dalek::{PublicKey, StaticSecret};

// =============================================================================
// Test Helpers
// =============================================================================

fn backend_key() -> SealingKey {
    let secret = StaticSecret::random_from_rng(StdRng::seed_from_u64(2024));
    SealingKey::from_bytes(PublicKey::from(&secret).to_bytes())
}

fn generator_at(clock: Arc<ManualClock>, seed: u64) -> FallbackGenerator {
    FallbackGenerator::new(Some(backend_key()))
        .with_identity_source(|| Some("c2lnbmF0dXJlLWhhc2g=".to_string()))
        .with_clock(clock)
        .with_rng(StdRng::seed_from_u64(seed))
}

fn frozen_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()))
}

// =============================================================================
// Determinism
// =============================================================================

#[test]
fn test_same_inputs_same_credential() {
    let a = generator_at(frozen_clock(), 11).generate(ErrorKind::Other);
    let b = generator_at(frozen_clock(), 11).generate(ErrorKind::Other);

    assert!(!a.is_genuine());
    assert_eq!(a.value(), b.value());
    assert!(FallbackSentinel::parse(a.value()).is_none());
}

#[test]
fn test_different_instant_different_credential() {
    let later = frozen_clock();
    later.advance(Duration::milliseconds(1));

    let a = generator_at(frozen_clock(), 11).generate(ErrorKind::Other);
    let b = generator_at(later, 11).generate(ErrorKind::Other);

    assert_ne!(a.value(), b.value());
}

#[test]
fn test_credential_decodes_to_envelope() {
    let token = generator_at(frozen_clock(), 3).generate(ErrorKind::Other);
    let envelope = STANDARD.decode(token.value()).expect("credential must be base64");

    // ephemeral key || nonce || ciphertext || tag
    assert!(envelope.len() > 32 + 12 + 16);
    assert_ne!(&envelope[..32], &backend_key().to_bytes()[..]);
}

// =============================================================================
// Sentinels
// =============================================================================

#[test]
fn test_no_key_configured_sentinel() {
    let generator = FallbackGenerator::from_config(&FallbackConfig::default());
    let token = generator.generate(ErrorKind::Other);

    assert_eq!(token.value(), FallbackSentinel::NoPubKey.as_str());
    assert!(!token.is_genuine());
}

#[test]
fn test_sentinels_roundtrip_through_parse() {
    for sentinel in [
        FallbackSentinel::NoEncrypt,
        FallbackSentinel::NoPubKey,
        FallbackSentinel::TokenLocalException,
    ] {
        assert_eq!(FallbackSentinel::parse(sentinel.as_str()), Some(sentinel));
    }
    assert_eq!(FallbackSentinel::parse("eyJhbGciOi"), None);
}

#[test]
fn test_config_key_is_used() {
    let config = FallbackConfig {
        public_key: Some(STANDARD.encode(backend_key().to_bytes())),
        default_identity: Some("fallback-sig".into()),
        validity_ms: 10_000,
        ..FallbackConfig::default()
    };
    let generator = FallbackGenerator::from_config(&config);

    assert!(generator.has_key());
    let token = generator.generate(ErrorKind::Other);
    assert!(FallbackSentinel::parse(token.value()).is_none());
}
