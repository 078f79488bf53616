//! Sealed-box encryption for fallback credentials
//!
//! The client only ever encrypts; the attestation backend holds the
//! matching X25519 secret and opens the envelope server-side.
//!
//! Envelope layout:
//! - `ephemeral_public` (32 bytes)
//! - `nonce` (12 bytes)
//! - `ciphertext || tag` (plaintext length + 16 bytes)
//!
//! The AEAD key is `HKDF-SHA256(salt = ephemeral_public || recipient_public,
//! ikm = X25519(ephemeral_secret, recipient_public), info = HKDF_INFO)`.

use base64::{engine::general_purpose::STANDARD, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use hkdf::Hkdf;
use rand_core::CryptoRngCore;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::error::CredentialError;

/// Length of an X25519 public key
pub const PUBLIC_KEY_LEN: usize = 32;

/// Length of the ChaCha20-Poly1305 nonce
pub const NONCE_LEN: usize = 12;

/// Length of the Poly1305 tag
pub const TAG_LEN: usize = 16;

/// Domain separation for the key derivation
const HKDF_INFO: &[u8] = b"tokenguard-fallback-v1";

/// Recipient public key used to seal fallback payloads
#[derive(Clone)]
pub struct SealingKey {
    public: PublicKey,
}

impl std::fmt::Debug for SealingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealingKey")
            .field("public", &STANDARD.encode(self.public.as_bytes()))
            .finish()
    }
}

impl SealingKey {
    /// Create a sealing key from raw X25519 public key bytes
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self {
            public: PublicKey::from(bytes),
        }
    }

    /// Parse a base64-encoded (standard alphabet) public key
    pub fn from_base64(encoded: &str) -> Result<Self, CredentialError> {
        let bytes = STANDARD.decode(encoded.trim())?;
        let bytes: [u8; PUBLIC_KEY_LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
            CredentialError::InvalidKey(format!(
                "expected {} bytes, got {}",
                PUBLIC_KEY_LEN,
                b.len()
            ))
        })?;
        Ok(Self::from_bytes(bytes))
    }

    /// Raw public key bytes
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.public.to_bytes()
    }

    /// Encrypt `plaintext` to this key
    ///
    /// Consumes 44 bytes from `rng` (ephemeral secret, then nonce), so a
    /// seeded RNG yields a reproducible envelope.
    pub fn seal(
        &self,
        plaintext: &[u8],
        rng: &mut dyn CryptoRngCore,
    ) -> Result<Vec<u8>, CredentialError> {
        let mut secret_bytes = [0u8; 32];
        rng.fill_bytes(&mut secret_bytes);
        let ephemeral_secret = StaticSecret::from(secret_bytes);
        secret_bytes.zeroize();
        let ephemeral_public = PublicKey::from(&ephemeral_secret);

        let shared = ephemeral_secret.diffie_hellman(&self.public);
        if !shared.was_contributory() {
            return Err(CredentialError::EncryptionUnavailable(
                "recipient key is a low-order point".into(),
            ));
        }

        let mut key = derive_key(
            shared.as_bytes(),
            ephemeral_public.as_bytes(),
            self.public.as_bytes(),
        )?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        key.zeroize();

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut nonce_bytes);
        let ciphertext = cipher.encrypt(Nonce::from_slice(&nonce_bytes), plaintext)?;

        let mut envelope = Vec::with_capacity(PUBLIC_KEY_LEN + NONCE_LEN + ciphertext.len());
        envelope.extend_from_slice(ephemeral_public.as_bytes());
        envelope.extend_from_slice(&nonce_bytes);
        envelope.extend_from_slice(&ciphertext);
        Ok(envelope)
    }
}

fn derive_key(
    shared: &[u8; 32],
    ephemeral_public: &[u8; 32],
    recipient_public: &[u8; 32],
) -> Result<[u8; 32], CredentialError> {
    let mut salt = [0u8; 2 * PUBLIC_KEY_LEN];
    salt[..PUBLIC_KEY_LEN].copy_from_slice(ephemeral_public);
    salt[PUBLIC_KEY_LEN..].copy_from_slice(recipient_public);

    let hk = Hkdf::<Sha256>::new(Some(&salt), shared);
    let mut okm = [0u8; 32];
    hk.expand(HKDF_INFO, &mut okm)
        .map_err(|e| CredentialError::EncryptionUnavailable(e.to_string()))?;
    Ok(okm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Server-side counterpart, only needed to check the envelope
    fn open(secret: &StaticSecret, envelope: &[u8]) -> Vec<u8> {
        let ephemeral: [u8; 32] = envelope[..PUBLIC_KEY_LEN].try_into().unwrap();
        let nonce = &envelope[PUBLIC_KEY_LEN..PUBLIC_KEY_LEN + NONCE_LEN];
        let ciphertext = &envelope[PUBLIC_KEY_LEN + NONCE_LEN..];

        let recipient_public = PublicKey::from(secret);
        let shared = secret.diffie_hellman(&PublicKey::from(ephemeral));
        let key = derive_key(shared.as_bytes(), &ephemeral, recipient_public.as_bytes()).unwrap();
        ChaCha20Poly1305::new(Key::from_slice(&key))
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .unwrap()
    }

    fn recipient(seed: u64) -> (StaticSecret, SealingKey) {
        let secret = StaticSecret::random_from_rng(StdRng::seed_from_u64(seed));
        let key = SealingKey::from_bytes(PublicKey::from(&secret).to_bytes());
        (secret, key)
    }

    #[test]
    fn test_seal_and_open() {
        let (secret, key) = recipient(1);
        let mut rng = StdRng::seed_from_u64(42);

        let envelope = key.seal(b"{\"sha1\":\"abc\"}", &mut rng).unwrap();
        assert_eq!(envelope.len(), PUBLIC_KEY_LEN + NONCE_LEN + 14 + TAG_LEN);
        assert_eq!(open(&secret, &envelope), b"{\"sha1\":\"abc\"}");
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let (_, key) = recipient(1);

        let a = key.seal(b"payload", &mut StdRng::seed_from_u64(7)).unwrap();
        let b = key.seal(b"payload", &mut StdRng::seed_from_u64(7)).unwrap();
        let c = key.seal(b"payload", &mut StdRng::seed_from_u64(8)).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_low_order_key_is_rejected() {
        let key = SealingKey::from_bytes([0u8; 32]);
        let result = key.seal(b"payload", &mut StdRng::seed_from_u64(1));

        assert!(matches!(result, Err(CredentialError::EncryptionUnavailable(_))));
    }

    #[test]
    fn test_key_from_base64() {
        let (_, key) = recipient(3);
        let encoded = STANDARD.encode(key.to_bytes());

        let parsed = SealingKey::from_base64(&format!("  {}\n", encoded)).unwrap();
        assert_eq!(parsed.to_bytes(), key.to_bytes());

        assert!(matches!(
            SealingKey::from_base64("c2hvcnQ="),
            Err(CredentialError::InvalidKey(_))
        ));
        assert!(matches!(
            SealingKey::from_base64("not base64!"),
            Err(CredentialError::InvalidKey(_))
        ));
    }
}
