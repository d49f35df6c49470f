//! Password-based authenticated encryption codec.
//!
//! # Responsibility
//! - Reversibly protect a single opaque text blob under a password.
//! - Keep the envelope self-contained: everything needed to decrypt except
//!   the password travels inside it.
//!
//! # Invariants
//! - Salt and nonce are freshly drawn from the OS RNG on every `seal`; two
//!   seals of the same input never produce the same envelope.
//! - Envelope layout is fixed: `salt(16) || nonce(12) || ciphertext+tag`,
//!   standard base64. Changing it breaks previously sealed notes.
//! - Wrong password and corrupted data are indistinguishable on `open`.
//! - The derived key never leaves this module and is never persisted.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Salt prefix length in bytes.
pub const SALT_LEN: usize = 16;
/// Nonce length in bytes (96-bit GCM nonce).
pub const NONCE_LEN: usize = 12;
/// GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;
/// PBKDF2-HMAC-SHA256 iteration count. Deliberately slow.
pub const KDF_ITERATIONS: u32 = 100_000;

const KEY_LEN: usize = 32;

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Codec failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// Authentication failed: wrong password or corrupted envelope. The two
    /// cases are deliberately not distinguished.
    InvalidPassword,
    /// The cipher rejected the encryption input.
    SealFailed,
}

impl Display for CryptoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPassword => write!(f, "invalid password or corrupted data"),
            Self::SealFailed => write!(f, "encryption failed"),
        }
    }
}

impl Error for CryptoError {}

/// Seals `plaintext` under `password` into a self-contained envelope.
///
/// Derives a 256-bit key from the password and a fresh 128-bit salt via
/// PBKDF2-HMAC-SHA256, then encrypts with AES-256-GCM under a fresh 96-bit
/// nonce. Salt and nonce are not secret and are carried in the envelope.
pub fn seal(plaintext: &str, password: &str) -> CryptoResult<String> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut nonce_bytes);

    let key = derive_key(password, &salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
        .map_err(|_| CryptoError::SealFailed)?;

    let mut raw = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    raw.extend_from_slice(&salt);
    raw.extend_from_slice(&nonce_bytes);
    raw.extend_from_slice(&ciphertext);

    Ok(STANDARD.encode(raw))
}

/// Opens an envelope produced by [`seal`], returning the plaintext.
///
/// # Errors
/// - [`CryptoError::InvalidPassword`] when the envelope cannot be parsed,
///   the authentication tag check fails, or the plaintext is not UTF-8.
///   Partially decrypted data is never returned.
pub fn open(envelope: &str, password: &str) -> CryptoResult<String> {
    let raw = STANDARD
        .decode(envelope)
        .map_err(|_| CryptoError::InvalidPassword)?;
    if raw.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
        return Err(CryptoError::InvalidPassword);
    }

    let (salt, rest) = raw.split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

    let key = derive_key(password, salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| CryptoError::InvalidPassword)?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidPassword)
}

fn derive_key(password: &str, salt: &[u8]) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, KDF_ITERATIONS, &mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::{open, seal, CryptoError, NONCE_LEN, SALT_LEN, TAG_LEN};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    #[test]
    fn seal_then_open_roundtrips() {
        let envelope = seal("secret body", "hunter2").expect("seal should succeed");
        let plaintext = open(&envelope, "hunter2").expect("open should succeed");
        assert_eq!(plaintext, "secret body");
    }

    #[test]
    fn open_with_wrong_password_fails_closed() {
        let envelope = seal("secret body", "correct").expect("seal should succeed");
        assert_eq!(
            open(&envelope, "wrong").expect_err("wrong password must fail"),
            CryptoError::InvalidPassword
        );
    }

    #[test]
    fn sealing_twice_yields_distinct_envelopes() {
        let first = seal("same input", "same password").expect("seal should succeed");
        let second = seal("same input", "same password").expect("seal should succeed");
        assert_ne!(first, second);
    }

    #[test]
    fn envelope_layout_is_salt_nonce_ciphertext_tag() {
        let plaintext = "layout probe";
        let envelope = seal(plaintext, "pw").expect("seal should succeed");
        let raw = STANDARD.decode(envelope).expect("envelope must be base64");
        assert_eq!(raw.len(), SALT_LEN + NONCE_LEN + plaintext.len() + TAG_LEN);
    }

    #[test]
    fn tampered_envelope_is_rejected() {
        let envelope = seal("integrity matters", "pw").expect("seal should succeed");
        let mut raw = STANDARD.decode(envelope).expect("envelope must be base64");
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = STANDARD.encode(raw);
        assert_eq!(
            open(&tampered, "pw").expect_err("tampering must be detected"),
            CryptoError::InvalidPassword
        );
    }

    #[test]
    fn truncated_envelope_is_rejected() {
        assert_eq!(
            open("AAAA", "pw").expect_err("short envelope must fail"),
            CryptoError::InvalidPassword
        );
        assert_eq!(
            open("not-base64!!!", "pw").expect_err("bad encoding must fail"),
            CryptoError::InvalidPassword
        );
    }
}
