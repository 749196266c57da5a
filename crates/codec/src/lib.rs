//! Deterministic authenticated encryption for bot credential tokens.
//!
//! `encrypt` is a pure function of `(key, plaintext)`: the nonce is derived
//! from `HMAC-SHA256(key, plaintext)` rather than drawn at random, so the
//! same plaintext under the same key always produces the same ciphertext.
//! This lets the credential store index and query tokens by ciphertext
//! equality without ever storing the plaintext. Do not substitute a
//! random-nonce AEAD here — it would break that lookup.

mod error;

use {
    aes_gcm::{
        Aes256Gcm, Nonce,
        aead::{Aead, KeyInit, Payload},
    },
    base64::{Engine, engine::general_purpose::STANDARD},
    hmac::{Hmac, Mac},
    sha2::Sha256,
    zeroize::Zeroizing,
};

pub use error::{CodecError, Result};

pub const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

type HmacSha256 = Hmac<Sha256>;

/// A validated 32-byte encryption key, zeroized on drop.
#[derive(Clone)]
pub struct EncryptionKey(Zeroizing<[u8; KEY_LEN]>);

impl EncryptionKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_LEN {
            return Err(CodecError::InvalidKeyLength {
                expected: KEY_LEN,
                actual: bytes.len(),
            });
        }
        let mut buf = [0u8; KEY_LEN];
        buf.copy_from_slice(bytes);
        Ok(Self(Zeroizing::new(buf)))
    }

    fn as_slice(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}

fn derive_nonce(key: &[u8], plaintext: &str) -> Result<[u8; NONCE_LEN]> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|_| CodecError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: key.len(),
        })?;
    mac.update(plaintext.as_bytes());
    let digest = mac.finalize().into_bytes();
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&digest[..NONCE_LEN]);
    Ok(nonce)
}

/// Encrypts `plaintext` under `key`, returning a base64-encoded
/// `nonce ‖ ciphertext ‖ tag` blob. Bit-identical for repeated calls with
/// the same `(key, plaintext)` pair.
pub fn encrypt(key: &[u8], plaintext: &str) -> Result<String> {
    let key = EncryptionKey::from_bytes(key)?;
    encrypt_with_key(&key, plaintext)
}

pub fn encrypt_with_key(key: &EncryptionKey, plaintext: &str) -> Result<String> {
    let nonce_bytes = derive_nonce(key.as_slice(), plaintext)?;
    let cipher = Aes256Gcm::new_from_slice(key.as_slice())
        .map_err(|_| CodecError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: key.as_slice().len(),
        })?;
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext.as_bytes(),
                aad: &[],
            },
        )
        .map_err(|_| CodecError::DecryptionFailed)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(out))
}

/// Decrypts a blob produced by [`encrypt`]. Fails uniformly with
/// [`CodecError::DecryptionFailed`] on wrong key, tampering, or truncation,
/// so callers cannot distinguish "wrong key" from "corrupted" — that
/// distinction is not meaningful to the caller here.
pub fn decrypt(key: &[u8], encoded: &str) -> Result<String> {
    let key = EncryptionKey::from_bytes(key)?;
    decrypt_with_key(&key, encoded)
}

pub fn decrypt_with_key(key: &EncryptionKey, encoded: &str) -> Result<String> {
    let raw = STANDARD.decode(encoded)?;
    if raw.len() < NONCE_LEN {
        return Err(CodecError::CiphertextTooShort {
            nonce_len: NONCE_LEN,
        });
    }
    let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key.as_slice())
        .map_err(|_| CodecError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: key.as_slice().len(),
        })?;
    let nonce = Nonce::from_slice(nonce_bytes);
    let plaintext = cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad: &[],
            },
        )
        .map_err(|_| CodecError::DecryptionFailed)?;
    Ok(String::from_utf8(plaintext)?)
}
