use thiserror::Error;

/// Errors produced by the deterministic token codec.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encryption key must be {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("ciphertext is not valid base64")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("ciphertext shorter than the nonce ({nonce_len} bytes)")]
    CiphertextTooShort { nonce_len: usize },

    #[error("wrong key or tampered ciphertext")]
    DecryptionFailed,

    #[error("decrypted plaintext is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

pub type Result<T> = std::result::Result<T, CodecError>;
