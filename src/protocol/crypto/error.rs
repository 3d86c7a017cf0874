use thiserror::Error;

/// Cryptographic operation errors
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("invalid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),
}
