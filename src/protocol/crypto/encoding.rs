//! Base64 helpers
//!
//! Senders are inconsistent about trailing `=` padding (iTunes drops it on
//! `rsaaeskey`, `aesiv` and `Apple-Challenge`), so every decode goes
//! through [`pad`] first and the strict standard engine is used after that.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};

use super::CryptoError;

/// Pad a base64 string with `=` up to a multiple of four characters
///
/// Surrounding whitespace is removed. Input that is already padded is
/// returned unchanged.
#[must_use]
pub fn pad(input: &str) -> String {
    let trimmed = input.trim();
    let mut padded = String::with_capacity(trimmed.len() + 3);
    padded.push_str(trimmed);
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    padded
}

/// Decode standard-alphabet base64, with or without padding
///
/// # Errors
///
/// Returns [`CryptoError::InvalidBase64`] if the input is not valid base64
/// once padded.
pub fn decode(input: &str) -> Result<Vec<u8>, CryptoError> {
    Ok(STANDARD.decode(pad(input))?)
}

/// Encode to standard-alphabet base64 with padding
#[must_use]
pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encode to standard-alphabet base64 with the trailing `=` stripped
#[must_use]
pub fn encode_unpadded(data: &[u8]) -> String {
    STANDARD_NO_PAD.encode(data)
}
