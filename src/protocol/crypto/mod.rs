//! Cryptographic primitives for the RAOP handshake and the audio stream
//!
//! Every AirPlay 1 sender expects the receiver to hold the same RSA key as
//! the first-generation AirPort Express. It is used for two things only: answering
//! the `Apple-Challenge` header and unwrapping the AES session key sent in
//! ANNOUNCE. Audio packets are then AES-128-CBC encrypted with that key.

mod challenge;
mod cipher;
mod encoding;
mod error;
mod keys;

#[cfg(test)]
mod tests;

pub use self::challenge::{CHALLENGE_BLOCK_LEN, apple_response};
pub use self::cipher::{AES_BLOCK_LEN, AudioCipher};
pub use self::encoding::{
    decode as base64_decode, encode as base64_encode, encode_unpadded as base64_encode_unpadded,
    pad as base64_pad,
};
pub use self::error::CryptoError;
pub use self::keys::AirportKey;
