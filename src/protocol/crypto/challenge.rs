//! `Apple-Challenge` / `Apple-Response`

use std::net::IpAddr;

use super::{AirportKey, CryptoError, encoding};

/// Minimum size of the signed block; shorter blocks are zero padded
pub const CHALLENGE_BLOCK_LEN: usize = 32;

/// Bytes of an IPv4 challenge block left for the challenge itself
const MAX_CHALLENGE_V4: usize = CHALLENGE_BLOCK_LEN - 4 - 6;

/// Compute the `Apple-Response` header value
///
/// The signed block is `challenge || local address || mac`, zero padded to
/// [`CHALLENGE_BLOCK_LEN`] bytes. `local_ip` must be the address the sender
/// connected to. The result is base64 without trailing `=`.
///
/// # Errors
///
/// Returns an error if the challenge is not valid base64 or signing fails.
pub fn apple_response(
    key: &AirportKey,
    challenge: &str,
    local_ip: IpAddr,
    mac: &[u8; 6],
) -> Result<String, CryptoError> {
    let challenge = encoding::decode(challenge)?;

    let mut block = Vec::with_capacity(CHALLENGE_BLOCK_LEN + 16);
    match local_ip.to_canonical() {
        IpAddr::V4(v4) => {
            block.extend_from_slice(&challenge[..challenge.len().min(MAX_CHALLENGE_V4)]);
            block.extend_from_slice(&v4.octets());
        }
        IpAddr::V6(v6) => {
            block.extend_from_slice(&challenge);
            block.extend_from_slice(&v6.octets());
        }
    }
    block.extend_from_slice(mac);
    if block.len() < CHALLENGE_BLOCK_LEN {
        block.resize(CHALLENGE_BLOCK_LEN, 0);
    }

    let signature = key.sign_raw(&block)?;
    Ok(encoding::encode_unpadded(&signature))
}
