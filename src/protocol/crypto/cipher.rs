//! RAOP audio payload cipher

use aes::Aes128;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit, generic_array::GenericArray};
use zeroize::Zeroizing;

use super::CryptoError;

/// AES block size
pub const AES_BLOCK_LEN: usize = 16;

/// AES-128-CBC as RAOP applies it to audio packets
///
/// The chain restarts from the session IV on every packet and only whole
/// blocks are encrypted; a trailing partial block travels in the clear.
pub struct AudioCipher {
    cipher: Aes128,
    iv: [u8; AES_BLOCK_LEN],
}

impl AudioCipher {
    /// Create a cipher from the unwrapped session key and the SDP IV
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] unless both are 16 bytes.
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self, CryptoError> {
        let key: Zeroizing<[u8; AES_BLOCK_LEN]> =
            Zeroizing::new(key.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: AES_BLOCK_LEN,
                actual: key.len(),
            })?);
        let iv: [u8; AES_BLOCK_LEN] = iv.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: AES_BLOCK_LEN,
            actual: iv.len(),
        })?;

        Ok(Self {
            cipher: Aes128::new(GenericArray::from_slice(key.as_slice())),
            iv,
        })
    }

    /// Decrypt one packet payload in place
    pub fn decrypt_in_place(&self, payload: &mut [u8]) {
        let whole = payload.len() - payload.len() % AES_BLOCK_LEN;
        let mut prev = self.iv;

        for chunk in payload[..whole].chunks_exact_mut(AES_BLOCK_LEN) {
            let mut ciphertext = [0u8; AES_BLOCK_LEN];
            ciphertext.copy_from_slice(chunk);

            let block = GenericArray::from_mut_slice(chunk);
            self.cipher.decrypt_block(block);
            for (b, p) in block.iter_mut().zip(prev.iter()) {
                *b ^= *p;
            }
            prev = ciphertext;
        }
    }

    /// Encrypt one packet payload in place, as a sender would
    pub fn encrypt_in_place(&self, payload: &mut [u8]) {
        let whole = payload.len() - payload.len() % AES_BLOCK_LEN;
        let mut prev = self.iv;

        for chunk in payload[..whole].chunks_exact_mut(AES_BLOCK_LEN) {
            for (b, p) in chunk.iter_mut().zip(prev.iter()) {
                *b ^= *p;
            }
            let block = GenericArray::from_mut_slice(chunk);
            self.cipher.encrypt_block(block);
            prev.copy_from_slice(block);
        }
    }
}

impl std::fmt::Debug for AudioCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioCipher").finish_non_exhaustive()
    }
}
