//! The AirPort Express RSA key

use std::sync::OnceLock;

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::{Oaep, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;

use super::{CryptoError, encoding};

/// PKCS#1 DER of the AirPort Express private key, base64 encoded.
///
/// Senders verify `Apple-Response` against the matching public key and
/// encrypt the session key to it, so it must stay exactly as is.
const AIRPORT_KEY: &str = concat!(
    "MIIEpQIBAAKCAQEA59dE8qLieItsH1WgjrcFRKj6eUWqi+bGLOX1HL3U3GhC/j0Qg90u3sG/1CUt",
    "wC5vOYvfDmFI6oSFXi5ELabWJmT2dKHzBJKa3k9ok+8t9ucRqMd6DZHJ2YCCLlDRKSKv6kDqnw4U",
    "wPdpOMXziC/AMj3Z/lUVX1G7WSHCAWKf1zNS1eLvqr+boEjXuBOitnZ/bDzPHrTOZz0Dew0uowxf",
    "/+sG+NCK3eQJVxqcaJ/vEHKIVd2M+5qL71yJQ+87X6oV3eaYvt3zWZYD6z5vYTcrtij2VZ9Zmni/",
    "UAaHqn9JdsBWLUEpVviYnhimNVvYFZeCXg/IdTQ+x4IRdiXNv5hEewIDAQABAoIBAQDl8Axy9XfW",
    "BLmkzkEiqoSwF0PsmVrPzH9KsnwLGH+QZlvjWd8SWYGN7u1507HvhF5N3drJoVU3O14nDY4TFQAa",
    "LlJ9VM35AApXaLyY1ERrN7u9ALKd2LUwYhM7Km539O4yUFYikE2nIPscEsA5ltpxOgUGCY7b7ez5",
    "NtD6nL1ZKauw7aNXmVAvmJTcuPxWmoktF3gDJKK2wxZuNGcJE0uFQEG4Z3BrWP7yoNuSK3dii2jm",
    "lpPHr0O/KnPQtzI3eguhe0TwUem/eYSdyzMyVx/YpwkzwtYL3sR5k0o9rKQLtvLzfAqdBxBurciz",
    "aaA/L0HIgAmOit1GJA2saMxTVPNhAoGBAPfgv1oeZxgxmotiCcMXFEQEWflzhWYTsXrhUIuz5jFu",
    "a39GLS99ZEErhLdrwj8rDDViRVJ5skOp9zFvlYAHs0xh92ji1E7V/ysnKBfsMrPkk5KSKPrnjndM",
    "oPdevWnVkgJ5jxFuNgxkOLMuG9i53B4yMvDTCRiIPMQ++N2iLDaRAoGBAO9v//mU8eVkQaoANf0Z",
    "oMjW8CN4xwWA2cSEIHkd9AfFkftuv8oyLDCG3ZAf0vrhrrtkrfa7ef+AUb69DNggq4mHQAYBp7L+",
    "k5DKzJrKuO0r+R0YbY9pZD1+/g9dVt91d6LQNepUE/yY2PP5CNoFmjedpLHMOPFdVgqDzDFxU8hL",
    "AoGBANDrr7xAJbqBjHVwIzQ4To9pb4BNeqDndk5Qe7fT3+/H1njGaC0/rXE0Qb7q5ySgnsCb3DvA",
    "cJyRM9SJ7OKlGt0FMSdJD5KG0XPIpAVNwgpXXH5MDJg09KHeh0kXo+QA6viFBi21y340NonnEfdf",
    "54PX4ZGS/Xac1UK+pLkBB+zRAoGAf0AY3H3qKS2lMEI4bzEFoHeK3G895pDaK3TFBVmD7fV0Zhov",
    "17fegFPMwOII8MisYm9ZfT2Z0s5Ro3s5rkt+nvLAdfC/PYPKzTLalpGSwomSNYJcB9HNMlmhkGzc",
    "1JnLYT4iyUyx6pcZBmCd8bD0iwY/FzcgNDaUmbX9+XDvRA0CgYEAkE7pIPlE71qvfJQgoA9em0gI",
    "LAuE4Pu13aKiJnfft7hIjbK+5kyb3TysZvoyDnb3HOKvInK7vXbKuU4ISgxB2bB3HcYzQMGsz1qJ",
    "2gG0N5hvJpzwwhbhXqFKA4zaaSrw622wDniAK5MlIE0tIAKKP4yxNGjoD2QYjhBGuhvkWKY=",
);

/// RSA key shared by every AirPlay 1 receiver
pub struct AirportKey {
    inner: RsaPrivateKey,
}

impl AirportKey {
    /// Parse the embedded key
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidPrivateKey`] if the key material does
    /// not parse, which only happens if the constant was altered.
    pub fn load() -> Result<Self, CryptoError> {
        let der = encoding::decode(AIRPORT_KEY)?;
        let inner = RsaPrivateKey::from_pkcs1_der(&der)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Process-wide instance, parsed on first use
    ///
    /// # Errors
    ///
    /// Propagates [`AirportKey::load`] failures.
    pub fn shared() -> Result<&'static Self, CryptoError> {
        static KEY: OnceLock<AirportKey> = OnceLock::new();

        if let Some(key) = KEY.get() {
            return Ok(key);
        }
        let key = Self::load()?;
        Ok(KEY.get_or_init(|| key))
    }

    /// Unwrap the AES session key carried by `rsaaeskey` (RSA-OAEP, SHA-1)
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::DecryptionFailed`] if the ciphertext was not
    /// produced with the matching public key.
    pub fn decrypt_session_key(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.inner
            .decrypt(Oaep::new::<Sha1>(), ciphertext)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
    }

    /// Raw PKCS#1 v1.5 private-key operation (type 1 padding, no digest info)
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::SigningFailed`] if the message is longer than
    /// the modulus allows.
    pub fn sign_raw(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.inner
            .sign(Pkcs1v15Sign::new_unprefixed(), message)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))
    }

    /// Public half, as used by senders
    #[must_use]
    pub fn public_key(&self) -> RsaPublicKey {
        self.inner.to_public_key()
    }
}

impl std::fmt::Debug for AirportKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AirportKey").finish_non_exhaustive()
    }
}
