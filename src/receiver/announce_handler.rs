//! ANNOUNCE request handler
//!
//! Extracts the wrapped session key, the IV and the codec parameters from
//! the SDP body. A key that cannot be unwrapped is left unset; whether the
//! stream can still play depends on the codec.

use zeroize::Zeroizing;

use crate::protocol::crypto::{AirportKey, CryptoError, base64_decode};
use crate::protocol::rtsp::RtspRequest;
use crate::protocol::sdp::{AudioCodec, SdpParseError, SdpParser, SessionDescription};

use super::active_remote::RemoteIdentity;
use super::session::StreamParameters;

/// Errors from ANNOUNCE handling
#[derive(Debug, thiserror::Error)]
pub enum AnnounceError {
    /// Empty body in ANNOUNCE
    #[error("Empty body in ANNOUNCE")]
    EmptyBody,

    /// Body is not valid UTF-8
    #[error("Body is not valid UTF-8")]
    InvalidUtf8,

    /// SDP parse error
    #[error("SDP parse error: {0}")]
    SdpParse(#[from] SdpParseError),
}

/// Everything ANNOUNCE establishes
#[derive(Debug)]
pub struct Announcement {
    /// Stream parameters for SETUP
    pub stream: StreamParameters,
    /// Remote control identity, when the sender offered one
    pub remote: Option<RemoteIdentity>,
}

/// Process an ANNOUNCE request
///
/// # Errors
///
/// Returns `AnnounceError` if the request body is missing or is not SDP.
pub fn process_announce(request: &RtspRequest) -> Result<Announcement, AnnounceError> {
    if request.body.is_empty() {
        return Err(AnnounceError::EmptyBody);
    }

    let sdp_str = std::str::from_utf8(&request.body).map_err(|_| AnnounceError::InvalidUtf8)?;
    let sdp = SdpParser::parse(sdp_str)?;

    let stream = StreamParameters {
        key: session_key(&sdp),
        iv: session_iv(&sdp),
        fmtp: sdp.fmtp().map(str::to_string),
        codec: Some(AudioCodec::from_sdp(&sdp)),
    };
    tracing::info!(
        codec = ?stream.codec,
        encrypted = stream.is_encrypted(),
        fmtp = ?stream.fmtp,
        "stream announced"
    );

    Ok(Announcement {
        stream,
        remote: RemoteIdentity::from_headers(&request.headers),
    })
}

fn session_key(sdp: &SessionDescription) -> Option<Zeroizing<Vec<u8>>> {
    let wrapped = sdp.rsaaeskey()?;
    let unwrap = || -> Result<Vec<u8>, CryptoError> {
        let ciphertext = base64_decode(wrapped)?;
        AirportKey::shared()?.decrypt_session_key(&ciphertext)
    };

    match unwrap() {
        Ok(key) => Some(Zeroizing::new(key)),
        Err(e) => {
            tracing::warn!(error = %e, "cannot unwrap session key");
            None
        }
    }
}

fn session_iv(sdp: &SessionDescription) -> Option<Vec<u8>> {
    let encoded = sdp.aesiv()?;
    base64_decode(encoded)
        .inspect_err(|e| tracing::warn!(error = %e, "invalid aesiv"))
        .ok()
}
