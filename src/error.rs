use thiserror::Error;

use crate::discovery::AdvertiserError;
use crate::protocol::crypto::CryptoError;
use crate::protocol::dacp::DacpError;
use crate::protocol::rtp::RtpDecodeError;
use crate::protocol::rtsp::ParseError;
use crate::protocol::sdp::SdpParseError;
use crate::receiver::ConfigError;
use crate::receiver::rtp::RtpError;
use crate::receiver::session::SessionError;

/// Errors surfaced by the receiver
#[derive(Debug, Error)]
pub enum RaopError {
    /// Socket failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Key handling or audio cipher failure
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Malformed RTSP request
    #[error("RTSP error: {0}")]
    Rtsp(#[from] ParseError),

    /// Malformed SDP in ANNOUNCE
    #[error("SDP error: {0}")]
    Sdp(#[from] SdpParseError),

    /// Malformed RTP packet
    #[error("RTP packet error: {0}")]
    Packet(#[from] RtpDecodeError),

    /// RTP engine failure
    #[error("RTP error: {0}")]
    Rtp(#[from] RtpError),

    /// Session flow failure
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Remote control failure
    #[error("remote control error: {0}")]
    Dacp(#[from] DacpError),

    /// Service advertisement failure
    #[error("advertisement error: {0}")]
    Advertiser(#[from] AdvertiserError),
}

impl RaopError {
    /// Whether the error ends only the current session, not the receiver
    #[must_use]
    pub fn is_session_scoped(&self) -> bool {
        matches!(
            self,
            Self::Rtsp(_)
                | Self::Sdp(_)
                | Self::Packet(_)
                | Self::Rtp(_)
                | Self::Session(_)
                | Self::Crypto(_)
                | Self::Dacp(_)
        )
    }
}

/// Result type alias for receiver operations
pub type Result<T> = std::result::Result<T, RaopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use");
        let err: RaopError = io.into();
        assert!(matches!(err, RaopError::Io(_)));
        assert!(!err.is_session_scoped());

        let err: RaopError = SessionError::NoStream.into();
        assert!(err.is_session_scoped());
        assert_eq!(err.to_string(), "session error: no RTP stream set up");
    }

    #[test]
    fn test_nested_display() {
        let err: RaopError = RtpError::from(RtpDecodeError::InvalidVersion(1)).into();
        assert!(err.to_string().starts_with("RTP error: invalid packet"));
    }
}
