//! Receiver session
//!
//! One [`Session`] exists per accepted control connection. It carries the
//! stream parameters negotiated in ANNOUNCE, owns the RTP context created
//! at SETUP and the remote control lookup started with ANNOUNCE, and tears
//! both down together.

use std::net::{IpAddr, SocketAddr};

use zeroize::Zeroizing;

use crate::protocol::crypto::{AudioCipher, CryptoError};
use crate::protocol::sdp::AudioCodec;

use super::active_remote::ActiveRemote;
use super::rtp::{RtpContext, RtpError};

/// Session states following the RAOP request flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Control connection accepted
    Connected,
    /// ANNOUNCE received, stream parameters known
    Announced,
    /// SETUP complete, RTP sockets bound
    Setup,
    /// RECORD received, streaming
    Recording,
    /// FLUSH discarded buffered audio
    Flushed,
    /// TEARDOWN received; the connection may start over with ANNOUNCE
    Teardown,
    /// Connection gone
    Closed,
}

impl SessionState {
    /// Check if transition to new state is valid
    #[must_use]
    pub fn can_transition_to(&self, new_state: SessionState) -> bool {
        use SessionState::{Announced, Closed, Connected, Flushed, Recording, Setup, Teardown};

        match (self, new_state) {
            (Connected | Announced | Teardown, Announced | Setup)
            | (Setup | Recording | Flushed, Recording | Flushed)
            | (Connected | Announced | Setup | Recording | Flushed | Teardown, Teardown)
            | (_, Closed) => true,

            _ => false,
        }
    }
}

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Request not allowed in the current state
    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// Current state
        from: SessionState,
        /// Requested state
        to: SessionState,
    },

    /// The output refused the stream
    #[error("output refused the stream")]
    Refused,

    /// A stream operation arrived before SETUP
    #[error("no RTP stream set up")]
    NoStream,

    /// RTP context could not be created
    #[error("RTP error: {0}")]
    Rtp(#[from] RtpError),

    /// Session key or IV unusable
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Stream parameters from ANNOUNCE
#[derive(Default)]
pub struct StreamParameters {
    /// AES session key, unwrapped from `rsaaeskey`
    pub key: Option<Zeroizing<Vec<u8>>>,
    /// AES IV from `aesiv`
    pub iv: Option<Vec<u8>>,
    /// Codec format parameters
    pub fmtp: Option<String>,
    /// Announced codec
    pub codec: Option<AudioCodec>,
}

impl StreamParameters {
    /// Cipher for the audio payloads, `None` for clear streams
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKeyLength` if the key or IV is not 16
    /// bytes.
    pub fn cipher(&self) -> Result<Option<AudioCipher>, CryptoError> {
        match (&self.key, &self.iv) {
            (Some(key), Some(iv)) => AudioCipher::new(key, iv).map(Some),
            (Some(_), None) => {
                tracing::warn!("session key without IV, treating stream as clear");
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Whether a session key was negotiated
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.key.is_some()
    }
}

impl std::fmt::Debug for StreamParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamParameters")
            .field("encrypted", &self.is_encrypted())
            .field("fmtp", &self.fmtp)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

/// State of one control connection
#[derive(Debug)]
pub struct Session {
    peer: SocketAddr,
    local: SocketAddr,
    mac: [u8; 6],
    state: SessionState,
    stream: StreamParameters,
    rtp: Option<RtpContext>,
    remote: Option<ActiveRemote>,
}

impl Session {
    /// Session for a connection from `peer` accepted on `local`
    #[must_use]
    pub fn new(peer: SocketAddr, local: SocketAddr, mac: [u8; 6]) -> Self {
        Self {
            peer,
            local,
            mac,
            state: SessionState::Connected,
            stream: StreamParameters::default(),
            rtp: None,
            remote: None,
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Sender address
    #[must_use]
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Address the sender connected to
    #[must_use]
    pub fn local_ip(&self) -> IpAddr {
        self.local.ip().to_canonical()
    }

    /// Receiver MAC address
    #[must_use]
    pub fn mac(&self) -> &[u8; 6] {
        &self.mac
    }

    /// Negotiated stream parameters
    #[must_use]
    pub fn stream(&self) -> &StreamParameters {
        &self.stream
    }

    /// Replace the stream parameters
    pub fn set_stream(&mut self, stream: StreamParameters) {
        self.stream = stream;
    }

    /// Move to `to`
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` when the flow does not
    /// allow it.
    pub fn transition(&mut self, to: SessionState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(to) {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        if self.state != to {
            tracing::debug!(peer = %self.peer, from = ?self.state, ?to, "session state");
        }
        self.state = to;
        Ok(())
    }

    /// RTP context, once SETUP succeeded
    #[must_use]
    pub fn rtp(&self) -> Option<&RtpContext> {
        self.rtp.as_ref()
    }

    /// Take ownership of a freshly started RTP context
    pub fn attach_rtp(&mut self, rtp: RtpContext) {
        self.rtp = Some(rtp);
    }

    /// Stop the RTP context, if any; returns whether one was running
    pub async fn stop_rtp(&mut self) -> bool {
        match self.rtp.take() {
            Some(rtp) => {
                rtp.shutdown().await;
                true
            }
            None => false,
        }
    }

    /// Track a remote control lookup started for this session
    pub fn attach_remote(&mut self, remote: ActiveRemote) {
        self.remote = Some(remote);
    }

    /// Stop the remote control lookup and forget the remote
    pub async fn stop_remote(&mut self) {
        if let Some(remote) = self.remote.take() {
            remote.stop().await;
        }
    }

    /// Release everything negotiated so far
    ///
    /// The remote lookup is stopped and the RTP task joined before this
    /// returns, so no callback can fire afterwards. Returns whether an RTP
    /// context was running.
    pub async fn teardown(&mut self) -> bool {
        self.stop_remote().await;
        let had_rtp = self.stop_rtp().await;
        self.stream = StreamParameters::default();
        had_rtp
    }

    /// Tear down and mark the session closed
    pub async fn close(&mut self) -> bool {
        let had_rtp = self.teardown().await;
        self.state = SessionState::Closed;
        tracing::info!(peer = %self.peer, "session closed");
        had_rtp
    }
}
