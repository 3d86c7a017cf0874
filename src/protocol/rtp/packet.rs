use thiserror::Error;

/// RTP payload types seen on RAOP channels (marker bit stripped)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PayloadType {
    /// Timing request
    TimingRequest = 0x52,
    /// Timing reply
    TimingReply = 0x53,
    /// Sync
    Sync = 0x54,
    /// Resend request
    ResendRequest = 0x55,
    /// Retransmitted audio
    Retransmit = 0x56,
    /// Audio data
    Audio = 0x60,
}

impl PayloadType {
    /// Parse from the second header byte
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b & 0x7F {
            0x52 => Some(Self::TimingRequest),
            0x53 => Some(Self::TimingReply),
            0x54 => Some(Self::Sync),
            0x55 => Some(Self::ResendRequest),
            0x56 => Some(Self::Retransmit),
            0x60 => Some(Self::Audio),
            _ => None,
        }
    }
}

/// RTP header of an audio packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    /// Extension flag (set on the first packet after a flush)
    pub extension: bool,
    /// Marker bit
    pub marker: bool,
    /// Payload type
    pub payload_type: PayloadType,
    /// Sequence number
    pub sequence: u16,
    /// RTP timestamp (frames)
    pub timestamp: u32,
    /// Synchronization source ID
    pub ssrc: u32,
}

impl RtpHeader {
    /// Standard RTP header size
    pub const SIZE: usize = 12;

    /// Header for an audio packet, as a sender would build it
    #[must_use]
    pub fn audio(sequence: u16, timestamp: u32, ssrc: u32) -> Self {
        Self {
            extension: false,
            marker: false,
            payload_type: PayloadType::Audio,
            sequence,
            timestamp,
            ssrc,
        }
    }

    /// Encode header to bytes
    #[must_use]
    pub fn encode(&self) -> [u8; 12] {
        let mut buf = [0u8; 12];

        // V(2) | P(1) | X(1) | CC(4)
        buf[0] = (2 << 6) | (u8::from(self.extension) << 4);
        // M(1) | PT(7)
        buf[1] = (u8::from(self.marker) << 7) | (self.payload_type as u8 & 0x7F);
        buf[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        buf[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        buf[8..12].copy_from_slice(&self.ssrc.to_be_bytes());

        buf
    }

    /// Decode header from bytes
    ///
    /// # Errors
    ///
    /// Returns `RtpDecodeError` if buffer is too small, the version is not 2
    /// or the payload type is unknown.
    pub fn decode(buf: &[u8]) -> Result<Self, RtpDecodeError> {
        if buf.len() < Self::SIZE {
            return Err(RtpDecodeError::BufferTooSmall {
                needed: Self::SIZE,
                have: buf.len(),
            });
        }

        let version = (buf[0] >> 6) & 0x03;
        if version != 2 {
            return Err(RtpDecodeError::InvalidVersion(version));
        }

        let payload_type = PayloadType::from_byte(buf[1])
            .ok_or(RtpDecodeError::UnknownPayloadType(buf[1] & 0x7F))?;

        Ok(Self {
            extension: (buf[0] >> 4) & 0x01 != 0,
            marker: (buf[1] >> 7) & 0x01 != 0,
            payload_type,
            sequence: u16::from_be_bytes([buf[2], buf[3]]),
            timestamp: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            ssrc: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
        })
    }
}

/// RTP decode errors
#[derive(Debug, Error)]
pub enum RtpDecodeError {
    #[error("buffer too small: need {needed} bytes, have {have}")]
    BufferTooSmall { needed: usize, have: usize },

    #[error("invalid RTP version: {0}")]
    InvalidVersion(u8),

    #[error("unknown payload type: 0x{0:02x}")]
    UnknownPayloadType(u8),

    #[error("unexpected payload type {0:?}")]
    UnexpectedPayloadType(PayloadType),
}
