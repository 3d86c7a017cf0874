use super::packet::{PayloadType, RtpDecodeError};
use super::timing::NtpTimestamp;

/// Sync packet sent by the sender on the control channel about once a second
///
/// Binds the sender's clock to its RTP timeline: `rtp_now` is the
/// timestamp being played at `ntp_time`, and `rtp_now_latency` is that
/// timestamp minus the latency the sender wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPacket {
    /// Extension bit; set on the first sync after RECORD or FLUSH
    pub first: bool,
    /// Value of the sequence field (7 on AirPlay, 4 on some senders)
    pub flags: u16,
    /// RTP timestamp minus the requested latency
    pub rtp_now_latency: u32,
    /// Sender clock
    pub ntp_time: NtpTimestamp,
    /// RTP timestamp playing at `ntp_time`
    pub rtp_now: u32,
}

impl SyncPacket {
    /// Wire size
    pub const SIZE: usize = 20;

    /// Decode a sync packet
    ///
    /// # Errors
    ///
    /// Returns `RtpDecodeError` on short or mistyped packets.
    pub fn decode(buf: &[u8]) -> Result<Self, RtpDecodeError> {
        if buf.len() < Self::SIZE {
            return Err(RtpDecodeError::BufferTooSmall {
                needed: Self::SIZE,
                have: buf.len(),
            });
        }
        match PayloadType::from_byte(buf[1]) {
            Some(PayloadType::Sync) => {}
            Some(other) => return Err(RtpDecodeError::UnexpectedPayloadType(other)),
            None => return Err(RtpDecodeError::UnknownPayloadType(buf[1] & 0x7F)),
        }

        Ok(Self {
            first: buf[0] & 0x10 != 0,
            flags: u16::from_be_bytes([buf[2], buf[3]]),
            rtp_now_latency: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            ntp_time: NtpTimestamp::decode(&buf[8..16]),
            rtp_now: u32::from_be_bytes([buf[16], buf[17], buf[18], buf[19]]),
        })
    }

    /// Encode, as a sender would
    #[must_use]
    pub fn encode(&self) -> [u8; 20] {
        let mut buf = [0u8; 20];
        buf[0] = if self.first { 0x90 } else { 0x80 };
        buf[1] = 0x80 | PayloadType::Sync as u8;
        buf[2..4].copy_from_slice(&self.flags.to_be_bytes());
        buf[4..8].copy_from_slice(&self.rtp_now_latency.to_be_bytes());
        buf[8..16].copy_from_slice(&self.ntp_time.encode());
        buf[16..20].copy_from_slice(&self.rtp_now.to_be_bytes());
        buf
    }
}

/// Resend request sent by the receiver to the sender's control port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResendRequest {
    /// First missing sequence number
    pub first: u16,
    /// Number of consecutive missing packets
    pub count: u16,
}

impl ResendRequest {
    /// Wire size
    pub const SIZE: usize = 8;

    /// Encode with the receiver's own request counter
    #[must_use]
    pub fn encode(&self, sequence: u16) -> [u8; 8] {
        let mut buf = [0u8; 8];
        buf[0] = 0x80;
        buf[1] = 0x80 | PayloadType::ResendRequest as u8;
        buf[2..4].copy_from_slice(&sequence.to_be_bytes());
        buf[4..6].copy_from_slice(&self.first.to_be_bytes());
        buf[6..8].copy_from_slice(&self.count.to_be_bytes());
        buf
    }

    /// Decode, as a sender would
    ///
    /// # Errors
    ///
    /// Returns `RtpDecodeError` on short or mistyped packets.
    pub fn decode(buf: &[u8]) -> Result<Self, RtpDecodeError> {
        if buf.len() < Self::SIZE {
            return Err(RtpDecodeError::BufferTooSmall {
                needed: Self::SIZE,
                have: buf.len(),
            });
        }
        if PayloadType::from_byte(buf[1]) != Some(PayloadType::ResendRequest) {
            return Err(RtpDecodeError::UnknownPayloadType(buf[1] & 0x7F));
        }
        Ok(Self {
            first: u16::from_be_bytes([buf[4], buf[5]]),
            count: u16::from_be_bytes([buf[6], buf[7]]),
        })
    }
}

/// Audio packet carried inside a retransmit (0x56) packet
///
/// The retransmitted audio packet, header included, follows a 4-byte prefix.
///
/// # Errors
///
/// Returns `RtpDecodeError::BufferTooSmall` if nothing follows the prefix.
pub fn unwrap_retransmit(buf: &[u8]) -> Result<&[u8], RtpDecodeError> {
    const PREFIX: usize = 4;
    if buf.len() <= PREFIX {
        return Err(RtpDecodeError::BufferTooSmall {
            needed: PREFIX + 1,
            have: buf.len(),
        });
    }
    Ok(&buf[PREFIX..])
}
