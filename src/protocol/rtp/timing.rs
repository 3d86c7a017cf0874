use super::packet::{PayloadType, RtpDecodeError};

/// NTP timestamp (64-bit, seconds since 1900-01-01)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct NtpTimestamp(pub u64);

impl NtpTimestamp {
    /// NTP epoch offset from Unix epoch (70 years in seconds)
    const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

    /// Wall clock now
    #[must_use]
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};

        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        let seconds = duration.as_secs() + Self::NTP_UNIX_OFFSET;
        let fraction = (u64::from(duration.subsec_nanos()) << 32) / 1_000_000_000;
        Self((seconds << 32) | fraction)
    }

    /// Encode to 8 bytes
    #[must_use]
    pub fn encode(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Decode from the first 8 bytes of `buf`
    ///
    /// Callers check the length first.
    #[must_use]
    pub fn decode(buf: &[u8]) -> Self {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&buf[..8]);
        Self(u64::from_be_bytes(raw))
    }
}

/// Convert an NTP duration to milliseconds (wrapping 32-bit result)
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn ntp_to_ms(ntp: u64) -> u32 {
    (((ntp >> 10) * 1000) >> 22) as u32
}

/// Convert milliseconds to an NTP duration
#[must_use]
pub fn ms_to_ntp(ms: u32) -> u64 {
    ((u64::from(ms) << 22) / 1000) << 10
}

/// Timing request sent by the receiver to the sender's timing port
///
/// Instead of a real NTP time, the transmit field carries the receiver's
/// millisecond counter in its low 32 bits; the sender echoes it back as
/// the reply's origin time, which makes round-trip measurement trivial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingRequest {
    /// Local millisecond counter at send time
    pub local_ms: u32,
}

impl TimingRequest {
    /// Wire size
    pub const SIZE: usize = 32;

    /// Encode the request
    #[must_use]
    pub fn encode(&self) -> [u8; 32] {
        let mut buf = [0u8; 32];
        buf[0] = 0x80;
        buf[1] = 0x80 | PayloadType::TimingRequest as u8;
        buf[2..4].copy_from_slice(&7u16.to_be_bytes());
        buf[28..32].copy_from_slice(&self.local_ms.to_be_bytes());
        buf
    }

    /// Decode, as a sender would
    ///
    /// # Errors
    ///
    /// Returns `RtpDecodeError` on short or mistyped packets.
    pub fn decode(buf: &[u8]) -> Result<Self, RtpDecodeError> {
        check(buf, Self::SIZE, PayloadType::TimingRequest)?;
        Ok(Self {
            local_ms: u32::from_be_bytes([buf[28], buf[29], buf[30], buf[31]]),
        })
    }
}

/// Timing reply from the sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingReply {
    /// Echo of the request's transmit field
    pub origin: NtpTimestamp,
    /// Sender clock when the request arrived
    pub receive: NtpTimestamp,
    /// Sender clock when the reply left
    pub transmit: NtpTimestamp,
}

impl TimingReply {
    /// Wire size
    pub const SIZE: usize = 32;

    /// Low 32 bits of the origin field: the receiver's ms counter
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn reference_ms(&self) -> u32 {
        self.origin.0 as u32
    }

    /// Decode a reply
    ///
    /// # Errors
    ///
    /// Returns `RtpDecodeError` on short or mistyped packets.
    pub fn decode(buf: &[u8]) -> Result<Self, RtpDecodeError> {
        check(buf, Self::SIZE, PayloadType::TimingReply)?;
        Ok(Self {
            origin: NtpTimestamp::decode(&buf[8..16]),
            receive: NtpTimestamp::decode(&buf[16..24]),
            transmit: NtpTimestamp::decode(&buf[24..32]),
        })
    }

    /// Encode, as a sender would
    #[must_use]
    pub fn encode(&self) -> [u8; 32] {
        let mut buf = [0u8; 32];
        buf[0] = 0x80;
        buf[1] = 0x80 | PayloadType::TimingReply as u8;
        buf[2..4].copy_from_slice(&7u16.to_be_bytes());
        buf[8..16].copy_from_slice(&self.origin.encode());
        buf[16..24].copy_from_slice(&self.receive.encode());
        buf[24..32].copy_from_slice(&self.transmit.encode());
        buf
    }
}

fn check(buf: &[u8], size: usize, expected: PayloadType) -> Result<(), RtpDecodeError> {
    if buf.len() < size {
        return Err(RtpDecodeError::BufferTooSmall {
            needed: size,
            have: buf.len(),
        });
    }
    match PayloadType::from_byte(buf[1]) {
        Some(pt) if pt == expected => Ok(()),
        Some(pt) => Err(RtpDecodeError::UnexpectedPayloadType(pt)),
        None => Err(RtpDecodeError::UnknownPayloadType(buf[1] & 0x7F)),
    }
}
