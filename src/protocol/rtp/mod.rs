//! RTP packet formats used by RAOP
//!
//! Three UDP channels carry RTP-framed traffic:
//! - audio: sequenced, optionally encrypted audio packets (PT 0x60)
//! - control: sync packets (0x54) from the sender, resend requests (0x55)
//!   from the receiver, retransmitted audio (0x56) back from the sender
//! - timing: NTP-like requests (0x52) from the receiver, replies (0x53)

mod control;
mod packet;
mod timing;

#[cfg(test)]
mod tests;

pub use control::{ResendRequest, SyncPacket, unwrap_retransmit};
pub use packet::{PayloadType, RtpDecodeError, RtpHeader};
pub use timing::{NtpTimestamp, TimingReply, TimingRequest, ms_to_ntp, ntp_to_ms};

/// Highest valid sequence distance considered "ahead" when comparing
/// wrapping 16-bit sequence numbers.
const SEQ_HALF_RANGE: u16 = 0x8000;

/// `true` if `a` comes strictly before `b` in wrapping sequence order
#[must_use]
pub fn seq_before(a: u16, b: u16) -> bool {
    let diff = b.wrapping_sub(a);
    diff != 0 && diff < SEQ_HALF_RANGE
}
