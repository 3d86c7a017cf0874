//! RAOP-specific SDP parsing
//!
//! Extracts audio format parameters from the ANNOUNCE SDP.

use super::{SdpParseError, SessionDescription};

/// Audio codec announced in `rtpmap`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    /// Apple Lossless (`AppleLossless`)
    Alac,
    /// Raw 16-bit PCM (`L16`)
    Pcm,
    /// AAC (`mpeg4-generic`)
    Aac,
}

impl AudioCodec {
    /// Detect the codec from the SDP `rtpmap`
    ///
    /// Defaults to ALAC, which is what iTunes announces without fail.
    #[must_use]
    pub fn from_sdp(sdp: &SessionDescription) -> Self {
        let Some(rtpmap) = sdp.rtpmap() else {
            return AudioCodec::Alac;
        };
        let rtpmap = rtpmap.to_ascii_lowercase();
        if rtpmap.contains("l16") {
            AudioCodec::Pcm
        } else if rtpmap.contains("mpeg4-generic") {
            AudioCodec::Aac
        } else {
            AudioCodec::Alac
        }
    }
}

/// ALAC format parameters from fmtp line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlacParameters {
    /// Frames per packet
    pub frames_per_packet: u32,
    /// Compatible version
    pub compatible_version: u8,
    /// Bits per sample
    pub bit_depth: u8,
    /// Rice history mult
    pub pb: u8,
    /// Rice initial history
    pub mb: u8,
    /// Rice limit
    pub kb: u8,
    /// Number of channels
    pub channels: u8,
    /// Max run
    pub max_run: u16,
    /// Max frame bytes
    pub max_frame_bytes: u32,
    /// Average bit rate
    pub avg_bit_rate: u32,
    /// Sample rate
    pub sample_rate: u32,
}

impl Default for AlacParameters {
    fn default() -> Self {
        Self {
            frames_per_packet: 352,
            compatible_version: 0,
            bit_depth: 16,
            pb: 40,
            mb: 10,
            kb: 14,
            channels: 2,
            max_run: 255,
            max_frame_bytes: 0,
            avg_bit_rate: 0,
            sample_rate: 44_100,
        }
    }
}

impl AlacParameters {
    /// Parse from fmtp attribute value
    /// Format: "96 352 0 16 40 10 14 2 255 0 0 44100"
    ///
    /// # Errors
    /// Returns `SdpParseError` if the fmtp string does not have 11 or 12 fields.
    pub fn parse(fmtp: &str) -> Result<Self, SdpParseError> {
        let parts: Vec<&str> = fmtp.split_whitespace().collect();

        // 12 fields when the payload type leads, 11 without it
        let offset = match parts.len() {
            12 => 1,
            11 => 0,
            n => {
                return Err(SdpParseError::InvalidAttribute(format!(
                    "ALAC fmtp needs 11 or 12 fields, got {n}: {fmtp}"
                )));
            }
        };

        let defaults = Self::default();
        let field = |i: usize| parts.get(offset + i).copied();

        Ok(AlacParameters {
            frames_per_packet: parse_or(field(0), defaults.frames_per_packet),
            compatible_version: parse_or(field(1), defaults.compatible_version),
            bit_depth: parse_or(field(2), defaults.bit_depth),
            pb: parse_or(field(3), defaults.pb),
            mb: parse_or(field(4), defaults.mb),
            kb: parse_or(field(5), defaults.kb),
            channels: parse_or(field(6), defaults.channels),
            max_run: parse_or(field(7), defaults.max_run),
            max_frame_bytes: parse_or(field(8), defaults.max_frame_bytes),
            avg_bit_rate: parse_or(field(9), defaults.avg_bit_rate),
            sample_rate: parse_or(field(10), defaults.sample_rate),
        })
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<&str>, default: T) -> T {
    value.and_then(|s| s.parse().ok()).unwrap_or(default)
}
