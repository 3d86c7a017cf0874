//! Events and callbacks connecting the receiver to its audio output

use crate::protocol::daap::Artwork;
use crate::protocol::sdp::AudioCodec;

use super::decoder::{AudioDecoder, PcmDecoder, SilenceDecoder};

/// Session events, each carrying only its own payload
#[derive(Debug, Clone, PartialEq)]
pub enum RaopEvent {
    /// SETUP: the sender wants the output. Refusing answers 503.
    Setup,
    /// RECORD: a stream is about to start
    Stream,
    /// First packet accepted; audio should start at local time `start_at` (ms)
    Play {
        /// Local millisecond clock value of the first frame
        start_at: u32,
    },
    /// Buffered audio was discarded
    Flush,
    /// Track information
    Metadata {
        /// Artist
        artist: Option<String>,
        /// Album
        album: Option<String>,
        /// Title
        title: Option<String>,
    },
    /// Album art
    Artwork(Artwork),
    /// Position in the current track
    Progress {
        /// Elapsed time in ms
        elapsed_ms: u32,
        /// Track length in ms, 0 when unknown
        duration_ms: u32,
    },
    /// PAUSE
    Pause,
    /// Session over; the output is released
    Stop,
    /// Normalized volume in [0, 1]
    Volume(f32),
    /// Clock reference refreshed; drives drift correction
    Timing,
}

/// Collaborator consuming receiver events and PCM
///
/// Called from the RTSP task and the RTP task; implementations must be
/// quick and must not block.
pub trait RaopCallbacks: Send + Sync + 'static {
    /// Handle an event; the return value only matters for `Setup`
    fn command(&self, event: RaopEvent) -> bool;

    /// Decoded 16-bit little-endian stereo PCM due at local time `playtime`
    fn data(&self, pcm: &[u8], playtime: u32);

    /// Decoder for the codec negotiated in ANNOUNCE
    ///
    /// Compressed formats need an external decoder; by default they are
    /// rendered as silence so timing is preserved.
    fn decoder(&self, codec: AudioCodec, frames_per_packet: u32) -> Box<dyn AudioDecoder> {
        match codec {
            AudioCodec::Pcm => Box::new(PcmDecoder),
            other => {
                tracing::warn!(codec = ?other, "no decoder available, rendering silence");
                Box::new(SilenceDecoder::new(frames_per_packet))
            }
        }
    }
}

/// Callbacks built from two closures
pub struct FnCallbacks<C, D> {
    command: C,
    data: D,
}

impl<C, D> FnCallbacks<C, D>
where
    C: Fn(RaopEvent) -> bool + Send + Sync + 'static,
    D: Fn(&[u8], u32) + Send + Sync + 'static,
{
    /// Wrap `command` and `data`
    pub fn new(command: C, data: D) -> Self {
        Self { command, data }
    }
}

impl<C, D> RaopCallbacks for FnCallbacks<C, D>
where
    C: Fn(RaopEvent) -> bool + Send + Sync + 'static,
    D: Fn(&[u8], u32) + Send + Sync + 'static,
{
    fn command(&self, event: RaopEvent) -> bool {
        (self.command)(event)
    }

    fn data(&self, pcm: &[u8], playtime: u32) {
        (self.data)(pcm, playtime);
    }
}
