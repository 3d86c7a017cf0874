//! Playback progress handling

/// Rate of the RTP timestamps in progress updates
const PROGRESS_CLOCK_RATE: u64 = 44_100;

/// Playback progress update, as RTP timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackProgress {
    /// Timestamp of the start of the track
    pub start: u32,
    /// Timestamp being played
    pub current: u32,
    /// Timestamp of the end of the track, 0 when unknown
    pub end: u32,
}

impl PlaybackProgress {
    /// Elapsed time in ms, never negative
    #[must_use]
    pub fn elapsed_ms(&self) -> u32 {
        span_ms(self.start, self.current)
    }

    /// Track length in ms, 0 when unknown
    #[must_use]
    pub fn duration_ms(&self) -> u32 {
        if self.end == 0 {
            return 0;
        }
        span_ms(self.start, self.end)
    }
}

/// Milliseconds from `from` to `to`, with wraparound; 0 when `to` is behind
fn span_ms(from: u32, to: u32) -> u32 {
    let frames = to.wrapping_sub(from) as i32;
    if frames <= 0 {
        return 0;
    }
    let ms = u64::from(frames.unsigned_abs()) * 1000 / PROGRESS_CLOCK_RATE;
    u32::try_from(ms).unwrap_or(u32::MAX)
}

/// Parse progress from a `text/parameters` body
///
/// Format: "progress: start/current/end\r\n"
#[must_use]
pub fn parse_progress(body: &str) -> Option<PlaybackProgress> {
    for line in body.lines() {
        let Some(value) = line.trim().strip_prefix("progress:") else {
            continue;
        };

        let mut parts = value.trim().split('/').map(|p| p.trim().parse::<u32>());
        let start = parts.next()?.ok()?;
        let current = parts.next()?.ok()?;
        let end = match parts.next() {
            Some(end) => end.ok()?,
            None => 0,
        };
        return Some(PlaybackProgress {
            start,
            current,
            end,
        });
    }

    None
}
