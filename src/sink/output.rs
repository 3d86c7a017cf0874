//! Output ring buffer shared between the RTP path and the local renderer

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::clock::ms_diff;
use crate::receiver::decoder::BYTES_PER_FRAME;

/// Unity gain in 16.16 fixed point
pub const UNITY_GAIN: u32 = 1 << 16;

/// Byte ring buffer
#[derive(Debug)]
pub struct RingBuffer {
    data: Vec<u8>,
    read_pos: usize,
    len: usize,
}

impl RingBuffer {
    /// Create a new ring buffer with given capacity in bytes
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity],
            read_pos: 0,
            len: 0,
        }
    }

    /// Buffer capacity in bytes
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes waiting to be read
    #[must_use]
    pub fn available(&self) -> usize {
        self.len
    }

    /// Free space in bytes
    #[must_use]
    pub fn free(&self) -> usize {
        self.capacity() - self.len
    }

    /// Check if buffer is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append as much of `input` as fits, returning the bytes written
    pub fn write(&mut self, input: &[u8]) -> usize {
        let to_write = input.len().min(self.free());
        let capacity = self.capacity();
        let write_pos = (self.read_pos + self.len) % capacity.max(1);

        let first = (capacity - write_pos).min(to_write);
        self.data[write_pos..write_pos + first].copy_from_slice(&input[..first]);
        self.data[..to_write - first].copy_from_slice(&input[first..to_write]);

        self.len += to_write;
        to_write
    }

    /// Move up to `output.len()` bytes out, returning the bytes read
    pub fn read(&mut self, output: &mut [u8]) -> usize {
        let to_read = output.len().min(self.len);
        let capacity = self.capacity();

        let first = (capacity - self.read_pos).min(to_read);
        output[..first].copy_from_slice(&self.data[self.read_pos..self.read_pos + first]);
        output[first..to_read].copy_from_slice(&self.data[..to_read - first]);

        self.consume(to_read);
        to_read
    }

    /// Drop up to `bytes` from the read side, returning the bytes dropped
    pub fn skip(&mut self, bytes: usize) -> usize {
        let bytes = bytes.min(self.len);
        self.consume(bytes);
        bytes
    }

    /// Empty the buffer
    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.len = 0;
    }

    fn consume(&mut self, bytes: usize) {
        self.len -= bytes;
        self.read_pos = if self.len == 0 {
            0
        } else {
            (self.read_pos + bytes) % self.capacity()
        };
    }
}

/// Output state as seen by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    /// No source attached
    Off,
    /// Attached, not playing
    Stopped,
    /// Start playing at the given local ms
    StartAt(u32),
    /// Playing from the buffer
    Running,
    /// Inserting `pause_frames` of silence, then running
    PauseFrames,
    /// Dropping `skip_frames` from the buffer, then running
    SkipFrames,
}

impl OutputState {
    /// Whether the renderer is consuming audio
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Off | Self::Stopped)
    }
}

/// Renderer bookkeeping shared with the sink
#[derive(Debug, Clone)]
pub struct OutputStatus {
    /// Current state
    pub state: OutputState,
    /// Source currently attached to the output
    pub owner: Option<u64>,
    /// Frames queued inside the audio device
    pub device_frames: u32,
    /// Frames taken from the buffer but not yet handed to the device
    pub frames_in_process: u32,
    /// Frames played since the output started
    pub frames_played: u64,
    /// `frames_played` as of the last render call
    pub frames_played_dmp: u64,
    /// Local ms of the last render call
    pub updated: u32,
    /// Frames left to skip
    pub skip_frames: u32,
    /// Frames of silence left to insert
    pub pause_frames: u32,
    /// Gain in 16.16 fixed point
    pub gain: u32,
    /// Local ms of the last stop or flush
    pub stop_time: u32,
    /// Playtime of the most recently written block
    pub last_playtime: u32,
    /// Length in bytes of the most recently written block
    pub last_len: usize,
}

impl Default for OutputStatus {
    fn default() -> Self {
        Self {
            state: OutputState::Off,
            owner: None,
            device_frames: 0,
            frames_in_process: 0,
            frames_played: 0,
            frames_played_dmp: 0,
            updated: 0,
            skip_frames: 0,
            pause_frames: 0,
            gain: UNITY_GAIN,
            stop_time: 0,
            last_playtime: 0,
            last_len: 0,
        }
    }
}

/// Ring buffer and status, always locked together
#[derive(Debug)]
pub struct Output {
    /// PCM waiting for the renderer
    pub ring: RingBuffer,
    /// Renderer bookkeeping
    pub status: OutputStatus,
}

impl Output {
    /// Empty the buffer and stop
    pub fn flush(&mut self, now: u32) {
        self.ring.clear();
        self.status.state = OutputState::Stopped;
        self.status.frames_played = 0;
        self.status.skip_frames = 0;
        self.status.pause_frames = 0;
        self.status.stop_time = now;
    }
}

/// Shared handle to the output
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    inner: Arc<Mutex<Output>>,
}

impl OutputBuffer {
    /// Output with a ring buffer of `capacity` bytes
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Output {
                ring: RingBuffer::new(capacity),
                status: OutputStatus::default(),
            })),
        }
    }

    /// Lock buffer and status
    pub fn lock(&self) -> MutexGuard<'_, Output> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fill `out` with the next interleaved 16-bit LE frames at local time `now`
    ///
    /// Applies pending start, skip and pause instructions and the gain.
    /// Returns the number of bytes taken from the buffer; the rest of `out`
    /// is silence.
    pub fn render(&self, out: &mut [u8], now: u32) -> usize {
        let mut guard = self.lock();
        let output = &mut *guard;
        let status = &mut output.status;
        let mut offset = 0;

        if let OutputState::StartAt(start_at) = status.state {
            if ms_diff(now, start_at) >= 0 {
                tracing::debug!(start_at, now, "output starting");
                status.state = OutputState::Running;
            }
        }

        if status.state == OutputState::SkipFrames {
            let skipped = output.ring.skip(status.skip_frames as usize * BYTES_PER_FRAME);
            tracing::debug!(frames = skipped / BYTES_PER_FRAME, "skipped frames");
            status.skip_frames = 0;
            status.state = OutputState::Running;
        }

        if status.state == OutputState::PauseFrames {
            let frames = (out.len() / BYTES_PER_FRAME).min(status.pause_frames as usize);
            offset = frames * BYTES_PER_FRAME;
            out[..offset].fill(0);
            status.pause_frames -= u32::try_from(frames).unwrap_or(status.pause_frames);
            if status.pause_frames == 0 {
                status.state = OutputState::Running;
            }
        }

        let mut read = 0;
        if status.state == OutputState::Running {
            let whole = offset + (out.len() - offset) / BYTES_PER_FRAME * BYTES_PER_FRAME;
            read = output.ring.read(&mut out[offset..whole]);
            apply_gain(&mut out[offset..offset + read], status.gain);
            status.frames_played += (read / BYTES_PER_FRAME) as u64;
            status.frames_played_dmp = status.frames_played;
            status.updated = now;
        }
        out[offset + read..].fill(0);

        read
    }
}

fn apply_gain(pcm: &mut [u8], gain: u32) {
    if gain == UNITY_GAIN {
        return;
    }
    for sample in pcm.chunks_exact_mut(2) {
        let value = i64::from(i16::from_le_bytes([sample[0], sample[1]]));
        let scaled = (value * i64::from(gain)) >> 16;
        #[allow(clippy::cast_possible_truncation)]
        let scaled = scaled.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16;
        sample.copy_from_slice(&scaled.to_le_bytes());
    }
}
