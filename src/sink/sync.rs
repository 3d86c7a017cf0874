//! Drift correction between the sender's timeline and the local output
//!
//! On every timing refresh the corrector estimates when the most recently
//! written block will actually reach the speaker and compares that with
//! the playtime the sender asked for. Errors are averaged over a sliding
//! window that starts tiny, so a fresh stream converges fast, and grows
//! once the error is small, so steady-state jitter is ignored.

use std::collections::VecDeque;

use crate::clock::ms_diff;
use crate::receiver::decoder::BYTES_PER_FRAME;

use super::output::{Output, OutputState};

/// Window used right after the first sample
pub const SYNC_WIN_FAST: usize = 2;
/// Steady-state window
pub const SYNC_WIN_SLOW: usize = 32;
/// Samples needed before a gross error is corrected in a partial window
pub const SYNC_WIN_CHECK: usize = 8;

const SMALL_ERROR_MS: i64 = 10;
const GROSS_ERROR_MS: i64 = 100;

/// Instruction for the output clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    /// Output is late: drop this many frames
    Skip(u32),
    /// Output is early: insert this many frames of silence
    Pause(u32),
}

/// Sliding-window drift corrector
#[derive(Debug)]
pub struct DriftCorrector {
    enabled: bool,
    sample_rate: u32,
    window: usize,
    errors: VecDeque<i64>,
    sum: i64,
    count: usize,
}

impl DriftCorrector {
    /// Corrector for a stream at `sample_rate`; 0 falls back to 44.1kHz
    #[must_use]
    pub fn new(sample_rate: u32) -> Self {
        Self {
            enabled: true,
            sample_rate: if sample_rate == 0 { 44_100 } else { sample_rate },
            window: 1,
            errors: VecDeque::with_capacity(SYNC_WIN_SLOW),
            sum: 0,
            count: 0,
        }
    }

    /// Turn correction on or off
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Current window size
    #[must_use]
    pub fn window(&self) -> usize {
        self.window
    }

    /// Back to fast convergence for a new stream
    pub fn reset(&mut self) {
        self.window = 1;
        self.clear();
    }

    /// Measure the error on `output` at local time `now` and apply any
    /// resulting correction to its status
    ///
    /// Does nothing unless the output is running and has played at least
    /// one device buffer.
    #[allow(clippy::cast_possible_wrap)]
    pub fn on_timing(&mut self, output: &mut Output, now: u32) -> Option<Correction> {
        let status = &output.status;
        if !self.enabled
            || status.state != OutputState::Running
            || status.frames_played_dmp < u64::from(status.device_frames)
        {
            return None;
        }

        let level = output.ring.available();
        let queued_frames = (level as i64 - status.last_len as i64) / BYTES_PER_FRAME as i64
            + i64::from(status.device_frames)
            + i64::from(status.frames_in_process);
        let local_ms = queued_frames * 1000 / i64::from(self.sample_rate)
            - i64::from(ms_diff(now, status.updated));

        // an empty buffer means a network stall, not drift
        let error = if level > 0 {
            i64::from(ms_diff(status.last_playtime, now)) - local_ms
        } else {
            0
        };
        if level == 0 {
            tracing::info!(now, "output buffer empty during timing check");
        }

        let correction = self.push_error(error);
        match correction {
            Some(Correction::Skip(frames)) => {
                output.status.skip_frames = frames;
                output.status.state = OutputState::SkipFrames;
            }
            Some(Correction::Pause(frames)) => {
                output.status.pause_frames = frames;
                output.status.state = OutputState::PauseFrames;
            }
            None => {}
        }
        correction
    }

    /// Add one error sample (ms, positive when the output is early)
    #[allow(clippy::cast_possible_wrap)]
    pub fn push_error(&mut self, error: i64) -> Option<Correction> {
        self.errors.push_back(error);
        self.sum += error;
        while self.errors.len() > self.window {
            if let Some(evicted) = self.errors.pop_front() {
                self.sum -= evicted;
            }
        }
        self.count += 1;

        let avg = self.sum / self.errors.len() as i64;
        let fire = (self.count >= self.window && avg.abs() > SMALL_ERROR_MS)
            || (self.count >= SYNC_WIN_CHECK && avg.abs() > GROSS_ERROR_MS);

        let correction = fire.then(|| {
            let frames = u32::try_from(avg.abs() * i64::from(self.sample_rate) / 1000)
                .unwrap_or(u32::MAX);
            if avg < 0 {
                Correction::Skip(frames)
            } else {
                Correction::Pause(frames)
            }
        });
        if let Some(c) = correction {
            tracing::info!(avg_ms = avg, samples = self.count, correction = ?c, "drift correction");
            self.clear();
        }

        if self.window == 1 {
            self.window = SYNC_WIN_FAST;
            tracing::info!("switching to fast sync window");
        } else if self.window == SYNC_WIN_FAST
            && self.count >= SYNC_WIN_FAST
            && avg.abs() < SMALL_ERROR_MS
        {
            self.window = SYNC_WIN_SLOW;
            tracing::info!("switching to slow sync window");
        }

        correction
    }

    fn clear(&mut self) {
        self.errors.clear();
        self.sum = 0;
        self.count = 0;
    }
}
