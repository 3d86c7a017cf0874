//! Sink adapter between the receiver and a local audio output
//!
//! [`RaopSink`] implements [`RaopCallbacks`]: PCM goes into the shared
//! [`OutputBuffer`], transport events drive the output state, timing
//! events run the [`DriftCorrector`] and display events are re-published
//! on a broadcast channel.

mod output;
mod sync;


pub use output::{Output, OutputBuffer, OutputState, OutputStatus, RingBuffer, UNITY_GAIN};
pub use sync::{Correction, DriftCorrector, SYNC_WIN_CHECK, SYNC_WIN_FAST, SYNC_WIN_SLOW};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;

use crate::clock::now_ms;
use crate::receiver::{RaopCallbacks, RaopEvent};

/// Default output buffer: two seconds of 44.1kHz stereo
pub const DEFAULT_OUTPUT_BYTES: usize = 2 * 44_100 * 4;

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// RAOP source attached to an [`OutputBuffer`]
pub struct RaopSink {
    id: u64,
    output: OutputBuffer,
    corrector: Mutex<DriftCorrector>,
    events: broadcast::Sender<RaopEvent>,
}

impl RaopSink {
    /// Sink writing into `output` for a stream at `sample_rate`
    #[must_use]
    pub fn new(output: OutputBuffer, sample_rate: u32) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            id: NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed),
            output,
            corrector: Mutex::new(DriftCorrector::new(sample_rate)),
            events,
        }
    }

    /// Shared output handle, for the renderer
    #[must_use]
    pub fn output(&self) -> &OutputBuffer {
        &self.output
    }

    /// Receive metadata, artwork, progress, volume and transport events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RaopEvent> {
        self.events.subscribe()
    }

    /// Enable or disable drift correction
    pub fn set_sync_enabled(&self, enabled: bool) {
        self.corrector().set_enabled(enabled);
    }

    fn corrector(&self) -> std::sync::MutexGuard<'_, DriftCorrector> {
        self.corrector.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: RaopEvent) {
        let _ = self.events.send(event);
    }
}

impl RaopCallbacks for RaopSink {
    fn command(&self, event: RaopEvent) -> bool {
        match &event {
            RaopEvent::Setup => {
                let mut output = self.output.lock();
                let status = &mut output.status;
                if status.owner.is_some_and(|owner| owner != self.id) && status.state.is_active() {
                    tracing::warn!(owner = ?status.owner, "output busy with another source");
                    return false;
                }
                status.owner = Some(self.id);
                status.state = OutputState::Stopped;
                status.frames_played = 0;
            }
            RaopEvent::Stream => {
                self.corrector().reset();
                tracing::info!("stream started");
            }
            RaopEvent::Play { start_at } => {
                let mut output = self.output.lock();
                if output.status.state != OutputState::Running {
                    output.status.state = OutputState::StartAt(*start_at);
                }
                tracing::info!(start_at, "play requested");
            }
            RaopEvent::Flush => {
                self.output.lock().flush(now_ms());
                tracing::info!("output flushed");
            }
            RaopEvent::Stop => {
                let mut output = self.output.lock();
                if output.status.owner == Some(self.id) {
                    output.status.owner = None;
                }
                output.flush(now_ms());
                tracing::info!("output released");
            }
            RaopEvent::Volume(volume) => {
                let v = f64::from(volume.clamp(0.0, 1.0));
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let gain = (65536.0 * v * v * v) as u32;
                self.output.lock().status.gain = gain;
                tracing::debug!(volume, gain, "volume changed");
            }
            RaopEvent::Timing => {
                let mut corrector = self.corrector();
                let mut output = self.output.lock();
                corrector.on_timing(&mut output, now_ms());
                return true;
            }
            RaopEvent::Metadata { .. }
            | RaopEvent::Artwork(_)
            | RaopEvent::Progress { .. }
            | RaopEvent::Pause => {}
        }

        self.publish(event);
        true
    }

    fn data(&self, pcm: &[u8], playtime: u32) {
        let mut output = self.output.lock();
        output.status.last_playtime = playtime;
        output.status.last_len = pcm.len();

        let written = output.ring.write(pcm);
        if written < pcm.len() {
            tracing::warn!(
                dropped = pcm.len() - written,
                playtime,
                "output buffer full, dropping audio"
            );
        }
    }
}
