//! RTP engine: the three UDP channels of a session
//!
//! [`RtpContext`] binds the audio, control and timing sockets on ephemeral
//! ports and runs a single task that feeds every datagram into the shared
//! [`RtpStream`]. Callbacks fire while the stream lock is held, so a FLUSH
//! issued from the RTSP side can never interleave with a delivery.

mod stream;

#[cfg(test)]
mod tests;

pub use stream::{
    BUFFER_FRAMES, MAX_LATENCY_FRAMES, MIN_LATENCY_FRAMES, Outgoing, RtpStream, StreamParams,
};

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::clock::now_ms;
use crate::protocol::crypto::CryptoError;
use crate::protocol::rtp::RtpDecodeError;
use crate::receiver::events::RaopCallbacks;

/// Largest datagram read from any channel
const MAX_PACKET_SIZE: usize = 2048;

/// Floor for the timing request period
const MIN_TIMING_INTERVAL: Duration = Duration::from_millis(100);

/// RTP engine errors
#[derive(Debug, thiserror::Error)]
pub enum RtpError {
    /// Socket failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed packet
    #[error("invalid packet: {0}")]
    Packet(#[from] RtpDecodeError),

    /// Bad session key or IV
    #[error("cipher setup failed: {0}")]
    Crypto(#[from] CryptoError),
}

/// Local ports reported in the SETUP response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpPorts {
    /// Audio data port (`server_port`)
    pub audio: u16,
    /// Control port
    pub control: u16,
    /// Timing port
    pub timing: u16,
}

impl RtpPorts {
    /// All three ports are usable
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.audio != 0 && self.control != 0 && self.timing != 0
    }
}

/// Where to bind and where the sender listens
#[derive(Debug, Clone, Copy)]
pub struct RtpConfig {
    /// Local address for the three sockets
    pub bind_ip: IpAddr,
    /// Sender's control port, for resend requests
    pub sender_control: SocketAddr,
    /// Sender's timing port, for timing requests
    pub sender_timing: SocketAddr,
    /// Period between timing requests
    pub timing_interval: Duration,
}

/// Sockets and receive task of one streaming session
pub struct RtpContext {
    ports: RtpPorts,
    stream: Arc<Mutex<RtpStream>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RtpContext {
    /// Bind the sockets and start receiving
    ///
    /// # Errors
    ///
    /// Returns `RtpError::Io` if a socket cannot be bound.
    pub async fn start(
        config: RtpConfig,
        stream: RtpStream,
        callbacks: Arc<dyn RaopCallbacks>,
    ) -> Result<Self, RtpError> {
        let audio = UdpSocket::bind((config.bind_ip, 0)).await?;
        let control = UdpSocket::bind((config.bind_ip, 0)).await?;
        let timing = UdpSocket::bind((config.bind_ip, 0)).await?;

        let ports = RtpPorts {
            audio: audio.local_addr()?.port(),
            control: control.local_addr()?.port(),
            timing: timing.local_addr()?.port(),
        };
        tracing::info!(
            audio = ports.audio,
            control = ports.control,
            timing = ports.timing,
            sender_control = %config.sender_control,
            sender_timing = %config.sender_timing,
            "RTP sockets bound"
        );

        let stream = Arc::new(Mutex::new(stream));
        let cancel = CancellationToken::new();
        let channels = Channels {
            audio,
            control,
            timing,
            config,
            control_seq: 0,
        };
        let task = tokio::spawn(channels.run(stream.clone(), callbacks, cancel.clone()));

        Ok(Self {
            ports,
            stream,
            cancel,
            task: Some(task),
        })
    }

    /// Bound ports
    #[must_use]
    pub fn ports(&self) -> RtpPorts {
        self.ports
    }

    /// Arm the stream at the RECORD position
    pub fn record(&self, seq: Option<u16>, rtptime: u32) {
        self.lock().record(seq, rtptime);
    }

    /// Flush up to `seq`, running `on_flush` under the stream lock when the
    /// flush takes effect
    pub fn flush_with(&self, seq: u16, rtptime: u32, on_flush: impl FnOnce()) -> bool {
        let mut stream = self.lock();
        let flushed = stream.flush(seq, rtptime);
        if flushed {
            on_flush();
        }
        flushed
    }

    /// Stop the receive task and wait until it has released the sockets
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "RTP task failed");
            }
        }
        tracing::info!(audio = self.ports.audio, "RTP context closed");
    }

    fn lock(&self) -> MutexGuard<'_, RtpStream> {
        self.stream.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for RtpContext {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for RtpContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtpContext")
            .field("ports", &self.ports)
            .finish_non_exhaustive()
    }
}

struct Channels {
    audio: UdpSocket,
    control: UdpSocket,
    timing: UdpSocket,
    config: RtpConfig,
    control_seq: u16,
}

impl Channels {
    async fn run(
        mut self,
        stream: Arc<Mutex<RtpStream>>,
        callbacks: Arc<dyn RaopCallbacks>,
        cancel: CancellationToken,
    ) {
        let mut audio_buf = vec![0u8; MAX_PACKET_SIZE];
        let mut control_buf = vec![0u8; MAX_PACKET_SIZE];
        let mut timing_buf = vec![0u8; MAX_PACKET_SIZE];

        let mut ticker =
            tokio::time::interval(self.config.timing_interval.max(MIN_TIMING_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let out = tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let request = lock(&stream).timing_request(now_ms());
                    vec![request]
                }
                result = self.audio.recv_from(&mut audio_buf) => {
                    let Some(len) = received(result, "audio") else { continue };
                    let result = lock(&stream).on_audio(&audio_buf[..len], now_ms(), &*callbacks);
                    dispatch(result, "audio")
                }
                result = self.control.recv_from(&mut control_buf) => {
                    let Some(len) = received(result, "control") else { continue };
                    let result = lock(&stream).on_control(&control_buf[..len], now_ms(), &*callbacks);
                    dispatch(result, "control")
                }
                result = self.timing.recv_from(&mut timing_buf) => {
                    let Some(len) = received(result, "timing") else { continue };
                    let result = lock(&stream).on_timing(&timing_buf[..len], now_ms(), &*callbacks);
                    dispatch(result, "timing")
                }
            };

            for packet in out {
                self.send(packet).await;
            }
        }

        tracing::debug!("RTP task stopped");
    }

    async fn send(&mut self, packet: Outgoing) {
        let result = match packet {
            Outgoing::Resend(request) => {
                self.control_seq = self.control_seq.wrapping_add(1);
                self.control
                    .send_to(&request.encode(self.control_seq), self.config.sender_control)
                    .await
            }
            Outgoing::Timing(request) => {
                self.timing
                    .send_to(&request.encode(), self.config.sender_timing)
                    .await
            }
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, ?packet, "failed to send to sender");
        }
    }
}

fn lock(stream: &Mutex<RtpStream>) -> MutexGuard<'_, RtpStream> {
    stream.lock().unwrap_or_else(PoisonError::into_inner)
}

fn received(result: std::io::Result<(usize, SocketAddr)>, channel: &str) -> Option<usize> {
    match result {
        Ok((len, _)) => Some(len),
        Err(e) => {
            tracing::warn!(channel, error = %e, "receive failed");
            None
        }
    }
}

fn dispatch(result: Result<Vec<Outgoing>, RtpDecodeError>, channel: &str) -> Vec<Outgoing> {
    result.unwrap_or_else(|e| {
        tracing::debug!(channel, error = %e, "ignoring packet");
        Vec::new()
    })
}
