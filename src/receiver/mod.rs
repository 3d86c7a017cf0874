//! RAOP receiver
//!
//! This module contains the server-side logic for accepting AirPlay 1
//! sessions: the RTSP handlers, the session state machine, the RTP engine
//! and the remote control lookup.

pub mod active_remote;
pub mod announce_handler;
pub mod config;
pub mod decoder;
pub mod events;
pub mod metadata_handler;
pub mod progress_handler;
pub mod rtp;
pub mod rtsp_handler;
pub mod server;
pub mod session;
pub mod set_parameter_handler;
pub mod volume_handler;

#[cfg(test)]
mod tests;

pub use config::{ConfigError, MAX_LATENCY_FRAMES, ReceiverConfig};
pub use decoder::{AudioDecoder, PcmDecoder, SilenceDecoder};
pub use events::{FnCallbacks, RaopCallbacks, RaopEvent};
pub use server::RaopReceiver;
pub use session::{Session, SessionError, SessionState};
