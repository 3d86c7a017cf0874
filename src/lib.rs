//! # raop-receiver
//!
//! An AirPlay 1 (RAOP) audio receiver.
//!
//! ## Features
//!
//! - RTSP control channel with the Apple-Challenge handshake
//! - RSA-wrapped AES session keys and encrypted audio
//! - RTP reorder buffer with resend requests and timed delivery
//! - Clock drift correction against a local audio output
//! - `_raop._tcp` advertisement and DACP remote control
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use raop_receiver::sink::{DEFAULT_OUTPUT_BYTES, OutputBuffer, RaopSink};
//! use raop_receiver::{RaopReceiver, ReceiverConfig};
//!
//! # async fn example() -> Result<(), raop_receiver::RaopError> {
//! let output = OutputBuffer::new(DEFAULT_OUTPUT_BYTES);
//! let sink = Arc::new(RaopSink::new(output.clone(), 44_100));
//!
//! let receiver = RaopReceiver::start(ReceiverConfig::with_name("Kitchen"), sink).await?;
//! println!("listening on {}", receiver.local_addr());
//!
//! // ... render `output` on the audio device ...
//!
//! receiver.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Receiver**: [`RaopReceiver`] accepts the control connection and
//!   drives the session
//! - **Sink**: [`sink::RaopSink`] connects the callbacks to an output buffer
//! - **Protocol**: sans-IO codecs for RTSP, SDP, RTP, DMAP and DACP

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod clock;
pub mod discovery;
/// Error types
pub mod error;
pub mod protocol;
pub mod receiver;
pub mod sink;

/// Testing utilities
pub mod testing;

pub use error::RaopError;
pub use receiver::{FnCallbacks, RaopCallbacks, RaopEvent, RaopReceiver, ReceiverConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
