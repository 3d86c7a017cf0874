//! DACP (Digital Audio Control Protocol) remote control
//!
//! The sender announces a `DACP-ID` and an `Active-Remote` token with
//! ANNOUNCE. The receiver looks up the matching `_dacp._tcp` service and
//! drives playback on the sender with plain HTTP requests.

mod client;
mod commands;
mod resolver;

#[cfg(test)]
mod tests;

pub use client::RemoteTarget;
pub use commands::RemoteCommand;
pub use resolver::{DacpResolver, MdnsResolver, matches_dacp_id};

/// DACP service type for mDNS
pub const DACP_SERVICE_TYPE: &str = "_dacp._tcp.local.";

/// Remote control errors
#[derive(Debug, thiserror::Error)]
pub enum DacpError {
    /// Socket failure talking to the remote
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// mDNS daemon failure
    #[error("mDNS error: {0}")]
    Mdns(String),

    /// Remote answered with something that is not an HTTP status line
    #[error("invalid HTTP response")]
    InvalidResponse,

    /// Remote refused the command
    #[error("remote answered HTTP {0}")]
    Rejected(u16),

    /// Remote did not answer in time
    #[error("remote did not answer in time")]
    Timeout,
}
