//! SDP (Session Description Protocol) for RAOP
//!
//! The ANNOUNCE body is an SDP document. The receiver only needs the audio
//! media section: its `rtpmap`, its `fmtp`, and the two encryption
//! attributes `rsaaeskey` / `aesiv`.

mod parser;
pub mod raop;

#[cfg(test)]
mod tests;

pub use parser::{SdpParseError, SdpParser};
pub use raop::{AlacParameters, AudioCodec};

use std::collections::HashMap;

/// SDP session description
#[derive(Debug, Clone, Default)]
pub struct SessionDescription {
    /// Protocol version (v=)
    pub version: u8,
    /// Session name (s=)
    pub session_name: String,
    /// Media descriptions (m=)
    pub media: Vec<MediaDescription>,
    /// Session-level attributes (a=), names lowercased
    pub attributes: HashMap<String, Option<String>>,
}

/// SDP media description (m=)
#[derive(Debug, Clone)]
pub struct MediaDescription {
    /// Media type (audio, video, etc.)
    pub media_type: String,
    /// Port number
    pub port: u16,
    /// Protocol (RTP/AVP, etc.)
    pub protocol: String,
    /// Format list (payload types)
    pub formats: Vec<String>,
    /// Media-level attributes, names lowercased
    pub attributes: HashMap<String, Option<String>>,
}

impl SessionDescription {
    /// Get a session-level attribute
    #[must_use]
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(&name.to_ascii_lowercase())?.as_deref()
    }

    /// Get the audio media description
    #[must_use]
    pub fn audio_media(&self) -> Option<&MediaDescription> {
        self.media.iter().find(|m| m.media_type == "audio")
    }

    /// Attribute from the audio section, falling back to the session level
    fn audio_attribute(&self, name: &str) -> Option<&str> {
        self.audio_media()
            .and_then(|m| m.attributes.get(name)?.as_deref())
            .or_else(|| self.get_attribute(name))
    }

    /// Get the rsaaeskey attribute (RSA-wrapped AES key, base64)
    #[must_use]
    pub fn rsaaeskey(&self) -> Option<&str> {
        self.audio_attribute("rsaaeskey")
    }

    /// Get the aesiv attribute (AES initialization vector, base64)
    #[must_use]
    pub fn aesiv(&self) -> Option<&str> {
        self.audio_attribute("aesiv")
    }

    /// Get the fmtp attribute (format parameters)
    #[must_use]
    pub fn fmtp(&self) -> Option<&str> {
        self.audio_attribute("fmtp")
    }

    /// Get the rtpmap attribute
    #[must_use]
    pub fn rtpmap(&self) -> Option<&str> {
        self.audio_attribute("rtpmap")
    }
}
