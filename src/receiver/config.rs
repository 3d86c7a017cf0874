//! Receiver configuration

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Highest latency a sender may request, in frames (2s at 44.1kHz)
pub const MAX_LATENCY_FRAMES: u32 = 88_200;

/// Receiver configuration
///
/// Every field has a default, so a JSON file only needs the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Friendly name shown to senders
    pub name: String,

    /// Address the RTSP listener and RTP sockets bind to
    pub bind_address: IpAddr,

    /// RTSP listen port (0 = auto-assign)
    pub port: u16,

    /// MAC address override; derived from the host when unset
    pub mac: Option<[u8; 6]>,

    /// Output latency in frames reported as `Audio-Latency`, 0 = unset
    pub latency: u32,

    /// Register the `_raop._tcp` service
    pub advertise: bool,

    /// Look up the sender's remote control service
    pub remote_discovery: bool,

    /// Timeout of one remote lookup round
    pub remote_query_timeout_ms: u64,

    /// Period between timing requests
    pub timing_interval_ms: u64,

    /// Stream sample rate
    pub sample_rate: u32,

    /// Frames per RTP packet
    pub frames_per_packet: u32,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            name: "RAOP Receiver".to_string(),
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 5000,
            mac: None,
            latency: 0,
            advertise: true,
            remote_discovery: true,
            remote_query_timeout_ms: 3000,
            timing_interval_ms: 3000,
            sample_rate: 44_100,
            frames_per_packet: 352,
        }
    }
}

impl ReceiverConfig {
    /// Create with custom name
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse and validate a JSON document
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Json` for malformed documents and
    /// `ConfigError::Invalid` for values the receiver cannot stream with.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check the values the stream timing divides by
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid {
                field: "sample_rate",
                reason: "must be non-zero",
            });
        }
        if self.frames_per_packet == 0 {
            return Err(ConfigError::Invalid {
                field: "frames_per_packet",
                reason: "must be non-zero",
            });
        }
        Ok(())
    }

    /// Set port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set bind address
    #[must_use]
    pub fn with_bind_address(mut self, address: IpAddr) -> Self {
        self.bind_address = address;
        self
    }

    /// Set MAC address
    #[must_use]
    pub fn with_mac(mut self, mac: [u8; 6]) -> Self {
        self.mac = Some(mac);
        self
    }

    /// Set latency in frames
    #[must_use]
    pub fn with_latency(mut self, frames: u32) -> Self {
        self.latency = frames;
        self
    }

    /// Enable or disable service advertisement
    #[must_use]
    pub fn with_advertise(mut self, advertise: bool) -> Self {
        self.advertise = advertise;
        self
    }

    /// Enable or disable remote control discovery
    #[must_use]
    pub fn with_remote_discovery(mut self, enabled: bool) -> Self {
        self.remote_discovery = enabled;
        self
    }

    /// Set timing request period
    #[must_use]
    pub fn with_timing_interval_ms(mut self, ms: u64) -> Self {
        self.timing_interval_ms = ms;
        self
    }

    /// Latency actually used, never above [`MAX_LATENCY_FRAMES`]
    #[must_use]
    pub fn effective_latency(&self) -> u32 {
        self.latency.min(MAX_LATENCY_FRAMES)
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    /// File is not valid configuration JSON
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
    /// A value is out of range
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Field name as written in the JSON document
        field: &'static str,
        /// What is wrong with it
        reason: &'static str,
    },
}
