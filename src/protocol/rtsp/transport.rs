//! RTSP Transport header parsing
//!
//! The Transport header in SETUP requests tells the receiver where the
//! sender listens for control and timing traffic.
//! Format: `RTP/AVP/UDP;unicast;interleaved=0-1;mode=record;control_port=6001;timing_port=6002`

/// Parsed Transport header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportHeader {
    /// Protocol specification (e.g. `RTP/AVP/UDP`)
    pub protocol: String,
    /// Mode (usually "record" for RAOP)
    pub mode: Option<String>,
    /// Sender's control port
    pub control_port: Option<u16>,
    /// Sender's timing port
    pub timing_port: Option<u16>,
}

impl TransportHeader {
    /// Parse a Transport header value
    ///
    /// Parameter names are matched case-insensitively; unknown parameters
    /// are ignored.
    ///
    /// # Errors
    /// Returns `TransportParseError` if the header is empty or a port is not
    /// a number.
    pub fn parse(value: &str) -> Result<Self, TransportParseError> {
        let mut parts = value.split(';');

        let protocol = parts
            .next()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or(TransportParseError::MissingProtocol)?
            .to_string();

        let mut transport = TransportHeader {
            protocol,
            mode: None,
            control_port: None,
            timing_port: None,
        };

        for part in parts {
            let Some((name, value)) = part.trim().split_once('=') else {
                continue;
            };
            let value = value.trim();

            if name.eq_ignore_ascii_case("mode") {
                transport.mode = Some(value.to_string());
            } else if name.eq_ignore_ascii_case("control_port") {
                transport.control_port = Some(Self::parse_port(value)?);
            } else if name.eq_ignore_ascii_case("timing_port") {
                transport.timing_port = Some(Self::parse_port(value)?);
            }
        }

        Ok(transport)
    }

    fn parse_port(value: &str) -> Result<u16, TransportParseError> {
        value
            .parse()
            .map_err(|_| TransportParseError::InvalidPort(value.to_string()))
    }

    /// Both sender ports, if present and non-zero
    #[must_use]
    pub fn sender_ports(&self) -> Option<(u16, u16)> {
        match (self.control_port, self.timing_port) {
            (Some(control), Some(timing)) if control != 0 && timing != 0 => {
                Some((control, timing))
            }
            _ => None,
        }
    }

    /// Generate the Transport header for the SETUP response
    #[must_use]
    pub fn to_response_header(control_port: u16, timing_port: u16, server_port: u16) -> String {
        format!(
            "RTP/AVP/UDP;unicast;mode=record;control_port={control_port};timing_port={timing_port};server_port={server_port}"
        )
    }
}

/// Transport header parse errors
#[derive(Debug, thiserror::Error)]
pub enum TransportParseError {
    #[error("Missing protocol specification")]
    MissingProtocol,

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}
