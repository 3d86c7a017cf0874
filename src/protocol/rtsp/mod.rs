//! Sans-IO RTSP protocol implementation for the RAOP control channel

pub mod headers;
pub mod request;
pub mod response;
pub mod server_codec;
pub mod transport;

#[cfg(test)]
mod tests;

pub use headers::Headers;
pub use request::RtspRequest;
pub use response::{RtspResponse, StatusCode};
pub use server_codec::{ParseError, ResponseBuilder, RtspServerCodec, encode_response};
pub use transport::{TransportHeader, TransportParseError};

/// RTSP methods an AirPlay 1 sender may issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Capability negotiation
    Options,
    /// Stream description (SDP) with the wrapped session key
    Announce,
    /// Transport negotiation
    Setup,
    /// Start streaming
    Record,
    /// Play (AirPlay video, not served)
    Play,
    /// Pause
    Pause,
    /// Flush buffered audio
    Flush,
    /// End of session
    Teardown,
    /// Volume, progress, metadata and artwork
    SetParameter,
    /// Keep-alive
    GetParameter,
    /// POST (AirPlay 2 pairing, not served)
    Post,
}

impl Method {
    /// Convert to RTSP method string
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Options => "OPTIONS",
            Method::Announce => "ANNOUNCE",
            Method::Setup => "SETUP",
            Method::Record => "RECORD",
            Method::Play => "PLAY",
            Method::Pause => "PAUSE",
            Method::Flush => "FLUSH",
            Method::Teardown => "TEARDOWN",
            Method::SetParameter => "SET_PARAMETER",
            Method::GetParameter => "GET_PARAMETER",
            Method::Post => "POST",
        }
    }
}

impl std::str::FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPTIONS" => Ok(Method::Options),
            "ANNOUNCE" => Ok(Method::Announce),
            "SETUP" => Ok(Method::Setup),
            "RECORD" => Ok(Method::Record),
            "PLAY" => Ok(Method::Play),
            "PAUSE" => Ok(Method::Pause),
            "FLUSH" => Ok(Method::Flush),
            "TEARDOWN" => Ok(Method::Teardown),
            "SET_PARAMETER" => Ok(Method::SetParameter),
            "GET_PARAMETER" => Ok(Method::GetParameter),
            "POST" => Ok(Method::Post),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
