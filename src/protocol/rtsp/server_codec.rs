//! Server-side RTSP codec for parsing requests and generating responses

use std::str;

use bytes::{Buf, BytesMut};

use super::headers::{names, raop};
use super::{Headers, Method, RtspRequest, RtspResponse, StatusCode};

/// Errors during RTSP parsing
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid request line: {0}")]
    InvalidRequestLine(String),

    /// The method token is not an RTSP method this receiver knows.
    /// The `CSeq` is kept so the rejection can still be matched by the sender.
    #[error("Invalid method: {method}")]
    InvalidMethod { method: String, cseq: Option<u32> },

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid Content-Length: {0}")]
    InvalidContentLength(String),

    #[error("Body too large: {size} > {max}")]
    BodyTooLarge { size: usize, max: usize },

    #[error("Invalid UTF-8 in headers")]
    InvalidUtf8,
}

impl ParseError {
    /// `CSeq` recovered from the rejected request, when there was one
    #[must_use]
    pub fn cseq(&self) -> Option<u32> {
        match self {
            ParseError::InvalidMethod { cseq, .. } => *cseq,
            _ => None,
        }
    }
}

/// Largest body accepted; artwork is the biggest thing a sender posts
const MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

/// Largest request head accepted before giving up on finding its end
const MAX_HEADER_SIZE: usize = 64 * 1024;

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Incremental RTSP request decoder
///
/// Bytes read from the control connection go in through
/// [`feed`](Self::feed); complete requests come out of
/// [`decode`](Self::decode), which leaves partial data buffered for the
/// next read. Pipelined requests are returned one per call.
///
/// ```rust
/// use raop_receiver::protocol::rtsp::RtspServerCodec;
///
/// let mut codec = RtspServerCodec::new();
/// codec.feed(b"OPTIONS * RTSP/1.0\r\nCSeq: 1\r\n\r\n");
///
/// let request = codec.decode().unwrap().unwrap();
/// assert_eq!(request.cseq(), Some(1));
/// ```
#[derive(Debug, Default)]
pub struct RtspServerCodec {
    buffer: BytesMut,
}

impl RtspServerCodec {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Append bytes read from the connection
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Bytes buffered but not yet decoded
    #[must_use]
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Take the next complete request off the buffer
    ///
    /// `Ok(None)` means more bytes are needed.
    ///
    /// # Errors
    /// Returns `ParseError` when the buffered request is malformed. The
    /// connection cannot be resynchronised after that.
    pub fn decode(&mut self) -> Result<Option<RtspRequest>, ParseError> {
        let Some(head_len) = self
            .buffer
            .windows(HEAD_TERMINATOR.len())
            .position(|window| window == HEAD_TERMINATOR)
        else {
            if self.buffer.len() > MAX_HEADER_SIZE {
                return Err(ParseError::InvalidHeader("request head too large".into()));
            }
            return Ok(None);
        };

        let head = str::from_utf8(&self.buffer[..head_len]).map_err(|_| ParseError::InvalidUtf8)?;
        let (method, uri, headers) = parse_head(head)?;

        let body_len = match headers.get(names::CONTENT_LENGTH) {
            None => 0,
            Some(value) => value
                .trim()
                .parse::<usize>()
                .map_err(|_| ParseError::InvalidContentLength(value.to_string()))?,
        };
        if body_len > MAX_BODY_SIZE {
            return Err(ParseError::BodyTooLarge {
                size: body_len,
                max: MAX_BODY_SIZE,
            });
        }

        let body_start = head_len + HEAD_TERMINATOR.len();
        if self.buffer.len() < body_start + body_len {
            return Ok(None);
        }

        self.buffer.advance(body_start);
        let body = self.buffer.split_to(body_len).to_vec();

        Ok(Some(RtspRequest {
            method,
            uri,
            headers,
            body,
        }))
    }
}

/// Split a request head into method, URI and headers
///
/// The method is resolved last so an unknown one still reports its `CSeq`.
fn parse_head(head: &str) -> Result<(Method, String, Headers), ParseError> {
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();

    let mut tokens = request_line.split_whitespace();
    let (Some(method), Some(uri), Some(version)) = (tokens.next(), tokens.next(), tokens.next())
    else {
        return Err(ParseError::InvalidRequestLine(request_line.to_string()));
    };
    if !version.starts_with("RTSP/") {
        return Err(ParseError::InvalidRequestLine(request_line.to_string()));
    }

    let headers = lines
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.split_once(':')
                .map(|(name, value)| (name.trim(), value.trim()))
                .ok_or_else(|| ParseError::InvalidHeader(line.to_string()))
        })
        .collect::<Result<Headers, _>>()?;

    let method = method.parse::<Method>().map_err(|()| ParseError::InvalidMethod {
        method: method.to_string(),
        cseq: headers.cseq(),
    })?;

    Ok((method, uri.to_string(), headers))
}

/// Value of the `Audio-Jack-Status` header on every response
pub const AUDIO_JACK_STATUS: &str = "connected; type=analog";

/// Builder for RTSP responses
///
/// Every response produced here carries `Audio-Jack-Status`; some senders
/// refuse to stream without it.
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Headers,
}

impl ResponseBuilder {
    /// Create a new response builder with the given status
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        let mut headers = Headers::new();
        headers.insert(raop::AUDIO_JACK_STATUS, AUDIO_JACK_STATUS);
        Self { status, headers }
    }

    /// Create an OK (200) response
    #[must_use]
    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// Create the 503 response used for every refusal
    #[must_use]
    pub fn error() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE)
    }

    /// Set the `CSeq` header (required - should match request)
    #[must_use]
    pub fn cseq(mut self, cseq: u32) -> Self {
        self.headers.insert(names::CSEQ, cseq.to_string());
        self
    }

    /// Set the `CSeq` header when the request had one
    #[must_use]
    pub fn maybe_cseq(self, cseq: Option<u32>) -> Self {
        match cseq {
            Some(cseq) => self.cseq(cseq),
            None => self,
        }
    }

    /// Set the Session header
    #[must_use]
    pub fn session(mut self, session_id: &str) -> Self {
        self.headers.insert(names::SESSION, session_id);
        self
    }

    /// Add a custom header
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the Audio-Latency header (used in RECORD response)
    #[must_use]
    pub fn audio_latency(mut self, samples: u32) -> Self {
        self.headers
            .insert(raop::AUDIO_LATENCY, samples.to_string());
        self
    }

    /// Build into an `RtspResponse`; receiver replies carry no body
    #[must_use]
    pub fn build(self) -> RtspResponse {
        RtspResponse {
            version: "RTSP/1.0".to_string(),
            status: self.status,
            reason: status_reason(self.status).to_string(),
            headers: self.headers,
            body: Vec::new(),
        }
    }
}

/// Encode an RTSP response to bytes
#[must_use]
pub fn encode_response(response: &RtspResponse) -> Vec<u8> {
    let mut output = Vec::with_capacity(256 + response.body.len());

    output.extend_from_slice(
        format!(
            "{} {} {}\r\n",
            response.version,
            response.status.as_u16(),
            response.reason
        )
        .as_bytes(),
    );

    for (name, value) in response.headers.iter() {
        output.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }

    output.extend_from_slice(b"\r\n");

    if !response.body.is_empty() {
        output.extend_from_slice(&response.body);
    }

    output
}

/// Reason phrase for a status code
///
/// AirPlay 1 senders match the literal `503 ERROR` line.
fn status_reason(status: StatusCode) -> &'static str {
    match status.as_u16() {
        200 => "OK",
        503 => "ERROR",
        _ => "Unknown",
    }
}
