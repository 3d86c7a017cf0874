use super::{Headers, Method, headers::names};

/// An RTSP request message
#[derive(Debug, Clone)]
pub struct RtspRequest {
    /// RTSP method
    pub method: Method,
    /// Request URI (e.g., "rtsp://192.168.1.10/1234567")
    pub uri: String,
    /// Request headers
    pub headers: Headers,
    /// Request body (may be empty)
    pub body: Vec<u8>,
}

impl RtspRequest {
    /// Create a new request
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// `CSeq` of the request, if present and numeric
    #[must_use]
    pub fn cseq(&self) -> Option<u32> {
        self.headers.cseq()
    }

    /// Body as text, lossily decoded
    #[must_use]
    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Sequence number and RTP timestamp from the `RTP-Info` header
    ///
    /// Missing fields read as zero, the same way senders that omit them
    /// expect to be treated.
    #[must_use]
    pub fn rtp_info(&self) -> (u16, u32) {
        let Some(info) = self.headers.get(names::RTP_INFO) else {
            return (0, 0);
        };

        let mut seq = 0u16;
        let mut rtptime = 0u32;
        for part in info.split(';') {
            let part = part.trim();
            if let Some(value) = part.strip_prefix("seq=") {
                seq = value.trim().parse().unwrap_or(0);
            } else if let Some(value) = part.strip_prefix("rtptime=") {
                rtptime = value.trim().parse().unwrap_or(0);
            }
        }
        (seq, rtptime)
    }

    /// Encode request to bytes
    ///
    /// Returns the complete RTSP request ready for transmission
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut output = Vec::with_capacity(256 + self.body.len());

        output.extend_from_slice(self.method.as_str().as_bytes());
        output.push(b' ');
        output.extend_from_slice(self.uri.as_bytes());
        output.extend_from_slice(b" RTSP/1.0\r\n");

        for (name, value) in self.headers.iter() {
            if name.eq_ignore_ascii_case(names::CONTENT_LENGTH) {
                continue;
            }
            output.extend_from_slice(name.as_bytes());
            output.extend_from_slice(b": ");
            output.extend_from_slice(value.as_bytes());
            output.extend_from_slice(b"\r\n");
        }

        if !self.body.is_empty() {
            let len_header = format!("{}: {}\r\n", names::CONTENT_LENGTH, self.body.len());
            output.extend_from_slice(len_header.as_bytes());
        }

        output.extend_from_slice(b"\r\n");
        output.extend_from_slice(&self.body);

        output
    }
}
