/// Header names used by the receiver
pub mod names {
    pub const CSEQ: &str = "CSeq";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const CONTENT_LENGTH: &str = "Content-Length";
    pub const SESSION: &str = "Session";
    pub const TRANSPORT: &str = "Transport";
    pub const PUBLIC: &str = "Public";
    pub const RTP_INFO: &str = "RTP-Info";
}

/// Headers only AirPlay 1 peers send or expect
pub mod raop {
    /// Base64 nonce the sender wants signed
    pub const APPLE_CHALLENGE: &str = "Apple-Challenge";
    /// Signed nonce
    pub const APPLE_RESPONSE: &str = "Apple-Response";
    /// Output latency in frames, on RECORD replies
    pub const AUDIO_LATENCY: &str = "Audio-Latency";
    pub const AUDIO_JACK_STATUS: &str = "Audio-Jack-Status";
    /// Identifier the sender's remote control service is advertised under
    pub const DACP_ID: &str = "DACP-ID";
    /// Token remote control requests must carry
    pub const ACTIVE_REMOTE: &str = "Active-Remote";
}

/// RTSP header block
///
/// Names compare case-insensitively. Headers keep the order they were
/// first inserted in, so encoded responses are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty header block
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }

    /// Set a header, replacing the value of an existing one in place
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(index) => self.entries[index] = (name, value),
            None => self.entries.push((name, value)),
        }
    }

    /// Remove a header, returning its value
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.position(name)?;
        Some(self.entries.remove(index).1)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|index| self.entries[index].1.as_str())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn parsed<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        self.get(name)?.trim().parse().ok()
    }

    /// `CSeq`, if present and numeric
    #[must_use]
    pub fn cseq(&self) -> Option<u32> {
        self.parsed(names::CSEQ)
    }

    /// `Content-Length`, if present and numeric
    #[must_use]
    pub fn content_length(&self) -> Option<usize> {
        self.parsed(names::CONTENT_LENGTH)
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.get(names::CONTENT_TYPE)
    }

    /// Headers in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}
