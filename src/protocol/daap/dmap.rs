//! DMAP (Digital Media Access Protocol) tagged encoding
//!
//! Every item is a 4-byte code, a 4-byte big-endian length and the value.
//! Containers hold further items.

use std::fmt;

/// DMAP content codes this receiver cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmapTag {
    /// Item name (track title)
    ItemName,
    /// Song artist
    SongArtist,
    /// Song album
    SongAlbum,
    /// Song genre
    SongGenre,
    /// Song time (duration in ms)
    SongTime,
    /// Container listing
    Listing,
    /// Listing item
    ListingItem,
    /// Anything else
    Unknown([u8; 4]),
}

impl DmapTag {
    /// 4-character code
    #[must_use]
    pub fn code(&self) -> [u8; 4] {
        match self {
            Self::ItemName => *b"minm",
            Self::SongArtist => *b"asar",
            Self::SongAlbum => *b"asal",
            Self::SongGenre => *b"asgn",
            Self::SongTime => *b"astm",
            Self::Listing => *b"mlcl",
            Self::ListingItem => *b"mlit",
            Self::Unknown(code) => *code,
        }
    }

    /// Tag for a 4-character code
    #[must_use]
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        match &bytes {
            b"minm" => Self::ItemName,
            b"asar" => Self::SongArtist,
            b"asal" => Self::SongAlbum,
            b"asgn" => Self::SongGenre,
            b"astm" => Self::SongTime,
            b"mlcl" => Self::Listing,
            b"mlit" => Self::ListingItem,
            _ => Self::Unknown(bytes),
        }
    }

    /// Containers nest further items
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Listing | Self::ListingItem)
    }
}

impl fmt::Display for DmapTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.code();
        write!(f, "{}", String::from_utf8_lossy(&code))
    }
}

/// Decoded DMAP value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DmapValue {
    /// Text
    String(String),
    /// Integer (1, 2, 4 or 8 bytes on the wire)
    Int(i64),
    /// Nested items
    Container(Vec<(DmapTag, DmapValue)>),
    /// Anything not recognised as text
    Raw(Vec<u8>),
}

impl DmapValue {
    /// Depth-first search for the first string stored under `tag`
    #[must_use]
    pub fn find_string(&self, tag: DmapTag) -> Option<&str> {
        let Self::Container(items) = self else {
            return None;
        };
        items.iter().find_map(|(t, v)| match v {
            Self::String(s) if *t == tag => Some(s.as_str()),
            Self::Container(_) => v.find_string(tag),
            _ => None,
        })
    }

    /// Depth-first search for the first integer stored under `tag`
    #[must_use]
    pub fn find_int(&self, tag: DmapTag) -> Option<i64> {
        let Self::Container(items) = self else {
            return None;
        };
        items.iter().find_map(|(t, v)| match v {
            Self::Int(n) if *t == tag => Some(*n),
            Self::Container(_) => v.find_int(tag),
            _ => None,
        })
    }
}

/// DMAP encoder, the sender side of metadata updates
#[derive(Debug, Default)]
pub struct DmapEncoder {
    buffer: Vec<u8>,
}

impl DmapEncoder {
    /// Create new encoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a tag-value pair
    pub fn encode_tag(&mut self, tag: DmapTag, value: &DmapValue) {
        self.buffer.extend_from_slice(&tag.code());

        match value {
            DmapValue::String(s) => self.put_bytes(s.as_bytes()),
            DmapValue::Raw(data) => self.put_bytes(data),
            DmapValue::Int(n) => {
                if let Ok(v) = i32::try_from(*n) {
                    self.put_bytes(&v.to_be_bytes());
                } else {
                    self.put_bytes(&n.to_be_bytes());
                }
            }
            DmapValue::Container(items) => {
                let mut inner = DmapEncoder::new();
                for (inner_tag, inner_value) in items {
                    inner.encode_tag(*inner_tag, inner_value);
                }
                let inner = inner.finish();
                self.put_bytes(&inner);
            }
        }
    }

    /// Add string tag
    pub fn string(&mut self, tag: DmapTag, value: &str) {
        self.encode_tag(tag, &DmapValue::String(value.to_string()));
    }

    /// Finish encoding and return bytes
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }

    #[allow(clippy::cast_possible_truncation)]
    fn put_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(&(data.len() as u32).to_be_bytes());
        self.buffer.extend_from_slice(data);
    }
}

/// DMAP parser
pub struct DmapParser;

impl DmapParser {
    /// Parse a DMAP body into a top-level container
    ///
    /// # Errors
    ///
    /// Returns `DmapDecodeError` if an item runs past the end of the data.
    pub fn parse(data: &[u8]) -> Result<DmapValue, DmapDecodeError> {
        Ok(DmapValue::Container(Self::parse_container(data)?))
    }

    fn parse_container(mut data: &[u8]) -> Result<Vec<(DmapTag, DmapValue)>, DmapDecodeError> {
        let mut items = Vec::new();

        while !data.is_empty() {
            if data.len() < 8 {
                return Err(DmapDecodeError::UnexpectedEnd);
            }

            let tag = DmapTag::from_bytes([data[0], data[1], data[2], data[3]]);
            let len = u32::from_be_bytes([data[4], data[5], data[6], data[7]]) as usize;
            data = &data[8..];

            if len > data.len() {
                return Err(DmapDecodeError::UnexpectedEnd);
            }
            let (value_bytes, rest) = data.split_at(len);
            data = rest;

            let value = if tag.is_container() {
                DmapValue::Container(Self::parse_container(value_bytes)?)
            } else {
                Self::parse_value(tag, value_bytes)?
            };
            items.push((tag, value));
        }

        Ok(items)
    }

    fn parse_value(tag: DmapTag, bytes: &[u8]) -> Result<DmapValue, DmapDecodeError> {
        if tag == DmapTag::SongTime {
            let n = match *bytes {
                [a] => i64::from(a),
                [a, b] => i64::from(i16::from_be_bytes([a, b])),
                [a, b, c, d] => i64::from(i32::from_be_bytes([a, b, c, d])),
                [a, b, c, d, e, f, g, h] => i64::from_be_bytes([a, b, c, d, e, f, g, h]),
                _ => return Err(DmapDecodeError::InvalidIntSize(bytes.len())),
            };
            return Ok(DmapValue::Int(n));
        }

        match std::str::from_utf8(bytes) {
            Ok(s) if !s.chars().any(char::is_control) => Ok(DmapValue::String(s.to_string())),
            _ => Ok(DmapValue::Raw(bytes.to_vec())),
        }
    }
}

/// DMAP decoding errors
#[derive(Debug, thiserror::Error)]
pub enum DmapDecodeError {
    /// An item header or value runs past the end of its container
    #[error("unexpected end of data")]
    UnexpectedEnd,
    /// Integer field with an unsupported width
    #[error("invalid integer size: {0}")]
    InvalidIntSize(usize),
}
