//! Album artwork pushed by the sender

/// Artwork image format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtworkFormat {
    /// JPEG image
    Jpeg,
    /// PNG image
    Png,
}

impl ArtworkFormat {
    /// MIME type
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    /// Detect format from magic bytes, falling back to the declared
    /// content type
    #[must_use]
    pub fn detect(data: &[u8], content_type: &str) -> Option<Self> {
        match data {
            [0xFF, 0xD8, ..] => Some(Self::Jpeg),
            [0x89, b'P', b'N', b'G', ..] => Some(Self::Png),
            _ if content_type.eq_ignore_ascii_case("image/jpeg") => Some(Self::Jpeg),
            _ if content_type.eq_ignore_ascii_case("image/png") => Some(Self::Png),
            _ => None,
        }
    }
}

/// Album artwork
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artwork {
    /// Image data
    pub data: Vec<u8>,
    /// Image format, when recognised
    pub format: Option<ArtworkFormat>,
}

impl Artwork {
    /// Wrap a `SET_PARAMETER` image body
    #[must_use]
    pub fn new(data: Vec<u8>, content_type: &str) -> Self {
        let format = ArtworkFormat::detect(&data, content_type);
        Self { data, format }
    }

    /// Empty image bodies clear the current artwork
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// PNG dimensions from the IHDR chunk
    #[must_use]
    pub fn png_dimensions(&self) -> Option<(u32, u32)> {
        if self.format != Some(ArtworkFormat::Png) || self.data.len() < 24 {
            return None;
        }
        let d = &self.data;
        let width = u32::from_be_bytes([d[16], d[17], d[18], d[19]]);
        let height = u32::from_be_bytes([d[20], d[21], d[22], d[23]]);
        Some((width, height))
    }
}
