//! Track metadata handling
//!
//! Parses DMAP (Digital Media Access Protocol) encoded metadata
//! from `SET_PARAMETER` requests.

use crate::protocol::daap::{DmapDecodeError, DmapParser, DmapTag};

/// Track metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackMetadata {
    /// Track title
    pub title: Option<String>,
    /// Artist name
    pub artist: Option<String>,
    /// Album name
    pub album: Option<String>,
}

impl TrackMetadata {
    /// Nothing the display could show
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.artist.is_none() && self.album.is_none()
    }
}

/// Parse DMAP metadata from binary data
///
/// Items may sit at the top level or inside `mlit` listing items.
///
/// # Errors
///
/// Returns `DmapDecodeError` if the DMAP structure is truncated or holds an
/// integer of unsupported width.
pub fn parse_dmap_metadata(data: &[u8]) -> Result<TrackMetadata, DmapDecodeError> {
    let root = DmapParser::parse(data)?;
    let text = |tag| root.find_string(tag).map(str::to_string);

    Ok(TrackMetadata {
        title: text(DmapTag::ItemName),
        artist: text(DmapTag::SongArtist),
        album: text(DmapTag::SongAlbum),
    })
}
