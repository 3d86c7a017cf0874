//! DAAP/DMAP payloads carried by RAOP `SET_PARAMETER`

mod artwork;
mod dmap;

#[cfg(test)]
mod tests;

pub use artwork::{Artwork, ArtworkFormat};
pub use dmap::{DmapDecodeError, DmapEncoder, DmapParser, DmapTag, DmapValue};
