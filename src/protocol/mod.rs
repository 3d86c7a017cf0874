//! RAOP wire protocols

#![allow(missing_docs)]

pub mod crypto;
pub mod daap;
pub mod dacp;
pub mod rtp;
pub mod rtsp;
pub mod sdp;
