use std::collections::HashMap;

use thiserror::Error;

use super::{MediaDescription, SessionDescription};

#[derive(Debug, Error)]
pub enum SdpParseError {
    #[error("invalid version line")]
    InvalidVersion,
    #[error("invalid media line: {0}")]
    InvalidMedia(String),
    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),
}

/// One `x=value` line of interest
enum Line<'a> {
    Version(&'a str),
    SessionName(&'a str),
    Media(&'a str),
    Attribute(String, Option<String>),
    Other,
}

impl<'a> Line<'a> {
    fn classify(line: &'a str) -> Option<Self> {
        let (kind, value) = line.trim().split_once('=')?;
        Some(match kind {
            "v" => Line::Version(value),
            "s" => Line::SessionName(value),
            "m" => Line::Media(value),
            "a" => {
                let (name, value) = match value.split_once(':') {
                    Some((name, value)) => (name, Some(value.trim().to_string())),
                    None => (value, None),
                };
                Line::Attribute(name.trim().to_ascii_lowercase(), value)
            }
            _ => Line::Other,
        })
    }
}

/// SDP parser
pub struct SdpParser;

impl SdpParser {
    /// Parse an SDP document
    ///
    /// Lines that are not `x=value` are skipped. Attribute names are stored
    /// lowercased so lookups ignore case. Attributes before the first `m=`
    /// line belong to the session, later ones to the latest media section.
    ///
    /// # Errors
    ///
    /// Returns `SdpParseError` if the version or a media line is malformed.
    pub fn parse(input: &str) -> Result<SessionDescription, SdpParseError> {
        let mut sdp = SessionDescription::default();

        for line in input.lines().filter_map(Line::classify) {
            match line {
                Line::Version(value) => {
                    sdp.version = value
                        .trim()
                        .parse()
                        .map_err(|_| SdpParseError::InvalidVersion)?;
                }
                Line::SessionName(value) => sdp.session_name = value.to_string(),
                Line::Media(value) => sdp.media.push(media_section(value)?),
                Line::Attribute(name, value) => {
                    let attributes = match sdp.media.last_mut() {
                        Some(media) => &mut media.attributes,
                        None => &mut sdp.attributes,
                    };
                    attributes.insert(name, value);
                }
                Line::Other => {}
            }
        }

        Ok(sdp)
    }
}

/// `<media> <port> <proto> <fmt> ...`
fn media_section(value: &str) -> Result<MediaDescription, SdpParseError> {
    let mut fields = value.split_whitespace();
    let (Some(media_type), Some(port), Some(protocol)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(SdpParseError::InvalidMedia(value.to_string()));
    };
    let formats: Vec<String> = fields.map(ToString::to_string).collect();
    if formats.is_empty() {
        return Err(SdpParseError::InvalidMedia(value.to_string()));
    }

    Ok(MediaDescription {
        media_type: media_type.to_string(),
        port: port.parse().unwrap_or(0),
        protocol: protocol.to_string(),
        formats,
        attributes: HashMap::new(),
    })
}
