//! `SET_PARAMETER` request routing

use crate::protocol::daap::Artwork;
use crate::protocol::rtsp::RtspRequest;

use super::events::RaopEvent;
use super::metadata_handler::{TrackMetadata, parse_dmap_metadata};
use super::progress_handler::{PlaybackProgress, parse_progress};
use super::volume_handler::{VolumeUpdate, parse_volume_parameter};

/// Result of processing `SET_PARAMETER`
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterUpdate {
    /// Volume update
    Volume(VolumeUpdate),
    /// Playback progress update
    Progress(PlaybackProgress),
    /// Track metadata update
    Metadata(TrackMetadata),
    /// Album artwork update
    Artwork(Artwork),
}

impl ParameterUpdate {
    /// Event handed to the callbacks
    #[must_use]
    pub fn into_event(self) -> RaopEvent {
        match self {
            Self::Volume(update) => RaopEvent::Volume(update.volume),
            Self::Progress(progress) => RaopEvent::Progress {
                elapsed_ms: progress.elapsed_ms(),
                duration_ms: progress.duration_ms(),
            },
            Self::Metadata(metadata) => RaopEvent::Metadata {
                artist: metadata.artist,
                album: metadata.album,
                title: metadata.title,
            },
            Self::Artwork(artwork) => RaopEvent::Artwork(artwork),
        }
    }
}

/// Process `SET_PARAMETER` request
///
/// Text bodies are checked for `volume` first, then `progress`; binary
/// bodies are routed by `Content-Type`. Anything else yields `None` and is
/// simply acknowledged.
#[must_use]
pub fn process_set_parameter(request: &RtspRequest) -> Option<ParameterUpdate> {
    if request.body.is_empty() {
        return None;
    }
    let content_type = request.headers.content_type().unwrap_or("").trim();

    if content_type.eq_ignore_ascii_case("application/x-dmap-tagged") {
        return match parse_dmap_metadata(&request.body) {
            Ok(metadata) => {
                tracing::info!(
                    artist = ?metadata.artist,
                    album = ?metadata.album,
                    title = ?metadata.title,
                    "received metadata"
                );
                Some(ParameterUpdate::Metadata(metadata))
            }
            Err(e) => {
                tracing::warn!(error = %e, "malformed metadata");
                None
            }
        };
    }

    if content_type
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
    {
        tracing::info!(len = request.body.len(), content_type, "received artwork");
        return Some(ParameterUpdate::Artwork(Artwork::new(
            request.body.clone(),
            content_type,
        )));
    }

    let body = request.body_text();
    if let Some(volume) = parse_volume_parameter(&body) {
        tracing::info!(db = volume.db, volume = volume.volume, muted = volume.is_muted(), "volume");
        return Some(ParameterUpdate::Volume(volume));
    }
    if let Some(progress) = parse_progress(&body) {
        tracing::info!(
            elapsed_ms = progress.elapsed_ms(),
            duration_ms = progress.duration_ms(),
            "progress"
        );
        return Some(ParameterUpdate::Progress(progress));
    }

    tracing::info!(content_type, "unhandled SET_PARAMETER");
    None
}
