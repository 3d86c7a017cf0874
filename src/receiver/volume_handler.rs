//! Volume handling for the RAOP receiver

use std::str::FromStr;

/// Sender volume that means mute
pub const VOLUME_MUTE_DB: f32 = -144.0;

/// Width of the audible range below 0 dB
const VOLUME_RANGE_DB: f32 = 30.0;

/// Volume update from `SET_PARAMETER`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeUpdate {
    /// Volume as sent, in dB (-30.0 to 0.0, or -144.0)
    pub db: f32,
    /// Normalized volume in [0, 1]
    pub volume: f32,
}

impl VolumeUpdate {
    /// Create from dB value
    #[must_use]
    pub fn from_db(db: f32) -> Self {
        Self {
            db,
            volume: normalize_volume(db),
        }
    }

    /// Muted by the sender
    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.volume <= 0.0
    }
}

/// Map the sender's dB scale onto [0, 1]
///
/// -144 is the mute sentinel; everything else is linear over the last 30 dB.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn normalize_volume(db: f32) -> f32 {
    if db == VOLUME_MUTE_DB {
        return 0.0;
    }
    (1.0 + db / VOLUME_RANGE_DB).clamp(0.0, 1.0)
}

/// Parse volume from a `text/parameters` body
///
/// Format: "volume: -15.000000\r\n"
#[must_use]
pub fn parse_volume_parameter(body: &str) -> Option<VolumeUpdate> {
    body.lines()
        .filter_map(|line| line.trim().strip_prefix("volume:"))
        .find_map(|value| f32::from_str(value.trim()).ok())
        .filter(|db| db.is_finite())
        .map(VolumeUpdate::from_db)
}
