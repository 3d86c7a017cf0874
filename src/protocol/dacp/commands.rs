/// Playback commands a receiver can send to the active remote
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemoteCommand {
    /// Begin rewinding
    Rewind,
    /// Begin fast forward
    FastForward,
    /// Previous track
    Previous,
    /// Next track
    Next,
    /// Toggle play/pause
    Toggle,
    /// Pause
    Pause,
    /// Play
    Play,
    /// Resume after rewind or fast forward
    Resume,
    /// Stop; makes the sender tear the session down
    Stop,
    /// Volume one step up
    VolumeUp,
    /// Volume one step down
    VolumeDown,
    /// Absolute volume, normalized to [0, 1]
    Volume(f32),
}

impl RemoteCommand {
    /// Command part of the `/ctrl-int/1/<command>` path
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Rewind => "beginrew".into(),
            Self::FastForward => "beginff".into(),
            Self::Previous => "previtem".into(),
            Self::Next => "nextitem".into(),
            Self::Toggle => "playpause".into(),
            Self::Pause => "pause".into(),
            Self::Play => "play".into(),
            Self::Resume => "playresume".into(),
            Self::Stop => "stop".into(),
            Self::VolumeUp => "volumeup".into(),
            Self::VolumeDown => "volumedown".into(),
            Self::Volume(v) => {
                let db = if *v <= 0.0 {
                    -144.0
                } else {
                    (v.min(1.0) - 1.0) * 30.0
                };
                format!("setproperty?dmcp.device-volume={db:.4}")
            }
        }
    }
}
