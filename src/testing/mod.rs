pub mod mock_sender;

use std::sync::Mutex;

use crate::receiver::{RaopCallbacks, RaopEvent};

pub use mock_sender::{MockSender, MockSenderConfig, MockSenderError, ServerPorts};

/// Callbacks that record everything the receiver hands them
///
/// `Setup` is accepted unless the recorder was built with
/// [`RecordingCallbacks::refusing`].
#[derive(Debug, Default)]
pub struct RecordingCallbacks {
    refuse: bool,
    events: Mutex<Vec<RaopEvent>>,
    pcm: Mutex<Vec<(Vec<u8>, u32)>>,
}

impl RecordingCallbacks {
    /// Recorder that refuses every stream
    #[must_use]
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    /// Events received so far
    #[must_use]
    pub fn events(&self) -> Vec<RaopEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// PCM blocks and their play times received so far
    #[must_use]
    pub fn pcm(&self) -> Vec<(Vec<u8>, u32)> {
        self.pcm.lock().map(|pcm| pcm.clone()).unwrap_or_default()
    }

    /// Whether an event matching `predicate` was received
    pub fn saw(&self, predicate: impl Fn(&RaopEvent) -> bool) -> bool {
        self.events().iter().any(predicate)
    }
}

impl RaopCallbacks for RecordingCallbacks {
    fn command(&self, event: RaopEvent) -> bool {
        let refused = self.refuse && event == RaopEvent::Setup;
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
        !refused
    }

    fn data(&self, pcm: &[u8], playtime: u32) {
        if let Ok(mut blocks) = self.pcm.lock() {
            blocks.push((pcm.to_vec(), playtime));
        }
    }
}
