use std::sync::Mutex;

use crate::receiver::events::{RaopCallbacks, RaopEvent};

mod context;
mod stream;

#[derive(Default)]
pub(super) struct Recorder {
    events: Mutex<Vec<RaopEvent>>,
    data: Mutex<Vec<(Vec<u8>, u32)>>,
}

impl Recorder {
    pub(super) fn events(&self) -> Vec<RaopEvent> {
        self.events.lock().unwrap().clone()
    }

    pub(super) fn pcm(&self) -> Vec<(Vec<u8>, u32)> {
        self.data.lock().unwrap().clone()
    }

    /// Sequence numbers recovered from the test payloads
    pub(super) fn delivered(&self) -> Vec<u16> {
        self.pcm()
            .iter()
            .map(|(pcm, _)| u16::from_le_bytes([pcm[0], pcm[1]]))
            .collect()
    }
}

impl RaopCallbacks for Recorder {
    fn command(&self, event: RaopEvent) -> bool {
        self.events.lock().unwrap().push(event);
        true
    }

    fn data(&self, pcm: &[u8], playtime: u32) {
        self.data.lock().unwrap().push((pcm.to_vec(), playtime));
    }
}

