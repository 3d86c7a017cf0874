//! Payload decoders turning RTP audio payloads into 16-bit LE stereo PCM

/// Bytes per stereo 16-bit frame
pub const BYTES_PER_FRAME: usize = 4;

/// Decoder seam for the negotiated codec
pub trait AudioDecoder: Send {
    /// Decode one decrypted payload, replacing the contents of `out`
    fn decode(&mut self, payload: &[u8], out: &mut Vec<u8>);
}

/// `L16` payloads: big-endian samples on the wire
#[derive(Debug, Default, Clone, Copy)]
pub struct PcmDecoder;

impl AudioDecoder for PcmDecoder {
    fn decode(&mut self, payload: &[u8], out: &mut Vec<u8>) {
        out.clear();
        let whole = payload.len() - payload.len() % 2;
        out.reserve(whole);
        for sample in payload[..whole].chunks_exact(2) {
            out.extend_from_slice(&[sample[1], sample[0]]);
        }
    }
}

/// Stand-in for codecs without a decoder: one packet of silence per payload
#[derive(Debug, Clone, Copy)]
pub struct SilenceDecoder {
    frames_per_packet: usize,
}

impl SilenceDecoder {
    /// Silence of `frames_per_packet` frames per packet
    #[must_use]
    pub fn new(frames_per_packet: u32) -> Self {
        Self {
            frames_per_packet: frames_per_packet as usize,
        }
    }
}

impl AudioDecoder for SilenceDecoder {
    fn decode(&mut self, _payload: &[u8], out: &mut Vec<u8>) {
        out.clear();
        out.resize(self.frames_per_packet * BYTES_PER_FRAME, 0);
    }
}
