//! Reorder buffer and clock bookkeeping for one RAOP stream
//!
//! Pure state machine: packets and the current local time go in, PCM and
//! events go out through [`RaopCallbacks`], and any packets that must be
//! sent back to the sender are returned as [`Outgoing`]. The socket side
//! lives in [`super::RtpContext`].

use crate::clock::ms_diff;
use crate::protocol::crypto::AudioCipher;
use crate::protocol::rtp::{
    PayloadType, ResendRequest, RtpDecodeError, RtpHeader, SyncPacket, TimingReply, TimingRequest,
    ntp_to_ms, seq_before, unwrap_retransmit,
};
use crate::receiver::decoder::{AudioDecoder, BYTES_PER_FRAME};
use crate::receiver::events::{RaopCallbacks, RaopEvent};

/// Slots in the reorder buffer
pub const BUFFER_FRAMES: usize = 1024;

/// Lowest latency a sync packet can set, in frames
pub const MIN_LATENCY_FRAMES: u32 = 11_025;

/// Highest latency a sync packet can set, in frames
pub const MAX_LATENCY_FRAMES: u32 = 88_200;

/// Largest span a single resend request may cover
const MAX_RESEND_SPAN: u16 = (BUFFER_FRAMES / 2) as u16;

/// A missing packet is requested again after this long
const RESEND_RETRY_MS: i32 = 250;

/// Missing slots are scanned this many packets apart
const RESEND_SCAN_STEP: u16 = 16;

/// Timing replies slower than this are discarded
const MAX_TIMING_ROUNDTRIP_MS: u32 = 100;

/// Shortest hold window before a missing packet becomes silence
const MIN_HOLD_MS: i64 = 100;

/// Latency senders add on top of the sync packet difference
const SYNC_EXTRA_LATENCY: u32 = 11_025;

/// Stream format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Frames carried by one audio packet
    pub frames_per_packet: u32,
}

impl Default for StreamParams {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            frames_per_packet: 352,
        }
    }
}

/// Packet the engine wants sent to the sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outgoing {
    /// Resend request, to the sender's control port
    Resend(ResendRequest),
    /// Timing request, to the sender's timing port
    Timing(TimingRequest),
}

#[derive(Debug, Default)]
struct Slot {
    ready: bool,
    seq: u16,
    rtptime: u32,
    last_resend: u32,
    data: Vec<u8>,
}

impl Slot {
    fn holds(&self, seq: u16) -> bool {
        self.ready && self.seq == seq
    }
}

/// Latest timing exchange: our ms counter when the request left and the
/// sender's clock when it answered
#[derive(Debug, Clone, Copy)]
struct TimingRef {
    local: u32,
    remote: u64,
}

/// Latest sync packet: the RTP timestamp due at the sender clock `ntp`
#[derive(Debug, Clone, Copy)]
struct SenderClock {
    rtp: u32,
    ntp: u64,
}

/// Reorder buffer for one stream
pub struct RtpStream {
    params: StreamParams,
    cipher: Option<AudioCipher>,
    decoder: Box<dyn AudioDecoder>,
    slots: Vec<Slot>,
    playing: bool,
    ab_read: u16,
    ab_write: u16,
    flush_seqno: Option<u16>,
    latency: u32,
    timing: Option<TimingRef>,
    sync: Option<SenderClock>,
    scratch: Vec<u8>,
    silence: Vec<u8>,
}

impl RtpStream {
    /// Engine decrypting with `cipher` (if any) and decoding with `decoder`
    #[must_use]
    pub fn new(
        params: StreamParams,
        cipher: Option<AudioCipher>,
        decoder: Box<dyn AudioDecoder>,
    ) -> Self {
        let mut slots = Vec::with_capacity(BUFFER_FRAMES);
        slots.resize_with(BUFFER_FRAMES, Slot::default);

        Self {
            params,
            cipher,
            decoder,
            slots,
            playing: false,
            ab_read: 0,
            ab_write: 0,
            flush_seqno: None,
            latency: MIN_LATENCY_FRAMES,
            timing: None,
            sync: None,
            scratch: Vec::new(),
            silence: vec![0; params.frames_per_packet as usize * BYTES_PER_FRAME],
        }
    }

    /// Whether packets are being delivered
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Latency in frames, as last set by a sync packet
    #[must_use]
    pub fn latency(&self) -> u32 {
        self.latency
    }

    /// Next sequence number to deliver
    #[must_use]
    pub fn read_position(&self) -> u16 {
        self.ab_read
    }

    /// Sequence number the stream is armed to start from
    #[must_use]
    pub fn flush_marker(&self) -> Option<u16> {
        self.flush_seqno
    }

    /// Local ms at which the frame stamped `rtptime` is due
    ///
    /// Only meaningful once both a sync packet and a timing reply have
    /// been seen.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn playtime(&self, rtptime: u32) -> u32 {
        let (Some(timing), Some(sync)) = (self.timing, self.sync) else {
            return 0;
        };

        let anchor = timing.local.wrapping_add(ntp_delta_ms(sync.ntp, timing.remote));
        let frames = i64::from(rtptime.wrapping_sub(sync.rtp) as i32);
        let offset = frames * 1000 / i64::from(self.params.sample_rate);
        anchor.wrapping_add(offset as u32)
    }

    /// RECORD: start accepting packets from `seq` unless already playing
    pub fn record(&mut self, seq: Option<u16>, rtptime: u32) {
        tracing::info!(?seq, rtptime, playing = self.playing, "record");
        if !self.playing {
            if let Some(seq) = seq {
                self.flush_seqno = Some(seq);
            }
        }
    }

    /// FLUSH up to `seq`
    ///
    /// While playing, a marker behind the read position is stale and
    /// changes nothing; a marker at the read position is the usual pause
    /// and stops delivery. While armed, a marker that does not move past
    /// the armed one is a repeat and changes nothing. Those cases return
    /// `false`. Otherwise buffered packets before the marker are dropped,
    /// packets from the marker on are kept, delivery stops and the stream
    /// re-arms at the marker.
    pub fn flush(&mut self, seq: u16, rtptime: u32) -> bool {
        let stale = if self.playing {
            seq_before(seq, self.ab_read)
        } else {
            self.flush_seqno
                .is_some_and(|marker| !seq_before(marker, seq))
        };
        if stale {
            tracing::info!(
                seq,
                rtptime,
                playing = self.playing,
                read = self.ab_read,
                marker = ?self.flush_seqno,
                "flush marker not ahead, ignored"
            );
            return false;
        }

        for slot in self.slots.iter_mut().filter(|s| s.ready) {
            if seq_before(slot.seq, seq) {
                slot.ready = false;
            }
        }
        self.playing = false;
        self.flush_seqno = Some(seq);
        tracing::info!(seq, rtptime, "flushed");
        true
    }

    /// A timing request to send now
    #[must_use]
    pub fn timing_request(&self, now: u32) -> Outgoing {
        Outgoing::Timing(TimingRequest { local_ms: now })
    }

    /// Packet from the audio channel
    ///
    /// # Errors
    ///
    /// Returns `RtpDecodeError` if the packet is not an RTP audio packet.
    pub fn on_audio(
        &mut self,
        buf: &[u8],
        now: u32,
        callbacks: &dyn RaopCallbacks,
    ) -> Result<Vec<Outgoing>, RtpDecodeError> {
        let header = RtpHeader::decode(buf)?;
        if header.payload_type != PayloadType::Audio {
            return Err(RtpDecodeError::UnexpectedPayloadType(header.payload_type));
        }

        let mut out = Vec::new();
        self.put_packet(
            header.sequence,
            header.timestamp,
            &buf[RtpHeader::SIZE..],
            now,
            callbacks,
            &mut out,
        );
        Ok(out)
    }

    /// Packet from the control channel: sync or retransmitted audio
    ///
    /// # Errors
    ///
    /// Returns `RtpDecodeError` for malformed packets.
    pub fn on_control(
        &mut self,
        buf: &[u8],
        now: u32,
        callbacks: &dyn RaopCallbacks,
    ) -> Result<Vec<Outgoing>, RtpDecodeError> {
        if buf.len() < 2 {
            return Err(RtpDecodeError::BufferTooSmall {
                needed: 2,
                have: buf.len(),
            });
        }

        match PayloadType::from_byte(buf[1]) {
            Some(PayloadType::Sync) => {
                self.on_sync(&SyncPacket::decode(buf)?);
                Ok(Vec::new())
            }
            Some(PayloadType::Retransmit) => {
                let inner = unwrap_retransmit(buf)?;
                tracing::debug!(len = inner.len(), "retransmitted packet");
                self.on_audio(inner, now, callbacks)
            }
            Some(other) => Err(RtpDecodeError::UnexpectedPayloadType(other)),
            None => Err(RtpDecodeError::UnknownPayloadType(buf[1] & 0x7F)),
        }
    }

    /// Packet from the timing channel
    ///
    /// # Errors
    ///
    /// Returns `RtpDecodeError` if it is not a timing reply.
    pub fn on_timing(
        &mut self,
        buf: &[u8],
        now: u32,
        callbacks: &dyn RaopCallbacks,
    ) -> Result<Vec<Outgoing>, RtpDecodeError> {
        let reply = TimingReply::decode(buf)?;
        Ok(self.on_timing_reply(&reply, now, callbacks))
    }

    /// Apply a sync packet
    pub fn on_sync(&mut self, sync: &SyncPacket) {
        let mut latency = sync.rtp_now.wrapping_sub(sync.rtp_now_latency);
        if sync.flags == 7 || sync.flags == 4 {
            latency = latency.wrapping_add(SYNC_EXTRA_LATENCY);
        }
        self.latency = latency.clamp(MIN_LATENCY_FRAMES, MAX_LATENCY_FRAMES);

        self.sync = Some(SenderClock {
            rtp: sync.rtp_now.wrapping_sub(self.latency),
            ntp: sync.ntp_time.0,
        });
        tracing::debug!(
            latency = self.latency,
            rtp = sync.rtp_now,
            first = sync.first,
            "sync"
        );
    }

    /// Apply a timing reply
    pub fn on_timing_reply(
        &mut self,
        reply: &TimingReply,
        now: u32,
        callbacks: &dyn RaopCallbacks,
    ) -> Vec<Outgoing> {
        let reference = reply.reference_ms();
        let roundtrip = now.wrapping_sub(reference);
        if roundtrip > MAX_TIMING_ROUNDTRIP_MS {
            tracing::warn!(roundtrip, "discarding slow timing reply");
            return vec![self.timing_request(now)];
        }

        self.timing = Some(TimingRef {
            local: reference,
            remote: reply.receive.0,
        });
        tracing::trace!(roundtrip, "timing reference updated");
        callbacks.command(RaopEvent::Timing);
        Vec::new()
    }

    fn put_packet(
        &mut self,
        seq: u16,
        rtptime: u32,
        payload: &[u8],
        now: u32,
        callbacks: &dyn RaopCallbacks,
        out: &mut Vec<Outgoing>,
    ) {
        if !self.playing {
            let armed = self.flush_seqno.is_none_or(|marker| !seq_before(seq, marker));
            if !armed || self.sync.is_none() || self.timing.is_none() {
                tracing::trace!(seq, "not playing yet, packet dropped");
                return;
            }

            self.ab_write = seq.wrapping_sub(1);
            self.ab_read = seq;
            self.flush_seqno = None;
            self.playing = true;

            let start_at = self.playtime(rtptime);
            tracing::info!(seq, rtptime, start_at, "stream starting");
            callbacks.command(RaopEvent::Play { start_at });
        }

        let span = self.latency_packets();
        let store = if seq == self.ab_write.wrapping_add(1) {
            self.ab_write = seq;
            true
        } else if seq_before(self.ab_write, seq) {
            if seq.wrapping_sub(self.ab_write).wrapping_sub(1) > span {
                tracing::warn!(
                    missing = seq.wrapping_sub(self.ab_write).wrapping_sub(1),
                    seq,
                    "too many missing packets"
                );
                self.ab_write = seq.wrapping_sub(span);
            }
            if seq.wrapping_sub(self.ab_read) > span {
                tracing::warn!(seq, read = self.ab_read, "reader lagging, skipping ahead");
                self.ab_read = seq.wrapping_sub(span).wrapping_add(1);
            }

            let first = self.ab_write.wrapping_add(1);
            let last = seq.wrapping_sub(1);
            if let Some(request) = Self::resend_request(first, last) {
                out.push(Outgoing::Resend(request));
                let fpp = self.params.frames_per_packet;
                let mut missing = first;
                while seq_before(missing, seq) {
                    let slot = &mut self.slots[slot_index(missing)];
                    slot.rtptime =
                        rtptime.wrapping_sub(u32::from(seq.wrapping_sub(missing)) * fpp);
                    slot.last_resend = now;
                    missing = missing.wrapping_add(1);
                }
            }
            self.ab_write = seq;
            true
        } else if !seq_before(seq, self.ab_read) {
            tracing::debug!(seq, "recovered packet");
            true
        } else {
            tracing::debug!(seq, read = self.ab_read, "packet too late, dropped");
            false
        };

        if store {
            self.scratch.clear();
            self.scratch.extend_from_slice(payload);
            if let Some(cipher) = &self.cipher {
                cipher.decrypt_in_place(&mut self.scratch);
            }

            let slot = &mut self.slots[slot_index(seq)];
            self.decoder.decode(&self.scratch, &mut slot.data);
            slot.ready = true;
            slot.seq = seq;
            slot.rtptime = rtptime;
        }

        self.push_packets(now, callbacks, out);
    }

    fn push_packets(&mut self, now: u32, callbacks: &dyn RaopCallbacks, out: &mut Vec<Outgoing>) {
        let hold = (i64::from(self.latency) * 1000 / (8 * i64::from(self.params.sample_rate)))
            .max(MIN_HOLD_MS);

        while !seq_before(self.ab_write, self.ab_read) {
            let seq = self.ab_read;
            let playtime = self.playtime(self.slots[slot_index(seq)].rtptime);
            let slot = &mut self.slots[slot_index(seq)];

            if ms_diff(now, playtime) > 0 {
                tracing::debug!(seq, playtime, now, "packet due in the past, discarded");
                slot.ready = false;
            } else if slot.holds(seq) {
                callbacks.data(&slot.data, playtime);
                slot.ready = false;
            } else if i64::from(ms_diff(playtime, now)) <= hold {
                tracing::debug!(seq, playtime, "packet missing, playing silence");
                callbacks.data(&self.silence, playtime);
            } else {
                break;
            }
            self.ab_read = seq.wrapping_add(1);
        }

        let mut offset = 0u16;
        while seq_before(self.ab_read.wrapping_add(offset), self.ab_write) {
            let seq = self.ab_read.wrapping_add(offset);
            let slot = &self.slots[slot_index(seq)];
            if !slot.holds(seq) && ms_diff(now, slot.last_resend) > RESEND_RETRY_MS {
                if let Some(request) = Self::resend_request(seq, self.ab_write) {
                    out.push(Outgoing::Resend(request));
                    let mut missing = seq;
                    while seq_before(missing, self.ab_write) {
                        let slot = &mut self.slots[slot_index(missing)];
                        if !slot.holds(missing) {
                            slot.last_resend = now;
                        }
                        missing = missing.wrapping_add(1);
                    }
                }
                break;
            }
            offset = offset.wrapping_add(RESEND_SCAN_STEP);
        }
    }

    fn resend_request(first: u16, last: u16) -> Option<ResendRequest> {
        if seq_before(last, first) {
            return None;
        }
        let count = last.wrapping_sub(first).wrapping_add(1);
        if count > MAX_RESEND_SPAN {
            tracing::warn!(first, count, "resend span too large, not requested");
            return None;
        }
        tracing::debug!(first, count, "requesting resend");
        Some(ResendRequest { first, count })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn latency_packets(&self) -> u16 {
        (self.latency / self.params.frames_per_packet.max(1)).min(u32::from(MAX_RESEND_SPAN)) as u16
    }
}

fn slot_index(seq: u16) -> usize {
    usize::from(seq) % BUFFER_FRAMES
}

/// Signed ms distance between two sender clock readings, as wrapping u32
#[allow(clippy::cast_possible_wrap)]
fn ntp_delta_ms(a: u64, b: u64) -> u32 {
    let delta = a.wrapping_sub(b) as i64;
    if delta >= 0 {
        ntp_to_ms(delta.unsigned_abs())
    } else {
        ntp_to_ms(delta.unsigned_abs()).wrapping_neg()
    }
}
