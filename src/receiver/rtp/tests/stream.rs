use proptest::prelude::*;

use crate::protocol::crypto::AudioCipher;
use crate::protocol::rtp::{
    NtpTimestamp, ResendRequest, RtpHeader, SyncPacket, TimingReply, TimingRequest,
};
use crate::receiver::decoder::PcmDecoder;
use crate::receiver::events::RaopEvent;
use crate::receiver::rtp::{Outgoing, RtpStream, StreamParams};

use super::Recorder;

const NOW: u32 = 10_000;
const REMOTE: u64 = 0xE000_0000_0000_0000;
const RTP0: u32 = 1_000_000;

fn stream() -> RtpStream {
    RtpStream::new(StreamParams::default(), None, Box::new(PcmDecoder))
}

/// Stream with a clock reference: RTP0 plays 2s after NOW
fn ready_stream(recorder: &Recorder) -> RtpStream {
    let mut stream = stream();
    let reply = TimingReply {
        origin: NtpTimestamp(u64::from(NOW)),
        receive: NtpTimestamp(REMOTE),
        transmit: NtpTimestamp(REMOTE),
    };
    assert!(stream.on_timing_reply(&reply, NOW, recorder).is_empty());
    stream.on_sync(&SyncPacket {
        first: true,
        flags: 0,
        rtp_now_latency: RTP0 - 88_200,
        ntp_time: NtpTimestamp(REMOTE),
        rtp_now: RTP0,
    });
    stream
}

fn rtptime(seq: u16) -> u32 {
    RTP0 + u32::from(seq.wrapping_sub(100)) * 352
}

/// Audio packet whose decoded PCM starts with `seq` in little-endian
fn packet(seq: u16) -> Vec<u8> {
    let mut buf = RtpHeader::audio(seq, rtptime(seq), 0x1234).encode().to_vec();
    buf.extend_from_slice(&seq.to_be_bytes());
    buf.extend_from_slice(&seq.to_be_bytes());
    buf
}

fn send(stream: &mut RtpStream, recorder: &Recorder, seq: u16, now: u32) -> Vec<Outgoing> {
    stream.on_audio(&packet(seq), now, recorder).unwrap()
}

#[test]
fn test_playtime_follows_sync_anchor() {
    let recorder = Recorder::default();
    let stream = ready_stream(&recorder);

    assert_eq!(stream.playtime(RTP0), NOW + 2000);
    assert_eq!(stream.playtime(RTP0 + 44_100), NOW + 3000);
    assert_eq!(stream.playtime(RTP0 - 44_100), NOW + 1000);
    assert_eq!(stream.latency(), 88_200);
}

#[test]
fn test_packets_dropped_until_clock_known() {
    let recorder = Recorder::default();
    let mut stream = stream();

    assert!(send(&mut stream, &recorder, 100, NOW).is_empty());
    assert!(!stream.is_playing());
    assert!(recorder.pcm().is_empty());
}

#[test]
fn test_first_packet_starts_playback() {
    let recorder = Recorder::default();
    let mut stream = ready_stream(&recorder);

    send(&mut stream, &recorder, 100, NOW);

    assert!(stream.is_playing());
    assert_eq!(
        recorder.events(),
        vec![RaopEvent::Timing, RaopEvent::Play { start_at: NOW + 2000 }]
    );
    assert_eq!(recorder.pcm(), vec![(vec![100, 0, 100, 0], NOW + 2000)]);
}

#[test]
fn test_in_order_delivery() {
    let recorder = Recorder::default();
    let mut stream = ready_stream(&recorder);

    for seq in 100..103 {
        assert!(send(&mut stream, &recorder, seq, NOW).is_empty());
    }

    assert_eq!(recorder.delivered(), vec![100, 101, 102]);
    let playtimes: Vec<u32> = recorder.pcm().iter().map(|(_, t)| *t).collect();
    assert_eq!(playtimes, vec![NOW + 2000, NOW + 2007, NOW + 2015]);
    assert_eq!(stream.read_position(), 103);
}

#[test]
fn test_sequence_wraps() {
    let recorder = Recorder::default();
    let mut stream = ready_stream(&recorder);

    let seqs: Vec<u16> = (65_530..=u16::MAX).chain(0..4).collect();
    for &seq in &seqs {
        send(&mut stream, &recorder, seq, NOW);
    }

    assert_eq!(recorder.delivered(), seqs);
}

#[test]
fn test_gap_requests_resend_and_recovered_packet_fills_it() {
    let recorder = Recorder::default();
    let mut stream = ready_stream(&recorder);

    send(&mut stream, &recorder, 100, NOW);
    let out = send(&mut stream, &recorder, 103, NOW);
    assert_eq!(
        out,
        vec![Outgoing::Resend(ResendRequest { first: 101, count: 2 })]
    );
    assert_eq!(recorder.delivered(), vec![100]);

    assert!(send(&mut stream, &recorder, 101, NOW).is_empty());
    assert_eq!(recorder.delivered(), vec![100, 101]);

    send(&mut stream, &recorder, 102, NOW);
    assert_eq!(recorder.delivered(), vec![100, 101, 102, 103]);
}

#[test]
fn test_retransmit_on_control_channel() {
    let recorder = Recorder::default();
    let mut stream = ready_stream(&recorder);

    send(&mut stream, &recorder, 100, NOW);
    send(&mut stream, &recorder, 102, NOW);

    let mut retransmit = vec![0x80, 0xD6, 0x00, 0x01];
    retransmit.extend_from_slice(&packet(101));
    stream.on_control(&retransmit, NOW, &recorder).unwrap();

    assert_eq!(recorder.delivered(), vec![100, 101, 102]);
}

#[test]
fn test_late_packet_dropped() {
    let recorder = Recorder::default();
    let mut stream = ready_stream(&recorder);

    send(&mut stream, &recorder, 100, NOW);
    send(&mut stream, &recorder, 101, NOW);
    send(&mut stream, &recorder, 100, NOW);

    assert_eq!(recorder.delivered(), vec![100, 101]);
}

#[test]
fn test_missing_packet_becomes_silence_near_playtime() {
    let recorder = Recorder::default();
    let mut stream = ready_stream(&recorder);

    send(&mut stream, &recorder, 100, NOW);
    send(&mut stream, &recorder, 102, NOW);
    // 101 is due at NOW + 2007, inside the 250ms hold window
    send(&mut stream, &recorder, 103, NOW + 1900);

    let data = recorder.pcm();
    assert_eq!(data.len(), 4);
    assert_eq!(data[1].0.len(), 352 * 4);
    assert!(data[1].0.iter().all(|&b| b == 0));
    assert_eq!(data[1].1, NOW + 2007);
    assert_eq!(data[2].0[..2], [102, 0]);
    assert_eq!(data[3].0[..2], [103, 0]);
}

#[test]
fn test_packets_due_in_the_past_are_discarded() {
    let recorder = Recorder::default();
    let mut stream = ready_stream(&recorder);

    send(&mut stream, &recorder, 100, NOW + 5000);

    assert!(stream.is_playing());
    assert!(recorder.pcm().is_empty());
    assert_eq!(stream.read_position(), 101);
}

#[test]
fn test_resend_retried_after_timeout() {
    let recorder = Recorder::default();
    let mut stream = ready_stream(&recorder);

    send(&mut stream, &recorder, 100, NOW);
    send(&mut stream, &recorder, 102, NOW);
    assert!(send(&mut stream, &recorder, 103, NOW + 100).is_empty());

    let out = send(&mut stream, &recorder, 104, NOW + 300);
    assert_eq!(
        out,
        vec![Outgoing::Resend(ResendRequest { first: 101, count: 4 })]
    );
}

#[test]
fn test_large_gap_limited_to_latency() {
    let recorder = Recorder::default();
    let mut stream = ready_stream(&recorder);

    send(&mut stream, &recorder, 100, NOW);
    let out = send(&mut stream, &recorder, 500, NOW);

    // 88200 frames of latency is 250 packets
    assert_eq!(
        out,
        vec![Outgoing::Resend(ResendRequest { first: 251, count: 249 })]
    );
    assert_eq!(stream.read_position(), 251);
}

#[test]
fn test_flush_behind_read_position_is_noop() {
    let recorder = Recorder::default();
    let mut stream = ready_stream(&recorder);

    for seq in 100..103 {
        send(&mut stream, &recorder, seq, NOW);
    }

    assert!(!stream.flush(102, rtptime(102)));
    assert!(!stream.flush(90, rtptime(90)));
    assert!(stream.is_playing());

    send(&mut stream, &recorder, 103, NOW);
    assert_eq!(recorder.delivered(), vec![100, 101, 102, 103]);
}

#[test]
fn test_flush_at_read_position_pauses() {
    let recorder = Recorder::default();
    let mut stream = ready_stream(&recorder);

    for seq in 100..105 {
        send(&mut stream, &recorder, seq, NOW);
    }
    assert_eq!(stream.read_position(), 105);

    // the sender names its next packet when pausing
    assert!(stream.flush(105, rtptime(105)));
    assert!(!stream.is_playing());
    assert_eq!(stream.flush_marker(), Some(105));

    // a repeated pause is a no-op
    assert!(!stream.flush(105, rtptime(105)));

    send(&mut stream, &recorder, 105, NOW);
    assert!(stream.is_playing());
    assert_eq!(recorder.delivered(), vec![100, 101, 102, 103, 104, 105]);
}

#[test]
fn test_flush_ahead_discards_audio_before_marker() {
    let recorder = Recorder::default();
    let mut stream = ready_stream(&recorder);

    send(&mut stream, &recorder, 100, NOW);
    // 101 is lost, so 102..=106 stay buffered
    for seq in 102..107 {
        send(&mut stream, &recorder, seq, NOW);
    }
    assert_eq!(recorder.delivered(), vec![100]);

    assert!(stream.flush(104, rtptime(104)));
    assert!(!stream.is_playing());
    assert_eq!(stream.flush_marker(), Some(104));

    // audio before the marker is refused
    send(&mut stream, &recorder, 103, NOW);
    assert!(!stream.is_playing());

    // buffered audio from the marker on survives
    send(&mut stream, &recorder, 104, NOW);
    let out = send(&mut stream, &recorder, 107, NOW);
    assert_eq!(
        out,
        vec![Outgoing::Resend(ResendRequest { first: 105, count: 2 })]
    );
    assert_eq!(recorder.delivered(), vec![100, 104, 105, 106, 107]);
}

#[test]
fn test_flush_while_armed_compares_with_marker() {
    let mut stream = stream();
    stream.record(Some(50), 0);

    assert!(!stream.flush(50, 0));
    assert!(!stream.flush(40, 0));
    assert!(stream.flush(60, 0));
    assert_eq!(stream.flush_marker(), Some(60));
}

#[test]
fn test_flush_before_any_marker_takes_effect() {
    let mut stream = stream();
    assert!(stream.flush(10, 0));
    assert_eq!(stream.flush_marker(), Some(10));
}

#[test]
fn test_record_arms_start_sequence() {
    let recorder = Recorder::default();
    let mut stream = ready_stream(&recorder);
    stream.record(Some(200), rtptime(200));

    send(&mut stream, &recorder, 199, NOW);
    assert!(!stream.is_playing());

    send(&mut stream, &recorder, 200, NOW);
    assert!(stream.is_playing());
    assert_eq!(recorder.delivered(), vec![200]);
}

#[test]
fn test_record_without_rtp_info_leaves_stream_unarmed() {
    let mut stream = stream();
    stream.record(None, 0);
    assert_eq!(stream.flush_marker(), None);
}

#[test]
fn test_sync_latency_is_clamped() {
    let mut stream = stream();
    let mut sync = SyncPacket {
        first: false,
        flags: 0,
        rtp_now_latency: 9_000,
        ntp_time: NtpTimestamp(REMOTE),
        rtp_now: 10_000,
    };

    stream.on_sync(&sync);
    assert_eq!(stream.latency(), 11_025);

    sync.rtp_now_latency = 10_000u32.wrapping_sub(77_175);
    stream.on_sync(&sync);
    assert_eq!(stream.latency(), 77_175);

    sync.flags = 7;
    stream.on_sync(&sync);
    assert_eq!(stream.latency(), 88_200);

    sync.flags = 4;
    sync.rtp_now_latency = 10_000u32.wrapping_sub(20_000);
    stream.on_sync(&sync);
    assert_eq!(stream.latency(), 31_025);
}

#[test]
fn test_slow_timing_reply_requests_again() {
    let recorder = Recorder::default();
    let mut stream = stream();
    let reply = TimingReply {
        origin: NtpTimestamp(u64::from(NOW - 500)),
        receive: NtpTimestamp(REMOTE),
        transmit: NtpTimestamp(REMOTE),
    };

    let out = stream.on_timing_reply(&reply, NOW, &recorder);
    assert_eq!(out, vec![Outgoing::Timing(TimingRequest { local_ms: NOW })]);
    assert!(recorder.events().is_empty());
}

#[test]
fn test_timing_reply_decoded_from_wire() {
    let recorder = Recorder::default();
    let mut stream = stream();
    let reply = TimingReply {
        origin: NtpTimestamp(u64::from(NOW - 20)),
        receive: NtpTimestamp(REMOTE),
        transmit: NtpTimestamp(REMOTE),
    };

    assert!(stream.on_timing(&reply.encode(), NOW, &recorder).unwrap().is_empty());
    assert_eq!(recorder.events(), vec![RaopEvent::Timing]);
    assert!(stream.on_timing(&[0x80, 0xD3], NOW, &recorder).is_err());
}

#[test]
fn test_encrypted_payload_is_decrypted() {
    let key = [0x11u8; 16];
    let iv = [0x22u8; 16];
    let recorder = Recorder::default();
    let mut stream = RtpStream::new(
        StreamParams::default(),
        Some(AudioCipher::new(&key, &iv).unwrap()),
        Box::new(PcmDecoder),
    );
    let reply = TimingReply {
        origin: NtpTimestamp(u64::from(NOW)),
        receive: NtpTimestamp(REMOTE),
        transmit: NtpTimestamp(REMOTE),
    };
    stream.on_timing_reply(&reply, NOW, &recorder);
    stream.on_sync(&SyncPacket {
        first: true,
        flags: 0,
        rtp_now_latency: RTP0 - 88_200,
        ntp_time: NtpTimestamp(REMOTE),
        rtp_now: RTP0,
    });

    let plaintext: Vec<u8> = (0..34).collect();
    let mut payload = plaintext.clone();
    AudioCipher::new(&key, &iv).unwrap().encrypt_in_place(&mut payload);
    assert_ne!(payload[..32], plaintext[..32]);

    let mut buf = RtpHeader::audio(100, RTP0, 0).encode().to_vec();
    buf.extend_from_slice(&payload);
    stream.on_audio(&buf, NOW, &recorder).unwrap();

    let expected: Vec<u8> = plaintext.chunks(2).flat_map(|s| [s[1], s[0]]).collect();
    assert_eq!(recorder.pcm()[0].0, expected);
}

#[test]
fn test_control_rejects_unexpected_packets() {
    let recorder = Recorder::default();
    let mut stream = stream();

    assert!(stream.on_control(&[0x80], NOW, &recorder).is_err());
    assert!(stream.on_control(&[0x80, 0xD2, 0, 0], NOW, &recorder).is_err());
    assert!(stream.on_audio(&[0x80, 0xD4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0], NOW, &recorder).is_err());
}

proptest! {
    #[test]
    fn prop_reordered_packets_delivered_in_order(
        order in Just((1u16..24).collect::<Vec<_>>()).prop_shuffle()
    ) {
        let recorder = Recorder::default();
        let mut stream = ready_stream(&recorder);

        send(&mut stream, &recorder, 100, NOW);
        for offset in order {
            send(&mut stream, &recorder, 100 + offset, NOW);
        }

        prop_assert_eq!(recorder.delivered(), (100u16..124).collect::<Vec<_>>());
    }
}
