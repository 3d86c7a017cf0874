use super::*;

#[test]
fn test_audio_header_round_trip() {
    let header = RtpHeader::audio(0xFFFE, 0x1234_5678, 0xDEAD_BEEF);
    let bytes = header.encode();

    assert_eq!(bytes[0], 0x80);
    assert_eq!(bytes[1], 0x60);
    assert_eq!(RtpHeader::decode(&bytes).unwrap(), header);
}

#[test]
fn test_audio_header_with_marker() {
    let mut bytes = RtpHeader::audio(1, 2, 3).encode();
    bytes[0] = 0x90;
    bytes[1] = 0xE0;

    let header = RtpHeader::decode(&bytes).unwrap();
    assert!(header.marker);
    assert!(header.extension);
    assert_eq!(header.payload_type, PayloadType::Audio);
}

#[test]
fn test_header_errors() {
    assert!(matches!(
        RtpHeader::decode(&[0x80, 0x60]),
        Err(RtpDecodeError::BufferTooSmall { needed: 12, have: 2 })
    ));

    let mut bytes = RtpHeader::audio(1, 2, 3).encode();
    bytes[0] = 0x40;
    assert!(matches!(
        RtpHeader::decode(&bytes),
        Err(RtpDecodeError::InvalidVersion(1))
    ));

    bytes[0] = 0x80;
    bytes[1] = 0x7F;
    assert!(matches!(
        RtpHeader::decode(&bytes),
        Err(RtpDecodeError::UnknownPayloadType(0x7F))
    ));
}

#[test]
fn test_sync_packet_layout() {
    let sync = SyncPacket {
        first: true,
        flags: 7,
        rtp_now_latency: 1000,
        ntp_time: NtpTimestamp(0x0000_0001_8000_0000),
        rtp_now: 12025,
    };
    let bytes = sync.encode();

    assert_eq!(&bytes[..4], &[0x90, 0xD4, 0x00, 0x07]);
    assert_eq!(SyncPacket::decode(&bytes).unwrap(), sync);
}

#[test]
fn test_sync_rejects_other_types() {
    let bytes = TimingRequest { local_ms: 1 }.encode();
    assert!(matches!(
        SyncPacket::decode(&bytes),
        Err(RtpDecodeError::UnexpectedPayloadType(PayloadType::TimingRequest))
    ));
}

#[test]
fn test_resend_request_layout() {
    let request = ResendRequest { first: 65535, count: 3 };
    let bytes = request.encode(1);

    assert_eq!(bytes, [0x80, 0xD5, 0x00, 0x01, 0xFF, 0xFF, 0x00, 0x03]);
    assert_eq!(ResendRequest::decode(&bytes).unwrap(), request);
}

#[test]
fn test_unwrap_retransmit() {
    let mut packet = vec![0x80, 0xD6, 0x00, 0x01];
    packet.extend_from_slice(&RtpHeader::audio(42, 0, 0).encode());
    packet.extend_from_slice(&[9, 9]);

    let inner = unwrap_retransmit(&packet).unwrap();
    assert_eq!(RtpHeader::decode(inner).unwrap().sequence, 42);
    assert!(unwrap_retransmit(&[0x80, 0xD6, 0, 1]).is_err());
}

#[test]
fn test_timing_request_carries_local_ms() {
    let bytes = TimingRequest { local_ms: 0xCAFE_BABE }.encode();

    assert_eq!(&bytes[..4], &[0x80, 0xD2, 0x00, 0x07]);
    assert_eq!(&bytes[28..], &0xCAFE_BABEu32.to_be_bytes());
    assert_eq!(TimingRequest::decode(&bytes).unwrap().local_ms, 0xCAFE_BABE);
}

#[test]
fn test_timing_reply_reference() {
    let reply = TimingReply {
        origin: NtpTimestamp(u64::from(0x0102_0304u32)),
        receive: NtpTimestamp(5 << 32),
        transmit: NtpTimestamp(6 << 32),
    };
    let decoded = TimingReply::decode(&reply.encode()).unwrap();

    assert_eq!(decoded, reply);
    assert_eq!(decoded.reference_ms(), 0x0102_0304);
}

#[test]
fn test_ntp_ms_conversion() {
    assert_eq!(ntp_to_ms(1 << 32), 1000);
    assert_eq!(ntp_to_ms(1 << 31), 500);
    assert_eq!(ntp_to_ms(ms_to_ntp(2500)), 2499);
    assert!(NtpTimestamp::now().0 > (3_900_000_000u64 << 32));
}

#[test]
fn test_seq_before_wraps() {
    assert!(seq_before(1, 2));
    assert!(!seq_before(2, 1));
    assert!(!seq_before(5, 5));
    assert!(seq_before(65535, 0));
    assert!(seq_before(65000, 100));
    assert!(!seq_before(100, 65000));
}
