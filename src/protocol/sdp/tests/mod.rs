use super::*;

const ITUNES_SDP: &str = "v=0\r\n\
o=iTunes 3413821438 0 IN IP4 fe80::217:f2ff:fe0f:e0f6\r\n\
s=iTunes\r\n\
c=IN IP4 fe80::5a55:caff:fe1a:e187\r\n\
t=0 0\r\n\
m=audio 0 RTP/AVP 96\r\n\
a=rtpmap:96 AppleLossless\r\n\
a=fmtp:96 352 0 16 40 10 14 2 255 0 0 44100\r\n\
a=rsaaeskey:VjVbxWcmYgbBbhwBNlCh3K0CMNtWoB844BuiHGUJT51zQS7SDpMnlbBIobsKbfEJ3SCgWHRXjYWf7VQWRYtEcfx7ejA8xDIk5PSBYTvXP5dU2QoGrSBv0leDS6uxlEWuxBq3lIxCxpWO2YswHYKJBt06Uz9P2Fq2hDUwl3qOQ8oXb0OateTKtfXEwHJMprkhsJsGDrIc5W5NJFMAo6zCiM9bGSDeH2nvTlyW6bfI/Q0v0cDGUNeY3ut6fsoafRkfpCwYId+bg3diJh+uzw5htHDyZ2sN+BFYHzEfo8iv4KDxzeya9llqg6fRNQ8d5YjpvTnoeEQ9ye9ivjkBjcAfVw\r\n\
a=aesiv:zcZmAZtqh7uGcEwPXk0QeA\r\n";

#[test]
fn test_parse_itunes_announce() {
    let sdp = SdpParser::parse(ITUNES_SDP).unwrap();

    assert_eq!(sdp.version, 0);
    assert_eq!(sdp.session_name, "iTunes");
    assert_eq!(sdp.media.len(), 1);
    assert_eq!(sdp.audio_media().unwrap().formats, vec!["96"]);
    assert_eq!(sdp.fmtp(), Some("96 352 0 16 40 10 14 2 255 0 0 44100"));
    assert_eq!(sdp.aesiv(), Some("zcZmAZtqh7uGcEwPXk0QeA"));
    assert!(sdp.rsaaeskey().unwrap().starts_with("VjVbxWcmYgbBbhwB"));
    assert_eq!(AudioCodec::from_sdp(&sdp), AudioCodec::Alac);
}

#[test]
fn test_attribute_names_ignore_case() {
    let sdp = SdpParser::parse("v=0\r\nm=audio 0 RTP/AVP 96\r\na=AESIV:abcd\r\na=RsaAesKey:efgh\r\n")
        .unwrap();

    assert_eq!(sdp.aesiv(), Some("abcd"));
    assert_eq!(sdp.rsaaeskey(), Some("efgh"));
}

#[test]
fn test_unencrypted_announce_has_no_keys() {
    let sdp = SdpParser::parse(
        "v=0\r\nm=audio 0 RTP/AVP 96\r\na=rtpmap:96 L16/44100/2\r\n",
    )
    .unwrap();

    assert_eq!(sdp.rsaaeskey(), None);
    assert_eq!(sdp.aesiv(), None);
    assert_eq!(sdp.fmtp(), None);
    assert_eq!(AudioCodec::from_sdp(&sdp), AudioCodec::Pcm);
}

#[test]
fn test_session_level_attribute_fallback() {
    let sdp = SdpParser::parse("v=0\r\na=aesiv:xyz\r\nm=audio 0 RTP/AVP 96\r\n").unwrap();
    assert_eq!(sdp.aesiv(), Some("xyz"));
}

#[test]
fn test_bad_media_line() {
    assert!(matches!(
        SdpParser::parse("v=0\r\nm=audio\r\n"),
        Err(SdpParseError::InvalidMedia(_))
    ));
}

#[test]
fn test_alac_parameters() {
    let params = AlacParameters::parse("96 352 0 16 40 10 14 2 255 0 0 44100").unwrap();
    assert_eq!(params, AlacParameters::default());

    let params = AlacParameters::parse("4096 0 24 40 10 14 2 255 0 0 48000").unwrap();
    assert_eq!(params.frames_per_packet, 4096);
    assert_eq!(params.bit_depth, 24);
    assert_eq!(params.sample_rate, 48_000);

    assert!(AlacParameters::parse("96 352").is_err());
}
