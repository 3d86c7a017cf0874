use crate::protocol::rtsp::server_codec::{ParseError, ResponseBuilder, RtspServerCodec};
use crate::protocol::rtsp::{Method, RtspResponse, StatusCode, encode_response};

#[test]
fn test_parse_options_request() {
    let mut codec = RtspServerCodec::new();
    codec.feed(b"OPTIONS * RTSP/1.0\r\nCSeq: 1\r\n\r\n");

    let request = codec.decode().unwrap().unwrap();
    assert_eq!(request.method, Method::Options);
    assert_eq!(request.uri, "*");
    assert_eq!(request.headers.cseq(), Some(1));
}

#[test]
fn test_parse_announce_with_sdp() {
    let sdp = "v=0\r\no=iTunes 0 0 IN IP4 192.168.1.100\r\ns=iTunes\r\n";
    let request_str = format!(
        "ANNOUNCE rtsp://192.168.1.1/1234 RTSP/1.0\r\n\
         CSeq: 2\r\n\
         Content-Type: application/sdp\r\n\
         Content-Length: {}\r\n\
         \r\n\
         {}",
        sdp.len(),
        sdp
    );

    let mut codec = RtspServerCodec::new();
    codec.feed(request_str.as_bytes());

    let request = codec.decode().unwrap().unwrap();
    assert_eq!(request.method, Method::Announce);
    assert_eq!(request.headers.content_type(), Some("application/sdp"));
    assert_eq!(request.body_text(), sdp);
}

#[test]
fn test_parse_incomplete_request() {
    let mut codec = RtspServerCodec::new();
    codec.feed(b"OPTIONS * RTSP/1.0\r\n");
    assert!(codec.decode().unwrap().is_none());

    codec.feed(b"CSeq: 1\r\n\r\n");
    let request = codec.decode().unwrap().unwrap();
    assert_eq!(request.method, Method::Options);
}

#[test]
fn test_body_split_across_reads() {
    let mut codec = RtspServerCodec::new();
    codec.feed(b"SET_PARAMETER * RTSP/1.0\r\nCSeq: 7\r\nContent-Length: 20\r\n\r\nvolume: ");
    assert!(codec.decode().unwrap().is_none());

    codec.feed(b"-15.000000\r\n");
    let request = codec.decode().unwrap().unwrap();
    assert_eq!(request.body_text(), "volume: -15.000000\r\n");
    assert_eq!(codec.buffer_len(), 0);
}

#[test]
fn test_pipelined_requests() {
    let mut codec = RtspServerCodec::new();
    codec.feed(b"OPTIONS * RTSP/1.0\r\nCSeq: 1\r\n\r\nGET_PARAMETER * RTSP/1.0\r\nCSeq: 2\r\n\r\n");

    assert_eq!(codec.decode().unwrap().unwrap().method, Method::Options);
    assert_eq!(codec.decode().unwrap().unwrap().method, Method::GetParameter);
    assert!(codec.decode().unwrap().is_none());
}

#[test]
fn test_unknown_method_keeps_cseq() {
    let mut codec = RtspServerCodec::new();
    codec.feed(b"DESCRIBE * RTSP/1.0\r\nCSeq: 9\r\n\r\n");

    let err = codec.decode().unwrap_err();
    assert!(matches!(err, ParseError::InvalidMethod { ref method, .. } if method == "DESCRIBE"));
    assert_eq!(err.cseq(), Some(9));
}

#[test]
fn test_rejects_non_rtsp_protocol() {
    let mut codec = RtspServerCodec::new();
    codec.feed(b"OPTIONS * HTTP/1.1\r\nCSeq: 1\r\n\r\n");
    assert!(matches!(
        codec.decode(),
        Err(ParseError::InvalidRequestLine(_))
    ));
}

#[test]
fn test_rejects_bad_content_length() {
    let mut codec = RtspServerCodec::new();
    codec.feed(b"ANNOUNCE * RTSP/1.0\r\nCSeq: 1\r\nContent-Length: lots\r\n\r\n");
    assert!(matches!(
        codec.decode(),
        Err(ParseError::InvalidContentLength(_))
    ));
}

#[test]
fn test_ok_response_literal_status_line() {
    let bytes = encode_response(&ResponseBuilder::ok().cseq(3).build());
    let text = String::from_utf8(bytes).unwrap();

    assert!(text.starts_with("RTSP/1.0 200 OK\r\n"));
    assert!(text.contains("CSeq: 3\r\n"));
    assert!(text.contains("Audio-Jack-Status: connected; type=analog\r\n"));
    assert!(text.ends_with("\r\n\r\n"));
}

#[test]
fn test_error_response_literal_status_line() {
    let response = ResponseBuilder::error().cseq(4).build();
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);

    let text = String::from_utf8(encode_response(&response)).unwrap();
    assert!(text.starts_with("RTSP/1.0 503 ERROR\r\n"));
    assert!(text.contains("CSeq: 4\r\n"));
}

#[test]
fn test_response_parse_round_trip() {
    let response = ResponseBuilder::ok()
        .cseq(12)
        .session("DEADBEEF")
        .audio_latency(11025)
        .build();
    let bytes = encode_response(&response);

    let parsed = RtspResponse::parse(&bytes).unwrap();
    assert!(parsed.is_success());
    assert_eq!(parsed.reason, "OK");
    assert_eq!(parsed.cseq(), Some(12));
    assert_eq!(parsed.headers.get("session"), Some("DEADBEEF"));
    assert_eq!(parsed.headers.get("Audio-Latency"), Some("11025"));
}
