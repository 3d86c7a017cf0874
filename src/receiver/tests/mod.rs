use std::net::SocketAddr;

use crate::protocol::rtsp::{Method, RtspRequest};

mod config;

const PEER: &str = "192.168.1.20:51000";
const LOCAL: &str = "192.168.1.10:5000";
const MAC: [u8; 6] = [0x00, 0x51, 0x52, 0x53, 0x54, 0x55];

fn session() -> crate::receiver::Session {
    let peer: SocketAddr = PEER.parse().unwrap();
    let local: SocketAddr = LOCAL.parse().unwrap();
    crate::receiver::Session::new(peer, local, MAC)
}

fn request(method: Method, cseq: u32) -> RtspRequest {
    let mut request = RtspRequest::new(method, "rtsp://192.168.1.10/3413821438");
    request.headers.insert("CSeq", cseq.to_string());
    request
}

fn with_body(mut request: RtspRequest, content_type: &str, body: &[u8]) -> RtspRequest {
    request.headers.insert("Content-Type", content_type);
    request.body = body.to_vec();
    request
}
