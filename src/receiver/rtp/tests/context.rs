use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::protocol::rtp::{
    NtpTimestamp, ResendRequest, RtpHeader, SyncPacket, TimingReply, TimingRequest,
};
use crate::receiver::decoder::PcmDecoder;
use crate::receiver::events::RaopEvent;
use crate::receiver::rtp::{RtpConfig, RtpContext, RtpStream, StreamParams};

use super::Recorder;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
const RTP0: u32 = 500_000;

struct Sender {
    control: UdpSocket,
    timing: UdpSocket,
    audio: UdpSocket,
}

async fn start(recorder: &Arc<Recorder>) -> (RtpContext, Sender) {
    let sender = Sender {
        control: UdpSocket::bind((LOCALHOST, 0)).await.unwrap(),
        timing: UdpSocket::bind((LOCALHOST, 0)).await.unwrap(),
        audio: UdpSocket::bind((LOCALHOST, 0)).await.unwrap(),
    };
    let config = RtpConfig {
        bind_ip: LOCALHOST,
        sender_control: sender.control.local_addr().unwrap(),
        sender_timing: sender.timing.local_addr().unwrap(),
        timing_interval: Duration::from_secs(3),
    };
    let stream = RtpStream::new(StreamParams::default(), None, Box::new(PcmDecoder));
    let context = RtpContext::start(config, stream, recorder.clone())
        .await
        .unwrap();
    (context, sender)
}

async fn recv(socket: &UdpSocket) -> (Vec<u8>, std::net::SocketAddr) {
    let mut buf = vec![0u8; 2048];
    let (len, from) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
        .await
        .expect("no packet received")
        .unwrap();
    buf.truncate(len);
    (buf, from)
}

async fn wait_for(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached");
}

fn audio_packet(seq: u16, rtptime: u32, payload: &[u8]) -> Vec<u8> {
    let mut buf = RtpHeader::audio(seq, rtptime, 7).encode().to_vec();
    buf.extend_from_slice(payload);
    buf
}

#[tokio::test]
async fn test_binds_three_ports_and_requests_timing() {
    let recorder = Arc::new(Recorder::default());
    let (context, sender) = start(&recorder).await;

    let ports = context.ports();
    assert!(ports.is_valid());
    assert_ne!(ports.audio, ports.control);
    assert_ne!(ports.control, ports.timing);

    let (request, from) = recv(&sender.timing).await;
    assert!(TimingRequest::decode(&request).is_ok());
    assert_eq!(from.port(), ports.timing);

    context.shutdown().await;
}

#[tokio::test]
async fn test_audio_delivered_after_clock_exchange() {
    let recorder = Arc::new(Recorder::default());
    let (context, sender) = start(&recorder).await;
    let ports = context.ports();

    let (request, from) = recv(&sender.timing).await;
    let request = TimingRequest::decode(&request).unwrap();
    let reply = TimingReply {
        origin: NtpTimestamp(u64::from(request.local_ms)),
        receive: NtpTimestamp::now(),
        transmit: NtpTimestamp::now(),
    };
    sender.timing.send_to(&reply.encode(), from).await.unwrap();
    wait_for(|| recorder.events().contains(&RaopEvent::Timing)).await;

    let sync = SyncPacket {
        first: true,
        flags: 0,
        rtp_now_latency: RTP0 - 88_200,
        ntp_time: NtpTimestamp::now(),
        rtp_now: RTP0,
    };
    sender
        .control
        .send_to(&sync.encode(), (LOCALHOST, ports.control))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    sender
        .audio
        .send_to(&audio_packet(1, RTP0, &[0x12, 0x34, 0x56, 0x78]), (LOCALHOST, ports.audio))
        .await
        .unwrap();
    wait_for(|| !recorder.pcm().is_empty()).await;
    assert_eq!(recorder.pcm()[0].0, vec![0x34, 0x12, 0x78, 0x56]);
    assert!(
        recorder
            .events()
            .iter()
            .any(|e| matches!(e, RaopEvent::Play { .. }))
    );

    // a gap is reported to the sender's control port
    sender
        .audio
        .send_to(&audio_packet(3, RTP0 + 704, &[0; 4]), (LOCALHOST, ports.audio))
        .await
        .unwrap();
    let (resend, _) = recv(&sender.control).await;
    assert_eq!(
        ResendRequest::decode(&resend).unwrap(),
        ResendRequest { first: 2, count: 1 }
    );

    context.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_releases_ports() {
    let recorder = Arc::new(Recorder::default());
    let (context, _sender) = start(&recorder).await;
    let ports = context.ports();

    context.shutdown().await;

    for port in [ports.audio, ports.control, ports.timing] {
        assert!(UdpSocket::bind((LOCALHOST, port)).await.is_ok());
    }
}

#[tokio::test]
async fn test_flush_callback_runs_only_when_effective() {
    let recorder = Arc::new(Recorder::default());
    let (context, _sender) = start(&recorder).await;

    let mut calls = 0;
    assert!(context.flush_with(10, 0, || calls += 1));
    assert!(!context.flush_with(5, 0, || calls += 1));
    assert_eq!(calls, 1);

    context.shutdown().await;
}
