//! Mock RAOP sender for testing the receiver
//!
//! Plays the part of iTunes: drives the RTSP flow, answers the receiver's
//! timing requests and pushes sync and audio packets over UDP.

use std::net::SocketAddr;
use std::time::Duration;

use rand::RngCore;
use rsa::Oaep;
use sha1::Sha1;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};

use crate::protocol::crypto::{AirportKey, AudioCipher, CryptoError, base64_encode_unpadded};
use crate::protocol::rtp::{
    NtpTimestamp, RtpDecodeError, RtpHeader, SyncPacket, TimingReply, TimingRequest,
};
use crate::protocol::rtsp::headers::{names, raop};
use crate::protocol::rtsp::{Method, RtspRequest, RtspResponse};

const READ_TIMEOUT: Duration = Duration::from_secs(5);
const SSRC: u32 = 0x1234_5678;

/// Mock sender configuration
#[derive(Debug, Clone)]
pub struct MockSenderConfig {
    /// Receiver address to connect to
    pub receiver_addr: SocketAddr,
    /// Wrap a session key in ANNOUNCE and encrypt audio with it
    pub encrypted: bool,
    /// Frames per packet
    pub frames_per_packet: u32,
    /// `DACP-ID` and `Active-Remote` headers sent with ANNOUNCE
    pub remote: Option<(String, String)>,
}

impl MockSenderConfig {
    /// Clear-text L16 sender for `receiver_addr`
    #[must_use]
    pub fn new(receiver_addr: SocketAddr) -> Self {
        Self {
            receiver_addr,
            encrypted: false,
            frames_per_packet: 352,
            remote: None,
        }
    }
}

/// Ports returned in the SETUP response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerPorts {
    /// Audio data port
    pub audio: u16,
    /// Control port
    pub control: u16,
    /// Timing port
    pub timing: u16,
}

/// Mock RAOP sender
pub struct MockSender {
    config: MockSenderConfig,
    rtsp_stream: Option<TcpStream>,
    audio_socket: Option<UdpSocket>,
    control_socket: Option<UdpSocket>,
    timing_socket: Option<UdpSocket>,
    cipher: Option<AudioCipher>,
    cseq: u32,
    session_id: Option<String>,
    server_ports: Option<ServerPorts>,
    sequence: u16,
    timestamp: u32,
}

impl MockSender {
    /// Create a new mock sender
    #[must_use]
    pub fn new(config: MockSenderConfig) -> Self {
        Self {
            config,
            rtsp_stream: None,
            audio_socket: None,
            control_socket: None,
            timing_socket: None,
            cipher: None,
            cseq: 0,
            session_id: None,
            server_ports: None,
            sequence: 0,
            timestamp: 0,
        }
    }

    /// Ports from the last successful SETUP
    #[must_use]
    pub fn server_ports(&self) -> Option<ServerPorts> {
        self.server_ports
    }

    /// Sequence number of the next audio packet
    #[must_use]
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// RTP timestamp of the next audio packet
    #[must_use]
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Connect to receiver
    ///
    /// # Errors
    /// Returns `MockSenderError` if connection fails.
    pub async fn connect(&mut self) -> Result<(), MockSenderError> {
        let stream = TcpStream::connect(self.config.receiver_addr).await?;
        self.rtsp_stream = Some(stream);
        Ok(())
    }

    /// Perform OPTIONS, optionally with an `Apple-Challenge`
    ///
    /// # Errors
    /// Returns `MockSenderError` if request fails.
    pub async fn options(
        &mut self,
        challenge: Option<&str>,
    ) -> Result<RtspResponse, MockSenderError> {
        let mut request = RtspRequest::new(Method::Options, "*");
        if let Some(challenge) = challenge {
            request.headers.insert(raop::APPLE_CHALLENGE, challenge);
        }
        self.send(request).await
    }

    /// Perform ANNOUNCE with an L16 SDP
    ///
    /// With encryption enabled a fresh AES key is wrapped with the AirPort
    /// public key and sent as `rsaaeskey`, the way iTunes does.
    ///
    /// # Errors
    /// Returns `MockSenderError` if key wrapping or the request fails.
    pub async fn announce(&mut self) -> Result<RtspResponse, MockSenderError> {
        if self.config.encrypted {
            let mut iv = [0u8; 16];
            rand::thread_rng().fill_bytes(&mut iv);
            return self.announce_encrypted(&iv).await;
        }
        self.send_announce("").await
    }

    /// ANNOUNCE an encrypted stream using `iv` as the `aesiv`
    ///
    /// An IV that is not one AES block is sent as is; audio can then only
    /// be sent in the clear.
    ///
    /// # Errors
    /// Returns `MockSenderError` if key wrapping or the request fails.
    pub async fn announce_encrypted(&mut self, iv: &[u8]) -> Result<RtspResponse, MockSenderError> {
        let mut key = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut key);

        let wrapped = AirportKey::shared()?
            .public_key()
            .encrypt(&mut rand::thread_rng(), Oaep::new::<Sha1>(), &key)
            .map_err(|e| MockSenderError::Encryption(e.to_string()))?;
        let crypto_lines = format!(
            "a=rsaaeskey:{}\r\na=aesiv:{}\r\n",
            base64_encode_unpadded(&wrapped),
            base64_encode_unpadded(iv)
        );
        self.cipher = AudioCipher::new(&key, iv).ok();
        self.send_announce(&crypto_lines).await
    }

    async fn send_announce(&mut self, crypto_lines: &str) -> Result<RtspResponse, MockSenderError> {
        let ip = self.config.receiver_addr.ip();
        let sdp = format!(
            "v=0\r\n\
             o=iTunes 3413821438 0 IN IP4 {ip}\r\n\
             s=iTunes\r\n\
             c=IN IP4 {ip}\r\n\
             t=0 0\r\n\
             m=audio 0 RTP/AVP 96\r\n\
             a=rtpmap:96 L16/44100/2\r\n\
             a=fmtp:96 {}\r\n\
             {crypto_lines}",
            self.config.frames_per_packet,
        );

        let mut request = RtspRequest::new(Method::Announce, self.uri());
        request.headers.insert(names::CONTENT_TYPE, "application/sdp");
        if let Some((dacp_id, active_remote)) = &self.config.remote {
            request.headers.insert(raop::DACP_ID, dacp_id.as_str());
            request
                .headers
                .insert(raop::ACTIVE_REMOTE, active_remote.as_str());
        }
        request.body = sdp.into_bytes();
        self.send(request).await
    }

    /// Perform SETUP with freshly bound control and timing sockets
    ///
    /// # Errors
    /// Returns `MockSenderError` if request fails.
    pub async fn setup(&mut self) -> Result<RtspResponse, MockSenderError> {
        let ip = self.config.receiver_addr.ip();
        let audio_socket = UdpSocket::bind((ip, 0)).await?;
        let control_socket = UdpSocket::bind((ip, 0)).await?;
        let timing_socket = UdpSocket::bind((ip, 0)).await?;

        let transport = format!(
            "RTP/AVP/UDP;unicast;interleaved=0-1;mode=record;control_port={};timing_port={}",
            control_socket.local_addr()?.port(),
            timing_socket.local_addr()?.port(),
        );
        let response = self.setup_with_transport(&transport).await?;

        if response.is_success() {
            self.server_ports = response
                .headers
                .get(names::TRANSPORT)
                .and_then(parse_server_ports);
            if let Some(ports) = self.server_ports {
                audio_socket.connect(SocketAddr::new(ip, ports.audio)).await?;
            }
            self.audio_socket = Some(audio_socket);
            self.control_socket = Some(control_socket);
            self.timing_socket = Some(timing_socket);
        }
        Ok(response)
    }

    /// Perform SETUP with a caller supplied `Transport` header
    ///
    /// # Errors
    /// Returns `MockSenderError` if request fails.
    pub async fn setup_with_transport(
        &mut self,
        transport: &str,
    ) -> Result<RtspResponse, MockSenderError> {
        let mut request = RtspRequest::new(Method::Setup, self.uri());
        request.headers.insert(names::TRANSPORT, transport);
        let response = self.send(request).await?;
        if response.is_success() {
            self.session_id = response.headers.get(names::SESSION).map(ToString::to_string);
        }
        Ok(response)
    }

    /// Perform RECORD starting at the current sequence and timestamp
    ///
    /// # Errors
    /// Returns `MockSenderError` if request fails.
    pub async fn record(&mut self) -> Result<RtspResponse, MockSenderError> {
        let mut request = RtspRequest::new(Method::Record, self.uri());
        request.headers.insert("Range", "npt=0-");
        request.headers.insert(
            names::RTP_INFO,
            format!("seq={};rtptime={}", self.sequence, self.timestamp),
        );
        self.send(request).await
    }

    /// Perform FLUSH at the current sequence and timestamp
    ///
    /// # Errors
    /// Returns `MockSenderError` if request fails.
    pub async fn flush(&mut self) -> Result<RtspResponse, MockSenderError> {
        let mut request = RtspRequest::new(Method::Flush, self.uri());
        request.headers.insert(
            names::RTP_INFO,
            format!("seq={};rtptime={}", self.sequence, self.timestamp),
        );
        self.send(request).await
    }

    /// Set volume in dB
    ///
    /// # Errors
    /// Returns `MockSenderError` if request fails.
    pub async fn set_volume(&mut self, db: f32) -> Result<RtspResponse, MockSenderError> {
        let body = format!("volume: {db:.6}\r\n");
        self.set_parameter("text/parameters", body.as_bytes())
            .await
    }

    /// Send a SET_PARAMETER with an arbitrary body
    ///
    /// # Errors
    /// Returns `MockSenderError` if request fails.
    pub async fn set_parameter(
        &mut self,
        content_type: &str,
        body: &[u8],
    ) -> Result<RtspResponse, MockSenderError> {
        let mut request = RtspRequest::new(Method::SetParameter, self.uri());
        request.headers.insert(names::CONTENT_TYPE, content_type);
        request.body = body.to_vec();
        self.send(request).await
    }

    /// Perform TEARDOWN
    ///
    /// # Errors
    /// Returns `MockSenderError` if request fails.
    pub async fn teardown(&mut self) -> Result<RtspResponse, MockSenderError> {
        let request = RtspRequest::new(Method::Teardown, self.uri());
        self.send(request).await
    }

    /// Wait for one timing request and answer it with the current clock
    ///
    /// # Errors
    /// Returns `MockSenderError` if nothing arrives or the packet is bad.
    pub async fn answer_timing(&mut self) -> Result<(), MockSenderError> {
        let socket = self
            .timing_socket
            .as_ref()
            .ok_or(MockSenderError::NotSetup)?;

        let mut buf = [0u8; 64];
        let (len, from) = tokio::time::timeout(READ_TIMEOUT, socket.recv_from(&mut buf))
            .await
            .map_err(|_| MockSenderError::Timeout)??;
        let request = TimingRequest::decode(&buf[..len])?;

        let now = NtpTimestamp::now();
        let reply = TimingReply {
            origin: NtpTimestamp(u64::from(request.local_ms)),
            receive: now,
            transmit: now,
        };
        socket.send_to(&reply.encode(), from).await?;
        Ok(())
    }

    /// Send a sync packet placing the current timestamp `latency` frames out
    ///
    /// # Errors
    /// Returns `MockSenderError` if send fails.
    pub async fn send_sync(&mut self, first: bool, latency: u32) -> Result<(), MockSenderError> {
        let socket = self
            .control_socket
            .as_ref()
            .ok_or(MockSenderError::NotSetup)?;
        let ports = self.server_ports.ok_or(MockSenderError::NotSetup)?;

        let sync = SyncPacket {
            first,
            flags: 7,
            rtp_now_latency: self.timestamp.wrapping_sub(latency),
            ntp_time: NtpTimestamp::now(),
            rtp_now: self.timestamp,
        };
        let server_control = SocketAddr::new(self.config.receiver_addr.ip(), ports.control);
        socket.send_to(&sync.encode(), server_control).await?;
        Ok(())
    }

    /// Send one audio packet, encrypting it when a key was announced
    ///
    /// # Errors
    /// Returns `MockSenderError` if send fails.
    pub async fn send_audio(&mut self, audio_data: &[u8]) -> Result<(), MockSenderError> {
        let socket = self
            .audio_socket
            .as_ref()
            .ok_or(MockSenderError::NotSetup)?;

        let mut payload = audio_data.to_vec();
        if let Some(cipher) = &self.cipher {
            cipher.encrypt_in_place(&mut payload);
        }

        let mut packet = RtpHeader::audio(self.sequence, self.timestamp, SSRC)
            .encode()
            .to_vec();
        packet.extend_from_slice(&payload);
        socket.send(&packet).await?;

        self.sequence = self.sequence.wrapping_add(1);
        self.timestamp = self
            .timestamp
            .wrapping_add(self.config.frames_per_packet);
        Ok(())
    }

    /// Drop the control connection without TEARDOWN
    pub fn disconnect(&mut self) {
        self.rtsp_stream = None;
    }

    fn uri(&self) -> String {
        format!("rtsp://{}/3413821438", self.config.receiver_addr.ip())
    }

    async fn send(&mut self, mut request: RtspRequest) -> Result<RtspResponse, MockSenderError> {
        let stream = self
            .rtsp_stream
            .as_mut()
            .ok_or(MockSenderError::NotConnected)?;

        self.cseq += 1;
        request.headers.insert(names::CSEQ, self.cseq.to_string());
        if let Some(session) = &self.session_id {
            request.headers.insert(names::SESSION, session.as_str());
        }
        stream.write_all(&request.encode()).await?;

        read_response(stream).await
    }
}

/// Read until a complete response, headers and body, has arrived
async fn read_response(stream: &mut TcpStream) -> Result<RtspResponse, MockSenderError> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        if let Some(response) = RtspResponse::parse(&data) {
            let expected = response.headers.content_length().unwrap_or(0);
            if response.body.len() >= expected {
                return Ok(response);
            }
        }

        let n = tokio::time::timeout(READ_TIMEOUT, stream.read(&mut buf))
            .await
            .map_err(|_| MockSenderError::Timeout)??;
        if n == 0 {
            return Err(MockSenderError::ConnectionClosed);
        }
        data.extend_from_slice(&buf[..n]);
    }
}

fn parse_server_ports(transport: &str) -> Option<ServerPorts> {
    let port = |key: &str| {
        transport.split(';').find_map(|part| {
            let (name, value) = part.trim().split_once('=')?;
            (name == key).then(|| value.parse().ok()).flatten()
        })
    };
    Some(ServerPorts {
        audio: port("server_port")?,
        control: port("control_port")?,
        timing: port("timing_port")?,
    })
}

/// Mock sender errors
#[derive(Debug, thiserror::Error)]
pub enum MockSenderError {
    /// Socket failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No control connection
    #[error("Not connected")]
    NotConnected,

    /// No successful SETUP yet
    #[error("Not setup")]
    NotSetup,

    /// The receiver closed the control connection
    #[error("Connection closed")]
    ConnectionClosed,

    /// Nothing arrived in time
    #[error("Timed out")]
    Timeout,

    /// Session key could not be wrapped
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Key or cipher setup failed
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Bad packet from the receiver
    #[error("Invalid packet: {0}")]
    Packet(#[from] RtpDecodeError),
}
