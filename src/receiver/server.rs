//! RAOP receiver server
//!
//! A single task owns the RTSP listener and at most one control
//! connection. Accepting a new connection tears the previous session down
//! first. Requests are handled by the pure handlers in
//! [`rtsp_handler`](super::rtsp_handler); this module carries out the
//! resulting socket work and dispatches the callbacks.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::discovery::{RaopAdvertiser, get_device_mac};
use crate::error::RaopError;
use crate::protocol::dacp::{DacpResolver, MdnsResolver, RemoteCommand};
use crate::protocol::rtsp::headers::names;
use crate::protocol::rtsp::{
    ParseError, RtspRequest, RtspServerCodec, TransportHeader, encode_response,
};
use crate::protocol::sdp::AudioCodec;

use super::active_remote::{ActiveRemote, RemoteSlot};
use super::config::ReceiverConfig;
use super::events::{RaopCallbacks, RaopEvent};
use super::rtp::{RtpConfig, RtpContext, RtpStream, StreamParams};
use super::rtsp_handler::{HandleResult, SessionAction, handle_request};
use super::session::{Session, SessionError, SessionState};

/// Period at which the loop checks the abort flag
const ABORT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Read buffer for the control connection
const READ_BUFFER_SIZE: usize = 4096;

/// State shared between the handle and the server task
struct Shared {
    abort: AtomicBool,
    remote: RemoteSlot,
}

/// AirPlay 1 audio receiver
///
/// Dropping the handle stops the server task; [`RaopReceiver::shutdown`]
/// additionally waits for the active session to be torn down.
pub struct RaopReceiver {
    local_addr: SocketAddr,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    advertiser: Option<RaopAdvertiser>,
}

impl RaopReceiver {
    /// Bind the RTSP listener, advertise the service and start serving
    ///
    /// Remote control lookups use mDNS when `config.remote_discovery` is
    /// set.
    ///
    /// # Errors
    ///
    /// Returns `RaopError::Config` if the configuration does not validate,
    /// `RaopError::Io` if the listener cannot be bound and
    /// `RaopError::Advertiser` if the service cannot be registered.
    pub async fn start(
        config: ReceiverConfig,
        callbacks: Arc<dyn RaopCallbacks>,
    ) -> Result<Self, RaopError> {
        let resolver: Option<Arc<dyn DacpResolver>> = if config.remote_discovery {
            match MdnsResolver::new() {
                Ok(resolver) => Some(Arc::new(resolver)),
                Err(e) => {
                    tracing::warn!(error = %e, "remote control lookup unavailable");
                    None
                }
            }
        } else {
            None
        };
        Self::spawn(config, callbacks, resolver).await
    }

    /// Like [`start`](Self::start) with a custom remote control resolver
    ///
    /// # Errors
    ///
    /// See [`start`](Self::start).
    pub async fn start_with_resolver(
        config: ReceiverConfig,
        callbacks: Arc<dyn RaopCallbacks>,
        resolver: Arc<dyn DacpResolver>,
    ) -> Result<Self, RaopError> {
        Self::spawn(config, callbacks, Some(resolver)).await
    }

    async fn spawn(
        config: ReceiverConfig,
        callbacks: Arc<dyn RaopCallbacks>,
        resolver: Option<Arc<dyn DacpResolver>>,
    ) -> Result<Self, RaopError> {
        config.validate()?;
        let listener = TcpListener::bind((config.bind_address, config.port)).await?;
        let local_addr = listener.local_addr()?;
        let mac = config.mac.unwrap_or_else(get_device_mac);
        let resolver = resolver.filter(|_| config.remote_discovery);

        let advertiser = if config.advertise {
            let mut advertiser =
                RaopAdvertiser::new(&config.name, local_addr.port(), mac, config.sample_rate)?;
            advertiser.register()?;
            Some(advertiser)
        } else {
            None
        };

        tracing::info!(
            name = %config.name,
            addr = %local_addr,
            advertised = advertiser.is_some(),
            "RAOP receiver listening"
        );

        let shared = Arc::new(Shared {
            abort: AtomicBool::new(false),
            remote: Arc::new(RwLock::new(None)),
        });
        let cancel = CancellationToken::new();
        let server = Server {
            listener,
            config,
            mac,
            callbacks,
            resolver,
            shared: shared.clone(),
        };
        let task = tokio::spawn(server.run(cancel.clone()));

        Ok(Self {
            local_addr,
            shared,
            cancel,
            task: Some(task),
            advertiser,
        })
    }

    /// Address the RTSP listener is bound to
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Drop the current session; the server keeps listening
    ///
    /// Observed within 100ms.
    pub fn abort(&self) {
        self.shared.abort.store(true, Ordering::SeqCst);
    }

    /// Send a remote control command to the sender
    ///
    /// Returns `false` when no remote is known yet or the remote refused.
    pub async fn command(&self, command: RemoteCommand) -> bool {
        let Some(target) = self.shared.remote.read().await.clone() else {
            tracing::debug!(?command, "no active remote");
            return false;
        };
        match target.send(command).await {
            Ok(()) => {
                tracing::info!(?command, remote = %target.addr, "remote command sent");
                true
            }
            Err(e) => {
                tracing::warn!(?command, error = %e, "remote command failed");
                false
            }
        }
    }

    /// Ask the sender to stop, or drop the session when it cannot be asked
    pub async fn disconnect(&self) {
        if !self.command(RemoteCommand::Stop).await {
            self.abort();
        }
    }

    /// Stop serving, tear down the session and withdraw the service
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "receiver task failed");
            }
        }
        if let Some(mut advertiser) = self.advertiser.take() {
            if let Err(e) = advertiser.unregister() {
                tracing::warn!(error = %e, "failed to unregister service");
            }
        }
        tracing::info!(addr = %self.local_addr, "RAOP receiver stopped");
    }
}

impl Drop for RaopReceiver {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for RaopReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaopReceiver")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

/// An accepted control connection and its session
struct Connection {
    stream: TcpStream,
    codec: RtspServerCodec,
    session: Session,
}

struct Server {
    listener: TcpListener,
    config: ReceiverConfig,
    mac: [u8; 6],
    callbacks: Arc<dyn RaopCallbacks>,
    resolver: Option<Arc<dyn DacpResolver>>,
    shared: Arc<Shared>,
}

impl Server {
    async fn run(self, cancel: CancellationToken) {
        let mut connection: Option<Connection> = None;
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let mut poll = tokio::time::interval(ABORT_POLL_INTERVAL);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        if let Some(previous) = connection.take() {
                            tracing::info!(
                                previous = %previous.session.peer(),
                                %peer,
                                "new connection replaces active session"
                            );
                            self.close(previous).await;
                        }
                        connection = self.open(stream, peer);
                    }
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                },
                read = read_some(&mut connection, &mut buf) => {
                    let Some(mut conn) = connection.take() else { continue };
                    let keep = match read {
                        Ok(0) => {
                            tracing::info!(peer = %conn.session.peer(), "RTSP connection closed by peer");
                            false
                        }
                        Ok(n) => {
                            conn.codec.feed(&buf[..n]);
                            self.serve(&mut conn).await
                        }
                        Err(e) => {
                            tracing::warn!(peer = %conn.session.peer(), error = %e, "RTSP read failed");
                            false
                        }
                    };
                    if keep {
                        connection = Some(conn);
                    } else {
                        self.close(conn).await;
                    }
                }
                _ = poll.tick() => {
                    if self.shared.abort.swap(false, Ordering::SeqCst) {
                        if let Some(conn) = connection.take() {
                            tracing::info!(peer = %conn.session.peer(), "session aborted");
                            self.close(conn).await;
                        }
                    }
                }
            }
        }

        if let Some(conn) = connection.take() {
            self.close(conn).await;
        }
        tracing::debug!("RTSP loop stopped");
    }

    fn open(&self, stream: TcpStream, peer: SocketAddr) -> Option<Connection> {
        let local = match stream.local_addr() {
            Ok(local) => local,
            Err(e) => {
                tracing::warn!(%peer, error = %e, "dropping connection without local address");
                return None;
            }
        };
        tracing::info!(%peer, %local, "got RTSP connection");
        self.shared.abort.store(false, Ordering::SeqCst);

        Some(Connection {
            stream,
            codec: RtspServerCodec::new(),
            session: Session::new(peer, local, self.mac),
        })
    }

    /// Tear the session down; a running stream also releases the output
    async fn close(&self, mut conn: Connection) {
        if conn.session.close().await {
            self.callbacks.command(RaopEvent::Stop);
        }
        let _ = conn.stream.shutdown().await;
    }

    /// Handle every complete request in the buffer; `false` ends the
    /// connection
    async fn serve(&self, conn: &mut Connection) -> bool {
        loop {
            let request = match conn.codec.decode() {
                Ok(Some(request)) => request,
                Ok(None) => return true,
                Err(e) => return self.reject(conn, &e).await,
            };

            let result = self.process(&mut conn.session, &request).await;
            let keep = !result.close;
            if !result.response.is_success() {
                tracing::info!(peer = %conn.session.peer(), method = %request.method, "responding 503");
            }
            let bytes = encode_response(&result.response);
            if let Err(e) = conn.stream.write_all(&bytes).await {
                tracing::warn!(peer = %conn.session.peer(), error = %e, "RTSP write failed");
                return false;
            }
            if !keep {
                return false;
            }
        }
    }

    async fn reject(&self, conn: &mut Connection, error: &ParseError) -> bool {
        tracing::warn!(peer = %conn.session.peer(), %error, "malformed RTSP request");
        let response = HandleResult::error(error.cseq()).response;
        let _ = conn.stream.write_all(&encode_response(&response)).await;
        false
    }

    async fn process(&self, session: &mut Session, request: &RtspRequest) -> HandleResult {
        let mut result = handle_request(request, session, &self.config);

        if let Some(action) = result.action.take() {
            if let Err(e) = self.apply(session, action, &mut result).await {
                tracing::warn!(peer = %session.peer(), method = %request.method, error = %e, "request failed");
                return HandleResult::error(request.cseq());
            }
        }

        if let Some(state) = result.new_state {
            if let Err(e) = session.transition(state) {
                tracing::warn!(error = %e, "state not applied");
            }
        }

        for event in result.events.drain(..) {
            self.callbacks.command(event);
        }
        result
    }

    async fn apply(
        &self,
        session: &mut Session,
        action: SessionAction,
        result: &mut HandleResult,
    ) -> Result<(), SessionError> {
        match action {
            SessionAction::Announce(announcement) => {
                session.set_stream(announcement.stream);
                session.stop_remote().await;
                if let (Some(identity), Some(resolver)) = (announcement.remote, &self.resolver) {
                    session.attach_remote(ActiveRemote::spawn(
                        resolver.clone(),
                        identity,
                        Duration::from_millis(self.config.remote_query_timeout_ms),
                        self.shared.remote.clone(),
                    ));
                }
            }
            SessionAction::Setup {
                control_port,
                timing_port,
            } => self.setup(session, control_port, timing_port, result).await?,
            SessionAction::Record { start } => {
                let rtp = session.rtp().ok_or(SessionError::NoStream)?;
                match start {
                    Some((seq, rtptime)) => rtp.record(Some(seq), rtptime),
                    None => rtp.record(None, 0),
                }
            }
            SessionAction::Flush { seq, rtptime } => {
                let rtp = session.rtp().ok_or(SessionError::NoStream)?;
                let callbacks = &self.callbacks;
                let flushed = rtp.flush_with(seq, rtptime, || {
                    callbacks.command(RaopEvent::Flush);
                });
                tracing::info!(seq, rtptime, flushed, "FLUSH");
                if flushed {
                    result.new_state = Some(SessionState::Flushed);
                }
            }
            SessionAction::Teardown => {
                session.teardown().await;
            }
        }
        Ok(())
    }

    async fn setup(
        &self,
        session: &mut Session,
        control_port: u16,
        timing_port: u16,
        result: &mut HandleResult,
    ) -> Result<(), SessionError> {
        if !self.callbacks.command(RaopEvent::Setup) {
            tracing::info!(peer = %session.peer(), "output refused the stream");
            return Err(SessionError::Refused);
        }
        let rtp = match self.open_stream(session, control_port, timing_port).await {
            Ok(rtp) => rtp,
            Err(e) => {
                // the output was claimed above
                self.callbacks.command(RaopEvent::Stop);
                return Err(e);
            }
        };
        let ports = rtp.ports();

        tracing::info!(
            peer = %session.peer(),
            audio = ports.audio,
            control = ports.control,
            timing = ports.timing,
            "SETUP complete"
        );
        result.response.headers.insert(
            names::TRANSPORT,
            TransportHeader::to_response_header(ports.control, ports.timing, ports.audio),
        );
        session.attach_rtp(rtp);
        Ok(())
    }

    /// Bind the RTP sockets for the announced stream
    async fn open_stream(
        &self,
        session: &mut Session,
        control_port: u16,
        timing_port: u16,
    ) -> Result<RtpContext, SessionError> {
        if session.stop_rtp().await {
            tracing::debug!("replacing previous RTP context");
        }

        let cipher = session.stream().cipher()?;
        let codec = session.stream().codec.unwrap_or(AudioCodec::Alac);
        let decoder = self
            .callbacks
            .decoder(codec, self.config.frames_per_packet);
        let stream = RtpStream::new(
            StreamParams {
                sample_rate: self.config.sample_rate,
                frames_per_packet: self.config.frames_per_packet,
            },
            cipher,
            decoder,
        );

        let peer_ip = session.peer().ip();
        let config = RtpConfig {
            bind_ip: session.local_ip(),
            sender_control: SocketAddr::new(peer_ip, control_port),
            sender_timing: SocketAddr::new(peer_ip, timing_port),
            timing_interval: Duration::from_millis(self.config.timing_interval_ms),
        };
        let rtp = RtpContext::start(config, stream, self.callbacks.clone()).await?;
        if !rtp.ports().is_valid() {
            rtp.shutdown().await;
            return Err(SessionError::NoStream);
        }
        Ok(rtp)
    }
}

/// Read from the active connection; pending forever without one
async fn read_some(connection: &mut Option<Connection>, buf: &mut [u8]) -> std::io::Result<usize> {
    match connection {
        Some(conn) => conn.stream.read(buf).await,
        None => std::future::pending().await,
    }
}
