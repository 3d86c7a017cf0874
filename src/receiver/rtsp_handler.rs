//! RTSP request handlers for the receiver
//!
//! Handlers are pure functions that take a request and the session,
//! returning a response plus the work the server has to carry out: socket
//! setup, stream control and callback events. No I/O is performed.

use crate::protocol::crypto::{AirportKey, CryptoError, apple_response};
use crate::protocol::rtsp::headers::{names, raop};
use crate::protocol::rtsp::{Method, ResponseBuilder, RtspRequest, RtspResponse, TransportHeader};

use super::announce_handler::{Announcement, process_announce};
use super::config::ReceiverConfig;
use super::events::RaopEvent;
use super::session::{Session, SessionError, SessionState};
use super::set_parameter_handler::process_set_parameter;

/// Methods listed in the OPTIONS response
pub const PUBLIC_METHODS: &str =
    "ANNOUNCE, SETUP, RECORD, PAUSE, FLUSH, TEARDOWN, OPTIONS, GET_PARAMETER, SET_PARAMETER";

/// Session id handed out by SETUP
pub const SESSION_ID: &str = "DEADBEEF";

/// Result of handling an RTSP request
#[derive(Debug)]
pub struct HandleResult {
    /// Response to send back
    pub response: RtspResponse,
    /// New session state (if changed)
    pub new_state: Option<SessionState>,
    /// Session work the server carries out before responding
    pub action: Option<SessionAction>,
    /// Events for the callbacks, dispatched after the action
    pub events: Vec<RaopEvent>,
    /// Close the connection after responding
    pub close: bool,
}

impl HandleResult {
    fn ok(response: RtspResponse) -> Self {
        Self {
            response,
            new_state: None,
            action: None,
            events: Vec::new(),
            close: false,
        }
    }

    /// 503 for `cseq`, closing the connection
    #[must_use]
    pub fn error(cseq: Option<u32>) -> Self {
        Self {
            response: ResponseBuilder::error().maybe_cseq(cseq).build(),
            new_state: None,
            action: None,
            events: Vec::new(),
            close: true,
        }
    }

    fn with_state(mut self, state: SessionState) -> Self {
        self.new_state = Some(state);
        self
    }

    fn with_action(mut self, action: SessionAction) -> Self {
        self.action = Some(action);
        self
    }

    fn with_event(mut self, event: RaopEvent) -> Self {
        self.events.push(event);
        self
    }
}

/// Session work requested by a handler
#[derive(Debug)]
pub enum SessionAction {
    /// Store the announced stream and start the remote lookup
    Announce(Announcement),
    /// Ask the output for the stream, bind the RTP sockets and report them
    Setup {
        /// Sender control port, for resend requests
        control_port: u16,
        /// Sender timing port
        timing_port: u16,
    },
    /// Arm the RTP stream at the `RTP-Info` position, if one was sent
    Record {
        /// First sequence number and its RTP timestamp
        start: Option<(u16, u32)>,
    },
    /// Discard buffered audio before `seq`
    Flush {
        /// First sequence number to keep
        seq: u16,
        /// RTP timestamp of `seq`
        rtptime: u32,
    },
    /// Stop the RTP context and the remote lookup
    Teardown,
}

/// Handle an incoming RTSP request
#[must_use]
pub fn handle_request(
    request: &RtspRequest,
    session: &Session,
    config: &ReceiverConfig,
) -> HandleResult {
    let cseq = request.cseq();
    tracing::debug!(peer = %session.peer(), method = %request.method, ?cseq, "RTSP request");

    let mut result = match request.method {
        Method::Options => handle_options(cseq),
        Method::Announce => handle_announce(request, cseq, session),
        Method::Setup => handle_setup(request, cseq, session),
        Method::Record => handle_record(request, cseq, session, config),
        Method::Pause => HandleResult::ok(ok(cseq)).with_event(RaopEvent::Pause),
        Method::Flush => handle_flush(request, cseq, session),
        Method::Teardown => handle_teardown(cseq, session),
        Method::GetParameter => HandleResult::ok(ok(cseq)),
        Method::SetParameter => handle_set_parameter(request, cseq),
        Method::Play | Method::Post => {
            tracing::warn!(method = %request.method, "unsupported method");
            HandleResult::error(cseq)
        }
    };

    if result.response.is_success() {
        if let Some(challenge) = request.headers.get(raop::APPLE_CHALLENGE) {
            match challenge_response(challenge, session) {
                Ok(value) => result.response.headers.insert(raop::APPLE_RESPONSE, value),
                Err(e) => tracing::warn!(error = %e, "cannot answer Apple-Challenge"),
            }
        }
    }

    result
}

fn ok(cseq: Option<u32>) -> RtspResponse {
    ResponseBuilder::ok().maybe_cseq(cseq).build()
}

fn challenge_response(challenge: &str, session: &Session) -> Result<String, CryptoError> {
    let key = AirportKey::shared()?;
    apple_response(key, challenge, session.local_ip(), session.mac())
}

/// Reject requests the session flow does not allow
fn check_transition(session: &Session, to: SessionState, cseq: Option<u32>) -> Option<HandleResult> {
    if session.state().can_transition_to(to) {
        return None;
    }
    let error = SessionError::InvalidTransition {
        from: session.state(),
        to,
    };
    tracing::warn!(peer = %session.peer(), %error, "request out of order");
    Some(HandleResult::error(cseq))
}

fn handle_options(cseq: Option<u32>) -> HandleResult {
    let response = ResponseBuilder::ok()
        .maybe_cseq(cseq)
        .header(names::PUBLIC, PUBLIC_METHODS)
        .build();
    HandleResult::ok(response)
}

fn handle_announce(request: &RtspRequest, cseq: Option<u32>, session: &Session) -> HandleResult {
    if let Some(rejected) = check_transition(session, SessionState::Announced, cseq) {
        return rejected;
    }

    match process_announce(request) {
        Ok(announcement) => HandleResult::ok(ok(cseq))
            .with_state(SessionState::Announced)
            .with_action(SessionAction::Announce(announcement)),
        Err(e) => {
            tracing::warn!(error = %e, "rejecting ANNOUNCE");
            HandleResult::error(cseq)
        }
    }
}

fn handle_setup(request: &RtspRequest, cseq: Option<u32>, session: &Session) -> HandleResult {
    if let Some(rejected) = check_transition(session, SessionState::Setup, cseq) {
        return rejected;
    }

    let Some(transport) = request.headers.get(names::TRANSPORT) else {
        tracing::warn!("SETUP without Transport");
        return HandleResult::error(cseq);
    };
    let ports = match TransportHeader::parse(transport) {
        Ok(header) => header.sender_ports(),
        Err(e) => {
            tracing::warn!(error = %e, transport, "invalid Transport");
            return HandleResult::error(cseq);
        }
    };
    let Some((control_port, timing_port)) = ports else {
        tracing::info!(transport, "cannot start session, missing ports");
        return HandleResult::error(cseq);
    };

    // Transport is added once the sockets are bound
    let response = ResponseBuilder::ok()
        .maybe_cseq(cseq)
        .session(SESSION_ID)
        .build();
    HandleResult::ok(response)
        .with_state(SessionState::Setup)
        .with_action(SessionAction::Setup {
            control_port,
            timing_port,
        })
}

fn handle_record(
    request: &RtspRequest,
    cseq: Option<u32>,
    session: &Session,
    config: &ReceiverConfig,
) -> HandleResult {
    if let Some(rejected) = check_transition(session, SessionState::Recording, cseq) {
        return rejected;
    }
    if session.rtp().is_none() {
        tracing::warn!(error = %SessionError::NoStream, "rejecting RECORD");
        return HandleResult::error(cseq);
    }

    let latency = config.effective_latency();
    let mut response = ResponseBuilder::ok().maybe_cseq(cseq);
    if latency > 0 {
        response = response.audio_latency(latency);
    }

    let start = request
        .headers
        .contains(names::RTP_INFO)
        .then(|| request.rtp_info());

    HandleResult::ok(response.build())
        .with_state(SessionState::Recording)
        .with_action(SessionAction::Record { start })
        .with_event(RaopEvent::Stream)
}

fn handle_flush(request: &RtspRequest, cseq: Option<u32>, session: &Session) -> HandleResult {
    let result = HandleResult::ok(ok(cseq));
    if session.rtp().is_none() {
        tracing::debug!("FLUSH without stream");
        return result;
    }

    let (seq, rtptime) = request.rtp_info();
    result.with_action(SessionAction::Flush { seq, rtptime })
}

fn handle_teardown(cseq: Option<u32>, session: &Session) -> HandleResult {
    if let Some(rejected) = check_transition(session, SessionState::Teardown, cseq) {
        return rejected;
    }

    HandleResult::ok(ok(cseq))
        .with_state(SessionState::Teardown)
        .with_action(SessionAction::Teardown)
        .with_event(RaopEvent::Stop)
}

fn handle_set_parameter(request: &RtspRequest, cseq: Option<u32>) -> HandleResult {
    let result = HandleResult::ok(ok(cseq));
    match process_set_parameter(request) {
        Some(update) => result.with_event(update.into_event()),
        None => result,
    }
}
