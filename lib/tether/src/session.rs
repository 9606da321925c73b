use crate::channel::Channel;
use crate::clock::Clock;
use crate::payload::Payload;
use crate::rtt::RttCalculator;
use crate::sampling::SampleStats;
use crate::shared::{shared_statistic, ChannelMode, ConnectResult, ErrorUtils, NetworkResult, SharedStatistic};
use crate::signal::Signal;
use crate::transport::{PeerConnection, SignalingTransport};
use crate::wire::SystemFrame;
use indexmap::IndexMap;
use lumen::logging::{self, Logger};

pub const SYSTEM_CHANNEL_LABEL: &str = "system";
pub const DEFAULT_PING_INTERVAL_MS: u64 = 100;

const CLIENT_CHANNEL_PREFIX: &str = "client-channel-";
const SERVER_CHANNEL_PREFIX: &str = "server-channel-";

const NANOS_PER_SEC: u64 = 1_000_000_000;
const NANOS_PER_MILLI: u64 = 1_000_000;

/// Scratch buffer size for system frames; a packed ping/pong never exceeds a
/// header plus two packed integers.
const SYSTEM_SCRATCH_BYTES: usize = 32;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SessionState {
    /// Waiting for the signaling transport to open.
    Init,
    /// Authentication frame sent, waiting for the verdict.
    Signaling,
    /// Exchanging descriptions and candidates while channels open.
    Negotiating,
    /// All channels open; waiting for the peer to declare readiness.
    ReadyWait,
    Connected,
    Closed,
}

/// Which channel a peer-connection event addresses, resolved from the
/// data channel label.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum ChannelRoute {
    Outgoing(usize),
    Incoming(usize),
    System,
}

/// One connection attempt against a single server endpoint.
///
/// The session is a single-threaded state machine: the embedder owns the
/// concrete signaling transport and peer connection and injects their
/// completions through the `handle_*` methods, all carrying the current
/// monotonic time in nanoseconds. `sync` drives the connect timeout and the
/// system-channel ping cadence and should be called at least once per ping
/// interval.
pub struct Session<S: SignalingTransport, P: PeerConnection> {
    state: SessionState,
    id: Option<u64>,
    signaling: S,
    peer: P,
    channels: Vec<Channel<P::Channel>>,
    system: Option<Channel<P::Channel>>,
    route: IndexMap<String, ChannelRoute>,
    token_b64: String,
    connect_deadline: Option<u64>,
    ping_interval: u64,
    ping_armed: bool,
    next_ping: u64,
    all_channels_opened: bool,
    ready_signal_received: bool,
    connected: bool,
    result_emitted: bool,
    rtt: RttCalculator,
    clock: Clock,
    scratch: Payload,
    statistic: SharedStatistic,
    pub on_connect_result: Signal<ConnectResult>,
    pub on_closed: Signal<()>,
    pub on_received: Signal<(usize, Vec<u8>)>,
    log: Logger,
}

impl<S: SignalingTransport, P: PeerConnection> Session<S, P> {
    /// Create a session and its outgoing data channels. `timeout_secs` comes
    /// from the connect token; a non-positive value disables the connect
    /// timeout entirely.
    pub fn new<'a, L: Into<Option<&'a Logger>>>(
        signaling: S,
        mut peer: P,
        modes: &[ChannelMode],
        token_b64: String,
        timeout_secs: i32,
        ping_interval_ms: u64,
        statistic: SharedStatistic,
        now: u64,
        log: L,
    ) -> NetworkResult<Session<S, P>> {
        let session_log = match log.into() {
            Some(log) => log.new(logging::o!()),
            _ => logging::discard(),
        };

        let mut channels = Vec::with_capacity(modes.len());
        let mut route = IndexMap::new();

        for (index, mode) in modes.iter().enumerate() {
            let label = format!("{}{}", CLIENT_CHANNEL_PREFIX, index);
            let outgoing = peer.create_channel(&label, &mode.options())?;

            channels.push(Channel::new(
                index,
                *mode,
                outgoing,
                statistic.clone(),
                &session_log,
            ));
            route.insert(label, ChannelRoute::Outgoing(index));
        }

        let connect_deadline = if timeout_secs > 0 {
            Some(now + timeout_secs as u64 * NANOS_PER_SEC)
        } else {
            logging::warn!(session_log, "connect timeout disabled";
                           "context" => "new",
                           "timeout_secs" => timeout_secs);
            None
        };

        Ok(Session {
            state: SessionState::Init,
            id: None,
            signaling,
            peer,
            channels,
            system: None,
            route,
            token_b64,
            connect_deadline,
            ping_interval: ping_interval_ms * NANOS_PER_MILLI,
            ping_armed: false,
            next_ping: 0,
            all_channels_opened: false,
            ready_signal_received: false,
            connected: false,
            result_emitted: false,
            rtt: RttCalculator::new(),
            clock: Clock::new(),
            scratch: Payload::new(SYSTEM_SCRATCH_BYTES),
            statistic,
            on_connect_result: Signal::new(),
            on_closed: Signal::new(),
            on_received: Signal::new(),
            log: session_log,
        })
    }

    #[inline]
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state != SessionState::Closed
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connected && self.state == SessionState::Connected
    }

    /// Windowed round-trip statistics in nanoseconds.
    #[inline]
    pub fn rtt(&self) -> SampleStats {
        SampleStats {
            mean: self.rtt.mean(),
            variance: self.rtt.variance(),
        }
    }

    /// Estimated peer-clock offset (peer time minus local time).
    #[inline]
    pub fn clock_offset(&self) -> i64 {
        self.clock.offset()
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn channel_mode(&self, index: usize) -> Option<ChannelMode> {
        self.channels.get(index).map(|channel| channel.mode())
    }

    #[inline]
    pub fn channels(&self) -> &[Channel<P::Channel>] {
        &self.channels
    }

    /// True while the connect timeout is armed.
    #[inline]
    pub fn has_connect_deadline(&self) -> bool {
        self.connect_deadline.is_some()
    }

    /// True once the periodic ping loop is running.
    #[inline]
    pub fn is_pinging(&self) -> bool {
        self.ping_armed
    }

    /// Send a user payload on the given channel. Returns false once the
    /// session or channel is closed, or the index is out of range.
    pub fn send(&mut self, channel: usize, data: &[u8]) -> bool {
        if self.state == SessionState::Closed {
            return false;
        }

        match self.channels.get_mut(channel) {
            Some(channel) => channel.send(data),
            None => false,
        }
    }

    /// The signaling transport finished opening; starts the handshake.
    pub fn handle_signaling_open(&mut self, _now: u64) {
        if self.state != SessionState::Init {
            return;
        }

        logging::debug!(self.log, "signaling open, authenticating"; "context" => "signaling");

        self.state = SessionState::Signaling;

        let frame = format!("AUTH|{}", self.token_b64);
        if self.signaling.send(&frame).has_failed() {
            self.close();
        }
    }

    /// One inbound signaling frame. Frames that do not parse are dropped.
    pub fn handle_signaling_frame(&mut self, now: u64, frame: &str) {
        if self.state == SessionState::Closed {
            return;
        }

        let mut parts = frame.splitn(3, '|');
        let kind = parts.next().unwrap_or("");

        match kind {
            "AUTH" => self.handle_auth(now, frame),
            "DESC" => {
                let desc_kind = parts.next();
                let sdp = parts.next();

                match (desc_kind, sdp) {
                    (Some(desc_kind), Some(sdp)) => self.handle_description(desc_kind, sdp),
                    _ => {
                        logging::trace!(self.log, "malformed description frame dropped";
                                        "context" => "signaling")
                    }
                }
            }
            "CAND" => {
                let mid = parts.next();
                let candidate = parts.next();

                match (mid, candidate) {
                    (Some(mid), Some(candidate)) => self.handle_candidate(mid, candidate),
                    _ => {
                        logging::trace!(self.log, "malformed candidate frame dropped";
                                        "context" => "signaling")
                    }
                }
            }
            "READY" => {
                logging::debug!(self.log, "peer ready"; "context" => "signaling");
                self.ready_signal_received = true;
                self.maybe_complete_ready();
            }
            "CONNECTED" => {
                if !self.connected {
                    logging::debug!(self.log, "connection confirmed";
                                    "context" => "signaling",
                                    "session_id" => self.id);

                    self.connected = true;
                    self.state = SessionState::Connected;
                    self.emit_result(ConnectResult::Success);
                }
            }
            _ => {
                logging::trace!(self.log, "unknown signaling frame dropped";
                                "context" => "signaling")
            }
        }
    }

    /// The signaling transport collected a local ICE candidate to forward.
    pub fn send_local_candidate(&mut self, mid: &str, candidate: &str) {
        if self.state == SessionState::Closed {
            return;
        }

        let frame = format!("CAND|{}|{}", mid, candidate);
        if self.signaling.send(&frame).has_failed() {
            self.close();
        }
    }

    /// The signaling transport went away.
    pub fn handle_signaling_closed(&mut self, _now: u64) {
        logging::debug!(self.log, "signaling closed"; "context" => "signaling");
        self.close();
    }

    /// The peer connection failed or closed.
    pub fn handle_peer_failure(&mut self, _now: u64) {
        logging::debug!(self.log, "peer connection failed"; "context" => "peer");
        self.close();
    }

    /// The peer announced a data channel. `system` becomes the system
    /// channel, `server-channel-<i>` becomes the incoming half of channel
    /// `i`, anything else is ignored.
    pub fn handle_channel_announced(&mut self, label: &str, channel: P::Channel) {
        if self.state == SessionState::Closed {
            return;
        }

        if label == SYSTEM_CHANNEL_LABEL {
            let index = self.channels.len();

            self.system = Some(Channel::new(
                index,
                ChannelMode::Unreliable,
                channel,
                // System traffic stays out of the user counters.
                shared_statistic(),
                &self.log,
            ));
            self.route
                .insert(label.to_string(), ChannelRoute::System);
            return;
        }

        match Self::server_channel_index(label) {
            Some(index) if index < self.channels.len() => {
                self.channels[index].attach_incoming(channel);
                self.route
                    .insert(label.to_string(), ChannelRoute::Incoming(index));
            }
            _ => {
                logging::debug!(self.log, "unexpected channel label ignored";
                                "context" => "peer",
                                "label" => label)
            }
        }
    }

    /// A data channel reached the open state.
    pub fn handle_channel_opened(&mut self, now: u64, label: &str) {
        if self.state == SessionState::Closed {
            return;
        }

        match self.route.get(label).cloned() {
            Some(ChannelRoute::Outgoing(index)) => self.channels[index].handle_opened(),
            Some(ChannelRoute::System) => {
                if let Some(system) = self.system.as_mut() {
                    system.handle_opened();
                }
            }
            Some(ChannelRoute::Incoming(_)) | None => return,
        }

        self.check_readiness(now);
    }

    /// A complete payload arrived on a data channel.
    pub fn handle_channel_data(&mut self, now: u64, label: &str, data: &[u8]) {
        if self.state == SessionState::Closed {
            return;
        }

        match self.route.get(label).cloned() {
            Some(ChannelRoute::System) => self.process_system(now, data),
            Some(ChannelRoute::Incoming(index)) => {
                self.channels[index].handle_data(data);
                self.on_received.emit(&(index, data.to_vec()));
            }
            Some(ChannelRoute::Outgoing(_)) | None => {
                logging::trace!(self.log, "payload on unexpected channel dropped";
                                "context" => "peer",
                                "label" => label)
            }
        }
    }

    /// A data channel closed; the session goes down with it.
    pub fn handle_channel_closed(&mut self, _now: u64, label: &str) {
        if self.state == SessionState::Closed {
            return;
        }

        logging::debug!(self.log, "channel closed by peer";
                        "context" => "peer",
                        "label" => label);
        self.close();
    }

    /// Drive the connect timeout and the ping cadence.
    pub fn sync(&mut self, now: u64) {
        if self.state == SessionState::Closed {
            return;
        }

        if let Some(deadline) = self.connect_deadline {
            if now >= deadline {
                logging::debug!(self.log, "connect timed out"; "context" => "sync");
                self.emit_result(ConnectResult::TimedOut);
                self.close();
                return;
            }
        }

        if self.ping_armed && now >= self.next_ping {
            self.send_ping(now);
            self.next_ping = now + self.ping_interval;
        }
    }

    /// Tear the session down. Returns true on the call that actually closed
    /// it, false on any repeat.
    pub fn disconnect(&mut self) -> bool {
        if self.state == SessionState::Closed {
            return false;
        }

        self.close();
        true
    }

    fn handle_auth(&mut self, now: u64, frame: &str) {
        if self.state != SessionState::Signaling {
            logging::trace!(self.log, "unexpected auth frame dropped"; "context" => "signaling");
            return;
        }

        let fields: Vec<&str> = frame.split('|').collect();

        let verdict = if fields.len() == 4 && fields[1] == "OK" {
            match (fields[2].parse::<u64>(), fields[3].parse::<u64>()) {
                (Ok(id), Ok(peer_time)) => Some((id, peer_time)),
                _ => None,
            }
        } else {
            None
        };

        match verdict {
            Some((id, peer_time)) => {
                logging::debug!(self.log, "authenticated";
                                "context" => "signaling",
                                "session_id" => id,
                                "peer_time" => peer_time);

                self.id = Some(id);
                self.clock.set(peer_time, now);
                self.state = SessionState::Negotiating;
            }
            None => {
                logging::debug!(self.log, "authentication denied"; "context" => "signaling");
                self.emit_result(ConnectResult::Denied);
                self.close();
            }
        }
    }

    fn handle_description(&mut self, kind: &str, sdp: &str) {
        if self.peer.set_remote_description(kind, sdp).has_failed() {
            self.close();
            return;
        }

        let (local_kind, local_sdp) = match self.peer.create_answer() {
            Ok(answer) => answer,
            Err(_) => {
                self.close();
                return;
            }
        };

        let frame = format!("DESC|{}|{}", local_kind, local_sdp);
        if self.signaling.send(&frame).has_failed() {
            self.close();
        }
    }

    fn handle_candidate(&mut self, mid: &str, candidate: &str) {
        if self.peer.add_ice_candidate(mid, candidate).has_failed() {
            self.close();
        }
    }

    fn check_readiness(&mut self, now: u64) {
        if self.all_channels_opened || self.state == SessionState::Closed {
            return;
        }

        let user_open = self.channels.iter().all(|channel| channel.is_open());
        let system_open = self
            .system
            .as_ref()
            .map(|system| system.is_open())
            .unwrap_or(false);

        if !(user_open && system_open) {
            return;
        }

        logging::debug!(self.log, "all channels open";
                        "context" => "ready",
                        "channels" => self.channels.len());

        self.all_channels_opened = true;
        if self.state == SessionState::Negotiating {
            self.state = SessionState::ReadyWait;
        }

        if self.signaling.send("READY").has_failed() {
            self.close();
            return;
        }

        self.ping_armed = true;
        self.next_ping = now + self.ping_interval;

        self.maybe_complete_ready();
    }

    fn maybe_complete_ready(&mut self) {
        if self.all_channels_opened && self.ready_signal_received {
            self.connect_deadline = None;
        }
    }

    fn send_ping(&mut self, now: u64) {
        let sequence = self.rtt.next(now);
        let frame = SystemFrame::Ping {
            sequence: u64::from(sequence),
        };

        logging::trace!(self.log, "ping"; "context" => "system", "sequence" => sequence);
        self.send_system(&frame);
    }

    fn send_system(&mut self, frame: &SystemFrame) {
        if frame.write(&mut self.scratch).has_failed() {
            return;
        }

        if let Some(system) = self.system.as_mut() {
            system.send(self.scratch.pack());
        }
    }

    fn process_system(&mut self, now: u64, data: &[u8]) {
        let frame = match SystemFrame::read(data) {
            Ok(frame) => frame,
            Err(_) => {
                logging::trace!(self.log, "malformed system frame dropped"; "context" => "system");
                return;
            }
        };

        match frame {
            SystemFrame::Ping { sequence } => {
                // Echo the sequence; this side has no meaningful time to
                // report, so the pong carries the zero-equivalent.
                self.send_system(&SystemFrame::Pong { sequence, time: 0 });
            }
            SystemFrame::Pong { sequence, time } => {
                let sequence = sequence as u16;

                let entry = match self.rtt.entry(sequence) {
                    Some(entry) => entry,
                    None => return,
                };

                if self.rtt.submit(sequence, now, 0) {
                    self.clock
                        .sync(entry.time, time, time, now, self.rtt.variance());
                }
            }
        }
    }

    fn emit_result(&mut self, result: ConnectResult) {
        if self.result_emitted {
            return;
        }

        logging::debug!(self.log, "connect result";
                        "context" => "result",
                        "result" => ?result);

        self.result_emitted = true;
        self.on_connect_result.emit(&result);
    }

    fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }

        logging::debug!(self.log, "closing session";
                        "context" => "close",
                        "session_id" => self.id,
                        "state" => ?self.state);

        self.state = SessionState::Closed;
        self.ping_armed = false;
        self.connect_deadline = None;

        for channel in self.channels.iter_mut() {
            channel.close();
        }

        if let Some(system) = self.system.as_mut() {
            system.close();
        }

        self.peer.close();
        self.signaling.close();

        self.on_closed.emit(&());
    }

    fn server_channel_index(label: &str) -> Option<usize> {
        if label.starts_with(SERVER_CHANNEL_PREFIX) {
            label[SERVER_CHANNEL_PREFIX.len()..].parse().ok()
        } else {
            None
        }
    }
}
