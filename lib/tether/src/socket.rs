use crate::config::SocketConfig;
use crate::message::{Message, Pools};
use crate::session::Session;
use crate::shared::{
    shared_statistic, ChannelMode, ConnectResult, NetworkResult, SessionId, SharedStatistic,
    Statistic,
};
use crate::signal::OnceValue;
use crate::token::{ConnectToken, ServerAddress};
use crate::transport::{Connector, PeerConnection};
use lumen::logging::{self, Logger};
use lumen::time;
use std::cell::RefCell;
use std::rc::Rc;

/// Capability interface for socket consumers. Every callback has a no-op
/// default so embedders only implement what they care about.
pub trait SocketListener {
    /// Final aggregate outcome of a `connect` call. Per-endpoint failures are
    /// not surfaced; only the result that ended the endpoint iteration is.
    fn on_connect_result(&mut self, _result: ConnectResult) {}

    fn on_connected(&mut self, _session_id: SessionId) {}

    fn on_disconnected(&mut self, _session_id: SessionId) {}

    /// An inbound user payload. The message is reclaimed when the callback
    /// returns; copy out anything that must outlive it.
    fn on_received(&mut self, _session_id: SessionId, _channel: usize, _message: &mut Message) {}
}

/// Listener that ignores everything.
pub struct NullListener;

impl SocketListener for NullListener {}

/// The client socket: decodes the connect token, walks its endpoint list one
/// session at a time and publishes connectivity and message events to the
/// listener. Transport completions are injected through the `handle_*`
/// methods, which forward to the active session and then settle any attempt
/// that finished.
pub struct Socket<C: Connector> {
    connector: C,
    modes: Vec<ChannelMode>,
    ping_interval_ms: u64,
    listener: Box<dyn SocketListener>,
    session: Option<Session<C::Signaling, C::Peer>>,
    session_result: Option<OnceValue<ConnectResult>>,
    received_queue: Rc<RefCell<Vec<(usize, Vec<u8>)>>>,
    endpoints: Vec<ServerAddress>,
    endpoint_index: usize,
    token_b64: String,
    timeout_secs: i32,
    final_result: Option<ConnectResult>,
    last_attempt_result: Option<ConnectResult>,
    pools: Pools,
    statistic: SharedStatistic,
    log: Logger,
}

impl<C: Connector> Socket<C> {
    pub fn new<'a, L: Into<Option<&'a Logger>>>(
        connector: C,
        config: SocketConfig,
        log: L,
    ) -> Socket<C> {
        let socket_log = match log.into() {
            Some(log) => log.new(logging::o!()),
            _ => logging::discard(),
        };

        Socket {
            connector,
            modes: config.channel_modes,
            ping_interval_ms: config.ping_interval_ms,
            listener: Box::new(NullListener),
            session: None,
            session_result: None,
            received_queue: Rc::new(RefCell::new(Vec::new())),
            endpoints: Vec::new(),
            endpoint_index: 0,
            token_b64: String::new(),
            timeout_secs: 0,
            final_result: None,
            last_attempt_result: None,
            pools: Pools::new(config.pool_capacity),
            statistic: shared_statistic(),
            log: socket_log,
        }
    }

    pub fn set_listener(&mut self, listener: Box<dyn SocketListener>) {
        self.listener = listener;
    }

    /// Decode the token and start trying its endpoints in declared order.
    /// The terminal outcome arrives through the listener (and
    /// `connect_result`) once the injected event stream resolves it.
    pub fn connect(&mut self, token: &[u8], now: u64) -> NetworkResult<()> {
        self.stop();

        let token = ConnectToken::parse(token)?;

        logging::debug!(self.log, "connecting";
                        "context" => "connect",
                        "endpoints" => token.addresses.len(),
                        "timeout_secs" => token.timeout);

        self.token_b64 = token.to_base64();
        self.endpoints = token.addresses;
        self.timeout_secs = token.timeout;
        self.endpoint_index = 0;
        self.final_result = None;
        self.last_attempt_result = None;

        self.start_attempt(now);
        Ok(())
    }

    /// Aggregate outcome of the last `connect`, once settled.
    #[inline]
    pub fn connect_result(&self) -> Option<ConnectResult> {
        self.final_result
    }

    /// The active session, if any.
    #[inline]
    pub fn session(&self) -> Option<&Session<C::Signaling, C::Peer>> {
        self.session.as_ref()
    }

    /// Snapshot of the traffic counters.
    #[inline]
    pub fn statistic(&self) -> Statistic {
        *self.statistic.borrow()
    }

    /// Peer-aligned time: the local monotonic clock shifted by the active
    /// session's offset estimate.
    pub fn time(&self) -> u64 {
        let offset = self
            .session
            .as_ref()
            .map(|session| session.clock_offset())
            .unwrap_or(0);

        (time::hrtime() as i64 + offset) as u64
    }

    /// Fresh outgoing message from the pool. Hand it back through `send`.
    #[inline]
    pub fn acquire_message(&mut self) -> Message {
        self.pools.acquire_message()
    }

    /// Send a message to every recipient session on the given channel,
    /// returning how many sends succeeded. The message is reclaimed exactly
    /// once, whether or not anything was sent.
    pub fn send(&mut self, channel: usize, message: Message, recipients: &[SessionId]) -> usize {
        let mut count = 0;

        if let Some(session) = self.session.as_mut() {
            if let Some(id) = session.id() {
                for &recipient in recipients {
                    if recipient == id && session.send(channel, message.data()) {
                        count += 1;
                    }
                }
            }
        }

        self.pools.release_message(message);
        count
    }

    /// Tear down the active session, if any. Idempotent.
    pub fn stop(&mut self) {
        if let Some(mut session) = self.session.take() {
            let id = session.id();
            session.disconnect();

            if self.final_result == Some(ConnectResult::Success) {
                if let Some(id) = id {
                    self.listener.on_disconnected(id);
                }
            }
        }

        self.session_result = None;
        self.received_queue.borrow_mut().clear();
    }

    pub fn handle_signaling_open(&mut self, now: u64) {
        if let Some(session) = self.session.as_mut() {
            session.handle_signaling_open(now);
        }
        self.settle(now);
    }

    pub fn handle_signaling_frame(&mut self, now: u64, frame: &str) {
        if let Some(session) = self.session.as_mut() {
            session.handle_signaling_frame(now, frame);
        }
        self.settle(now);
    }

    pub fn handle_signaling_closed(&mut self, now: u64) {
        if let Some(session) = self.session.as_mut() {
            session.handle_signaling_closed(now);
        }
        self.settle(now);
    }

    pub fn handle_peer_failure(&mut self, now: u64) {
        if let Some(session) = self.session.as_mut() {
            session.handle_peer_failure(now);
        }
        self.settle(now);
    }

    pub fn handle_channel_announced(
        &mut self,
        now: u64,
        label: &str,
        channel: <C::Peer as PeerConnection>::Channel,
    ) {
        if let Some(session) = self.session.as_mut() {
            session.handle_channel_announced(label, channel);
        }
        self.settle(now);
    }

    pub fn handle_channel_opened(&mut self, now: u64, label: &str) {
        if let Some(session) = self.session.as_mut() {
            session.handle_channel_opened(now, label);
        }
        self.settle(now);
    }

    pub fn handle_channel_data(&mut self, now: u64, label: &str, data: &[u8]) {
        if let Some(session) = self.session.as_mut() {
            session.handle_channel_data(now, label, data);
        }
        self.settle(now);
    }

    pub fn handle_channel_closed(&mut self, now: u64, label: &str) {
        if let Some(session) = self.session.as_mut() {
            session.handle_channel_closed(now, label);
        }
        self.settle(now);
    }

    pub fn send_local_candidate(&mut self, now: u64, mid: &str, candidate: &str) {
        if let Some(session) = self.session.as_mut() {
            session.send_local_candidate(mid, candidate);
        }
        self.settle(now);
    }

    /// Drive the active session's timers.
    pub fn sync(&mut self, now: u64) {
        if let Some(session) = self.session.as_mut() {
            session.sync(now);
        }
        self.settle(now);
    }

    /// Construct a session for the current endpoint, skipping endpoints whose
    /// transports refuse to open. Runs the iteration to completion when every
    /// remaining endpoint fails immediately.
    fn start_attempt(&mut self, now: u64) {
        while self.endpoint_index < self.endpoints.len() {
            let address = self.endpoints[self.endpoint_index].clone();

            logging::debug!(self.log, "trying endpoint";
                            "context" => "connect",
                            "host" => &address.host,
                            "port" => address.port);

            let attempt = self.open_session(&address, now);

            match attempt {
                Ok(session) => {
                    self.session_result = Some(session.on_connect_result.next());

                    let queue = self.received_queue.clone();
                    session.on_received.connect(move |event: &(usize, Vec<u8>)| {
                        queue.borrow_mut().push(event.clone());
                    });

                    self.session = Some(session);
                    return;
                }
                Err(_) => {
                    logging::debug!(self.log, "endpoint unreachable";
                                    "context" => "connect",
                                    "host" => &address.host);

                    self.last_attempt_result = Some(ConnectResult::Denied);
                    self.endpoint_index += 1;
                }
            }
        }

        let result = self.last_attempt_result.unwrap_or(ConnectResult::Denied);
        self.finish(result);
    }

    fn open_session(
        &mut self,
        address: &ServerAddress,
        now: u64,
    ) -> NetworkResult<Session<C::Signaling, C::Peer>> {
        let signaling = self.connector.open_signaling(address)?;
        let peer = self.connector.open_peer()?;

        Session::new(
            signaling,
            peer,
            &self.modes,
            self.token_b64.clone(),
            self.timeout_secs,
            self.ping_interval_ms,
            self.statistic.clone(),
            now,
            Some(&self.log),
        )
    }

    /// Post-event bookkeeping: deliver queued messages, then resolve the
    /// attempt if its session produced a result or died.
    fn settle(&mut self, now: u64) {
        self.deliver_received();

        let session_closed = self
            .session
            .as_ref()
            .map(|session| !session.is_active())
            .unwrap_or(false);

        if self.final_result == Some(ConnectResult::Success) {
            if session_closed {
                if let Some(session) = self.session.take() {
                    if let Some(id) = session.id() {
                        self.listener.on_disconnected(id);
                    }
                }
                self.session_result = None;
            }
            return;
        }

        let attempt_result = self.session_result.as_ref().and_then(|tap| tap.take());

        if attempt_result == Some(ConnectResult::Success) {
            let id = self
                .session
                .as_ref()
                .and_then(|session| session.id())
                .unwrap_or(0);

            self.final_result = Some(ConnectResult::Success);
            self.session_result = None;
            self.listener.on_connect_result(ConnectResult::Success);
            self.listener.on_connected(id);
            return;
        }

        if session_closed {
            // A failed session reports its verdict in the same event that
            // closes it; one that died without reporting anything counts as
            // a denial for its endpoint.
            self.last_attempt_result = Some(attempt_result.unwrap_or(ConnectResult::Denied));

            self.session = None;
            self.session_result = None;
            self.endpoint_index += 1;
            self.start_attempt(now);
        }
    }

    fn deliver_received(&mut self) {
        if self.received_queue.borrow().is_empty() {
            return;
        }

        let id = match self.session.as_ref().and_then(|session| session.id()) {
            Some(id) => id,
            None => {
                self.received_queue.borrow_mut().clear();
                return;
            }
        };

        let events: Vec<(usize, Vec<u8>)> = self.received_queue.borrow_mut().drain(..).collect();

        for (channel, data) in events {
            let mut message = self.pools.incoming_message(&data);
            self.listener.on_received(id, channel, &mut message);
            self.pools.release_message(message);
        }
    }

    fn finish(&mut self, result: ConnectResult) {
        logging::debug!(self.log, "connect finished";
                        "context" => "connect",
                        "result" => ?result);

        self.final_result = Some(result);
        self.session = None;
        self.session_result = None;
        self.listener.on_connect_result(result);
    }
}
