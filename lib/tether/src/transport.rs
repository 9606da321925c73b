use crate::shared::{ChannelOptions, NetworkResult};
use crate::token::ServerAddress;

/// Bidirectional ordered text-framed signaling channel. The concrete
/// transport (typically a websocket) lives with the embedder; completions
/// come back in through the session's `handle_signaling_*` events.
pub trait SignalingTransport {
    /// Queue one text frame for delivery.
    fn send(&mut self, frame: &str) -> NetworkResult<()>;

    /// Tear the transport down. Must be idempotent.
    fn close(&mut self);
}

/// One half of a peer data channel. `send` returns false once the underlying
/// channel can no longer accept data.
pub trait DataChannel {
    fn send(&mut self, data: &[u8]) -> bool;

    fn close(&mut self);
}

/// The out-of-band negotiated peer connection. Open/data/close completions
/// for its channels are injected through the session's `handle_channel_*`
/// events, keyed by channel label.
pub trait PeerConnection {
    type Channel: DataChannel;

    /// Create a locally originated data channel with the supplied
    /// reliability configuration.
    fn create_channel(&mut self, label: &str, options: &ChannelOptions)
        -> NetworkResult<Self::Channel>;

    /// Apply the remote session description.
    fn set_remote_description(&mut self, kind: &str, sdp: &str) -> NetworkResult<()>;

    /// Produce the local answer as a `(type, sdp)` pair.
    fn create_answer(&mut self) -> NetworkResult<(String, String)>;

    /// Register a remote ICE candidate.
    fn add_ice_candidate(&mut self, mid: &str, candidate: &str) -> NetworkResult<()>;

    /// Tear the connection down. Must be idempotent.
    fn close(&mut self);
}

/// Factory for the per-endpoint transport pair. The socket asks for a fresh
/// signaling channel and peer connection for every endpoint it tries.
pub trait Connector {
    type Signaling: SignalingTransport;
    type Peer: PeerConnection;

    fn open_signaling(&mut self, address: &ServerAddress) -> NetworkResult<Self::Signaling>;

    fn open_peer(&mut self) -> NetworkResult<Self::Peer>;
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use crate::shared::{ErrorType, NetworkError};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Everything the mock transports observed, shared between the test body
    /// and the objects handed into the state machine.
    #[derive(Default)]
    pub struct TransportLog {
        pub signaling_opened: Vec<String>,
        pub signaling_sent: Vec<String>,
        pub signaling_closed: u32,
        pub channels_created: Vec<(String, ChannelOptions)>,
        pub remote_descriptions: Vec<(String, String)>,
        pub candidates: Vec<(String, String)>,
        pub peers_closed: u32,
        pub channel_sent: Vec<(String, Vec<u8>)>,
        pub channels_closed: Vec<String>,
    }

    pub type SharedLog = Rc<RefCell<TransportLog>>;

    pub fn shared_log() -> SharedLog {
        Rc::new(RefCell::new(TransportLog::default()))
    }

    pub struct MockSignaling {
        pub log: SharedLog,
        pub fail_sends: bool,
    }

    impl SignalingTransport for MockSignaling {
        fn send(&mut self, frame: &str) -> NetworkResult<()> {
            if self.fail_sends {
                return Err(NetworkError::Fatal(ErrorType::Transport));
            }

            self.log.borrow_mut().signaling_sent.push(frame.to_string());
            Ok(())
        }

        fn close(&mut self) {
            self.log.borrow_mut().signaling_closed += 1;
        }
    }

    pub struct MockChannel {
        pub label: String,
        pub log: SharedLog,
    }

    impl DataChannel for MockChannel {
        fn send(&mut self, data: &[u8]) -> bool {
            self.log
                .borrow_mut()
                .channel_sent
                .push((self.label.clone(), data.to_vec()));
            true
        }

        fn close(&mut self) {
            self.log.borrow_mut().channels_closed.push(self.label.clone());
        }
    }

    pub struct MockPeer {
        pub log: SharedLog,
    }

    impl PeerConnection for MockPeer {
        type Channel = MockChannel;

        fn create_channel(
            &mut self,
            label: &str,
            options: &ChannelOptions,
        ) -> NetworkResult<MockChannel> {
            self.log
                .borrow_mut()
                .channels_created
                .push((label.to_string(), *options));

            Ok(MockChannel {
                label: label.to_string(),
                log: self.log.clone(),
            })
        }

        fn set_remote_description(&mut self, kind: &str, sdp: &str) -> NetworkResult<()> {
            self.log
                .borrow_mut()
                .remote_descriptions
                .push((kind.to_string(), sdp.to_string()));
            Ok(())
        }

        fn create_answer(&mut self) -> NetworkResult<(String, String)> {
            Ok(("answer".to_string(), "mock-sdp".to_string()))
        }

        fn add_ice_candidate(&mut self, mid: &str, candidate: &str) -> NetworkResult<()> {
            self.log
                .borrow_mut()
                .candidates
                .push((mid.to_string(), candidate.to_string()));
            Ok(())
        }

        fn close(&mut self) {
            self.log.borrow_mut().peers_closed += 1;
        }
    }

    pub struct MockConnector {
        pub log: SharedLog,
        /// Hosts for which opening the signaling transport fails outright.
        pub unreachable_hosts: Vec<String>,
    }

    impl MockConnector {
        pub fn new(log: SharedLog) -> MockConnector {
            MockConnector {
                log,
                unreachable_hosts: Vec::new(),
            }
        }
    }

    impl Connector for MockConnector {
        type Signaling = MockSignaling;
        type Peer = MockPeer;

        fn open_signaling(&mut self, address: &ServerAddress) -> NetworkResult<MockSignaling> {
            if self.unreachable_hosts.contains(&address.host) {
                return Err(NetworkError::Fatal(ErrorType::Transport));
            }

            self.log
                .borrow_mut()
                .signaling_opened
                .push(format!("{}:{}", address.host, address.port));

            Ok(MockSignaling {
                log: self.log.clone(),
                fail_sends: false,
            })
        }

        fn open_peer(&mut self) -> NetworkResult<MockPeer> {
            Ok(MockPeer {
                log: self.log.clone(),
            })
        }
    }
}
