use crate::shared::{ChannelMode, SharedStatistic};
use crate::signal::Signal;
use crate::transport::DataChannel;
use lumen::logging::{self, Logger};

/// A logical message stream between client and server, multiplexed over the
/// peer connection as two uni-directional data channel halves: the locally
/// created outgoing half and, once the peer announces it, the incoming half.
/// The reliability mode is fixed when the channel is created.
///
/// Lifecycle surfaces as signals: `on_opened` when the outgoing half opens,
/// `on_data` for every complete inbound payload, and `on_closed` exactly once
/// on the first close of either half.
pub struct Channel<D: DataChannel> {
    index: usize,
    mode: ChannelMode,
    outgoing: D,
    incoming: Option<D>,
    opened: bool,
    closed: bool,
    statistic: SharedStatistic,
    pub on_opened: Signal<()>,
    pub on_data: Signal<Vec<u8>>,
    pub on_closed: Signal<()>,
    log: Logger,
}

impl<D: DataChannel> Channel<D> {
    pub fn new<'a, L: Into<Option<&'a Logger>>>(
        index: usize,
        mode: ChannelMode,
        outgoing: D,
        statistic: SharedStatistic,
        log: L,
    ) -> Channel<D> {
        let channel_log = match log.into() {
            Some(log) => log.new(logging::o!("channel" => index)),
            _ => logging::discard(),
        };

        Channel {
            index,
            mode,
            outgoing,
            incoming: None,
            opened: false,
            closed: false,
            statistic,
            on_opened: Signal::new(),
            on_data: Signal::new(),
            on_closed: Signal::new(),
            log: channel_log,
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn mode(&self) -> ChannelMode {
        self.mode
    }

    /// The mode is fixed at construction; this accepts the call for interface
    /// compatibility and always reports success without changing anything.
    #[inline]
    pub fn set_mode(&self, _mode: ChannelMode) -> bool {
        true
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.opened && !self.closed
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Bind the peer-announced half feeding this channel.
    pub fn attach_incoming(&mut self, incoming: D) {
        logging::trace!(self.log, "incoming half attached"; "context" => "attach");
        self.incoming = Some(incoming);
    }

    /// The outgoing half reached the open state.
    pub fn handle_opened(&mut self) {
        if self.opened || self.closed {
            return;
        }

        logging::debug!(self.log, "channel opened"; "context" => "open");

        self.opened = true;
        self.on_opened.emit(&());
    }

    /// A complete payload arrived on the incoming half.
    pub fn handle_data(&mut self, data: &[u8]) {
        if self.closed {
            return;
        }

        self.statistic.borrow_mut().record_received(data.len());
        self.on_data.emit(&data.to_vec());
    }

    /// Enqueue a payload on the outgoing half. Refused after close.
    pub fn send(&mut self, data: &[u8]) -> bool {
        if self.closed {
            return false;
        }

        if !self.outgoing.send(data) {
            return false;
        }

        self.statistic.borrow_mut().record_sent(data.len());
        true
    }

    /// Close both halves. Idempotent; `on_closed` fires only on the first
    /// call.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }

        logging::debug!(self.log, "channel closed"; "context" => "close");

        self.closed = true;
        self.outgoing.close();

        if let Some(incoming) = self.incoming.as_mut() {
            incoming.close();
        }

        self.on_closed.emit(&());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::shared_statistic;
    use crate::transport::mock::{shared_log, MockChannel};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn make_channel(mode: ChannelMode) -> (Channel<MockChannel>, crate::transport::mock::SharedLog) {
        let log = shared_log();
        let outgoing = MockChannel {
            label: "client-channel-0".to_string(),
            log: log.clone(),
        };

        (
            Channel::new(0, mode, outgoing, shared_statistic(), None),
            log,
        )
    }

    #[test]
    fn test_opened_fires_once() {
        let (mut channel, _log) = make_channel(ChannelMode::Reliable);
        let fired = Rc::new(RefCell::new(0));

        let counter = fired.clone();
        let _conn = channel.on_opened.connect(move |_| *counter.borrow_mut() += 1);

        assert!(!channel.is_open());

        channel.handle_opened();
        channel.handle_opened();

        assert!(channel.is_open());
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn test_send_accounts_bytes() {
        let (mut channel, log) = make_channel(ChannelMode::Sequenced);

        assert!(channel.send(&[1, 2, 3]));
        assert!(channel.send(&[4]));

        let stats = *channel.statistic.borrow();
        assert_eq!(stats.messages_sent, 2);
        assert_eq!(stats.bytes_sent, 4);
        assert_eq!(log.borrow().channel_sent.len(), 2);
    }

    #[test]
    fn test_data_emits_and_accounts() {
        let (mut channel, _log) = make_channel(ChannelMode::Reliable);
        let received = Rc::new(RefCell::new(Vec::new()));

        let sink = received.clone();
        let _conn = channel
            .on_data
            .connect(move |data: &Vec<u8>| sink.borrow_mut().push(data.clone()));

        channel.handle_data(&[0xaa, 0xbb]);

        assert_eq!(*received.borrow(), vec![vec![0xaa, 0xbb]]);

        let stats = *channel.statistic.borrow();
        assert_eq!(stats.messages_received, 1);
        assert_eq!(stats.bytes_received, 2);
    }

    #[test]
    fn test_close_is_idempotent_and_refuses_sends() {
        let (mut channel, log) = make_channel(ChannelMode::Unreliable);
        let closed = Rc::new(RefCell::new(0));

        let counter = closed.clone();
        let _conn = channel.on_closed.connect(move |_| *counter.borrow_mut() += 1);

        channel.attach_incoming(MockChannel {
            label: "server-channel-0".to_string(),
            log: log.clone(),
        });

        channel.close();
        channel.close();

        assert_eq!(*closed.borrow(), 1);
        assert!(!channel.send(&[1]));
        // Both halves were torn down.
        assert_eq!(
            log.borrow().channels_closed,
            vec!["client-channel-0".to_string(), "server-channel-0".to_string()]
        );
    }

    #[test]
    fn test_mode_is_immutable() {
        let (channel, _log) = make_channel(ChannelMode::Sequenced);

        assert!(channel.set_mode(ChannelMode::Reliable));
        assert_eq!(channel.mode(), ChannelMode::Sequenced);
    }
}
