use serde_derive::{Deserialize, Serialize};
use std::cell::RefCell;
use std::io;
use std::rc::Rc;

pub type SessionId = u64;

pub type NetworkResult<T> = Result<T, NetworkError>;

#[derive(Debug, Eq, PartialEq)]
pub enum NetworkError {
    /// Benign condition: not enough data yet or the operation should be
    /// retried later.
    Wait,
    Fatal(ErrorType),
}

#[derive(Debug, Eq, PartialEq)]
pub enum ErrorType {
    InvalidToken,
    Overflow,
    Underflow,
    SignalingProtocol,
    Transport,
    ChannelClosed,
    Denied,
    TimedOut,
    Serialization,
    Io(io::ErrorKind),
}

impl From<io::Error> for NetworkError {
    #[inline]
    fn from(io_error: io::Error) -> Self {
        match io_error.kind() {
            io::ErrorKind::WouldBlock => NetworkError::Wait,
            kind => NetworkError::Fatal(ErrorType::Io(kind)),
        }
    }
}

pub trait ErrorUtils {
    fn has_failed(&self) -> bool;
}

impl<T> ErrorUtils for NetworkResult<T> {
    fn has_failed(&self) -> bool {
        match self {
            Ok(_) => false,
            Err(NetworkError::Wait) => false,
            _ => true,
        }
    }
}

/// Delivery guarantees of a channel. The mode is fixed when the channel is
/// created and decides how the underlying data channel is configured.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMode {
    Unreliable,
    Sequenced,
    Reliable,
}

impl ChannelMode {
    /// Data channel configuration for this mode.
    #[inline]
    pub fn options(self) -> ChannelOptions {
        match self {
            ChannelMode::Unreliable => ChannelOptions {
                ordered: false,
                max_retransmits: Some(0),
            },
            ChannelMode::Sequenced => ChannelOptions {
                ordered: true,
                max_retransmits: Some(0),
            },
            ChannelMode::Reliable => ChannelOptions {
                ordered: true,
                max_retransmits: None,
            },
        }
    }
}

/// Reliability knobs handed to the peer connection when a data channel is
/// created. `max_retransmits: None` means no retransmit cap.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ChannelOptions {
    pub ordered: bool,
    pub max_retransmits: Option<u16>,
}

/// Terminal outcome of one connection attempt.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ConnectResult {
    Success,
    Denied,
    TimedOut,
}

impl ConnectResult {
    /// Numeric wire code of the outcome.
    #[inline]
    pub fn code(self) -> i32 {
        match self {
            ConnectResult::Success => 0,
            ConnectResult::Denied => -1,
            ConnectResult::TimedOut => -2,
        }
    }
}

/// Traffic counters owned by the socket and accumulated by every channel.
#[derive(Debug, Default, Copy, Clone)]
pub struct Statistic {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl Statistic {
    #[inline]
    pub fn record_sent(&mut self, bytes: usize) {
        self.messages_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    #[inline]
    pub fn record_received(&mut self, bytes: usize) {
        self.messages_received += 1;
        self.bytes_received += bytes as u64;
    }
}

/// Shared handle to the socket-owned counters.
pub type SharedStatistic = Rc<RefCell<Statistic>>;

#[inline]
pub fn shared_statistic() -> SharedStatistic {
    Rc::new(RefCell::new(Statistic::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_fold() {
        let wait: NetworkError = io::Error::from(io::ErrorKind::WouldBlock).into();
        let fatal: NetworkError = io::Error::from(io::ErrorKind::BrokenPipe).into();

        assert_eq!(wait, NetworkError::Wait);
        assert_eq!(fatal, NetworkError::Fatal(ErrorType::Io(io::ErrorKind::BrokenPipe)));
    }

    #[test]
    fn test_has_failed() {
        assert!(!NetworkResult::Ok(()).has_failed());
        assert!(!NetworkResult::<()>::Err(NetworkError::Wait).has_failed());
        assert!(NetworkResult::<()>::Err(NetworkError::Fatal(ErrorType::Transport)).has_failed());
    }

    #[test]
    fn test_mode_options() {
        assert_eq!(
            ChannelMode::Unreliable.options(),
            ChannelOptions { ordered: false, max_retransmits: Some(0) }
        );
        assert_eq!(
            ChannelMode::Sequenced.options(),
            ChannelOptions { ordered: true, max_retransmits: Some(0) }
        );
        assert_eq!(
            ChannelMode::Reliable.options(),
            ChannelOptions { ordered: true, max_retransmits: None }
        );
    }

    #[test]
    fn test_result_codes() {
        assert_eq!(ConnectResult::Success.code(), 0);
        assert_eq!(ConnectResult::Denied.code(), -1);
        assert_eq!(ConnectResult::TimedOut.code(), -2);
    }
}
