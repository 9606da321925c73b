#![allow(clippy::len_without_is_empty)]
#![allow(clippy::new_without_default)]

//! Client-side real-time transport: a connect-token-authenticated,
//! multi-channel peer connection bootstrapped over a text signaling channel,
//! with continuous round-trip and clock synchronization on a dedicated
//! system channel.

pub mod channel;
pub mod clock;
pub mod config;
pub mod message;
pub mod payload;
pub mod pool;
pub mod rtt;
pub mod sampling;
pub mod session;
pub mod shared;
pub mod signal;
pub mod socket;
pub mod token;
pub mod transport;
pub mod wire;

pub use crate::config::SocketConfig;
pub use crate::message::Message;
pub use crate::session::{Session, SessionState};
pub use crate::shared::{
    ChannelMode, ChannelOptions, ConnectResult, NetworkError, NetworkResult, SessionId, Statistic,
};
pub use crate::socket::{NullListener, Socket, SocketListener};
pub use crate::token::{ConnectToken, ServerAddress};
pub use crate::transport::{Connector, DataChannel, PeerConnection, SignalingTransport};
