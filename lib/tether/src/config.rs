use crate::shared::{ChannelMode, ErrorType, NetworkError, NetworkResult};
use serde_derive::{Deserialize, Serialize};
use std::path::Path;

/// Socket configuration, loadable from TOML:
///
/// ```toml
/// channel_modes = ["reliable", "sequenced", "unreliable"]
/// ping_interval_ms = 100
/// pool_capacity = 100
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    /// Reliability mode of each user channel, in channel index order.
    pub channel_modes: Vec<ChannelMode>,
    /// Cadence of the system channel ping loop.
    pub ping_interval_ms: u64,
    /// Capacity of the message and payload free-lists.
    pub pool_capacity: usize,
    /// Optional sloggers TOML snippet for the root logger.
    pub log: Option<String>,
}

impl Default for SocketConfig {
    fn default() -> SocketConfig {
        SocketConfig {
            channel_modes: vec![ChannelMode::Reliable],
            ping_interval_ms: 100,
            pool_capacity: 100,
            log: None,
        }
    }
}

impl SocketConfig {
    pub fn from_toml_str(toml: &str) -> NetworkResult<SocketConfig> {
        serdeconv::from_toml_str(toml)
            .map_err(|_| NetworkError::Fatal(ErrorType::Serialization))
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> NetworkResult<SocketConfig> {
        serdeconv::from_toml_file(path.as_ref())
            .map_err(|_| NetworkError::Fatal(ErrorType::Serialization))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SocketConfig::default();

        assert_eq!(config.channel_modes, vec![ChannelMode::Reliable]);
        assert_eq!(config.ping_interval_ms, 100);
        assert_eq!(config.pool_capacity, 100);
        assert!(config.log.is_none());
    }

    #[test]
    fn test_from_toml() {
        let config = SocketConfig::from_toml_str(
            r#"
channel_modes = ["reliable", "sequenced", "unreliable"]
ping_interval_ms = 250
"#,
        )
        .unwrap();

        assert_eq!(
            config.channel_modes,
            vec![ChannelMode::Reliable, ChannelMode::Sequenced, ChannelMode::Unreliable]
        );
        assert_eq!(config.ping_interval_ms, 250);
        // Unspecified fields fall back to the defaults.
        assert_eq!(config.pool_capacity, 100);
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let result = SocketConfig::from_toml_str("channel_modes = [\"bogus\"]");

        assert_eq!(result.unwrap_err(), NetworkError::Fatal(ErrorType::Serialization));
    }
}
