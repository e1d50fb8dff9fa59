//! Hub daemon configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the hub daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Address to bind the HTTP API to (localhost by default)
    pub bind_address: String,

    /// Fixed delay before a disconnected instance is recycled.
    /// No backoff growth and no attempt cap; `stop()` is the only way
    /// to end the cycle.
    #[serde(with = "duration_secs")]
    pub reconnect_delay: Duration,

    /// Outgoing dispatcher settings
    pub dispatch: DispatchConfig,

    /// Simulated transport settings
    pub transport: SimTransportConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8642".to_string(),
            reconnect_delay: Duration::from_secs(5),
            dispatch: DispatchConfig::default(),
            transport: SimTransportConfig::default(),
        }
    }
}

/// Outgoing dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Interval between fallback polls for pending rows
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,

    /// Minimum age before a pending row is picked up by the poll.
    /// Covers missed push notifications without double-handling rows
    /// that a notification is already driving.
    #[serde(with = "duration_secs")]
    pub pending_age_threshold: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
            pending_age_threshold: Duration::from_secs(30),
        }
    }
}

/// Simulated transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimTransportConfig {
    /// When true, transports advance pairing and connection on their own.
    /// When false, lifecycle events must be injected through the
    /// controller handle (test mode).
    pub auto_pair: bool,

    /// Delay before a started transport emits its pairing artifact
    #[serde(with = "duration_secs")]
    pub pairing_delay: Duration,

    /// Delay between pairing and the ready event in auto mode
    #[serde(with = "duration_secs")]
    pub connect_delay: Duration,
}

impl Default for SimTransportConfig {
    fn default() -> Self {
        Self {
            auto_pair: true,
            pairing_delay: Duration::from_secs(1),
            connect_delay: Duration::from_secs(2),
        }
    }
}

// Helper module for Duration serialization as whole seconds
mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
