use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::storage::destination::Destination;

/// Network parameters shared by every session.
///
/// The defaults match the ESP32 firmware: it announces itself on 50002,
/// listens for commands on 50000, and streams CSI records to 50001. Tests
/// set the ports to 0 to get OS-assigned ones.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NetProfile {
    /// Port on which the peer broadcasts its `CSI_IP` announcement.
    pub discovery_port: u16,
    /// Peer-side port receiving the `start` command.
    pub command_port: u16,
    /// Local port receiving CSI data datagrams.
    pub data_port: u16,
    /// Delay between `start` command retransmissions, in milliseconds.
    pub resend_interval_ms: u64,
    /// How long the discovery probe waits for an announcement, in seconds.
    pub discovery_timeout_secs: u64,
}

impl Default for NetProfile {
    fn default() -> Self {
        Self {
            discovery_port: 50002,
            command_port: 50000,
            data_port: 50001,
            resend_interval_ms: 200,
            discovery_timeout_secs: 75,
        }
    }
}

impl NetProfile {
    pub fn resend_interval(&self) -> Duration {
        Duration::from_millis(self.resend_interval_ms)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }
}

/// Immutable per-session parameters, fixed when a collection starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// IPv4 address of the peer device, as text.
    pub peer_addr: String,
    /// Collection duration in seconds; also sent to the peer in the
    /// `start` command.
    pub duration_secs: u64,
    /// Free-text label describing the experiment scenario; stored alongside
    /// every committed record.
    pub scenario: String,
}

/// A destination handle as supplied by the caller: present or not.
///
/// The controller rejects collection starts without one; the handle itself
/// stays opaque until the committer opens it for writing.
pub type DestinationHandle = Option<Arc<dyn Destination>>;
