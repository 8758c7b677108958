//! Passive discovery of the peer device's address.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::error_handling::types::NetworkError;
use crate::records::DISCOVERY_PREFIX;

/// Result of a completed probe. A quiet network is a normal outcome; the
/// operator can type the address in by hand instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    Found(Ipv4Addr),
    TimedOut,
}

/// One-shot listener for the peer's `CSI_IP,<ipv4>` broadcast.
///
/// Binding and waiting are separate so bind errors surface synchronously and
/// tests can bind port 0 and read the assigned port back. The probe does not
/// rearm itself: one `wait` consumes it, and the socket is released on every
/// exit path when the probe drops.
pub struct DiscoveryProbe {
    socket: UdpSocket,
}

impl DiscoveryProbe {
    pub async fn bind(port: u16) -> Result<Self, NetworkError> {
        let socket = UdpSocket::bind(("0.0.0.0", port))
            .await
            .map_err(NetworkError::BindFailed)?;
        socket.set_broadcast(true).map_err(NetworkError::BindFailed)?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetworkError> {
        self.socket.local_addr().map_err(NetworkError::BindFailed)
    }

    /// Waits up to `wait_for` for one announcement datagram.
    ///
    /// Datagrams that do not carry the announcement prefix, or carry an
    /// unparseable address, are skipped within the timeout window.
    pub async fn wait(self, wait_for: Duration) -> Result<DiscoveryOutcome, NetworkError> {
        info!(
            "Listening for peer announcement on {} for {:?}",
            self.socket.local_addr().map_err(NetworkError::BindFailed)?,
            wait_for
        );
        let mut buf = [0u8; 1024];
        let result = timeout(wait_for, async {
            loop {
                let (n, from) = self
                    .socket
                    .recv_from(&mut buf)
                    .await
                    .map_err(NetworkError::ReceiveFailed)?;
                let message = String::from_utf8_lossy(&buf[..n]);
                let message = message.trim();
                let Some(addr_text) = message.strip_prefix(DISCOVERY_PREFIX) else {
                    debug!("Ignoring non-announcement datagram from {}", from);
                    continue;
                };
                match addr_text.split(',').next().unwrap_or("").parse::<Ipv4Addr>() {
                    Ok(addr) => {
                        info!("Peer announced itself from {}: {}", from, addr);
                        return Ok(addr);
                    }
                    Err(_) => {
                        warn!("Announcement from {} carries a bad address: {}", from, message);
                    }
                }
            }
        })
        .await;

        match result {
            Ok(Ok(addr)) => Ok(DiscoveryOutcome::Found(addr)),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                info!("No peer announcement within {:?}", wait_for);
                Ok(DiscoveryOutcome::TimedOut)
            }
        }
    }
}
