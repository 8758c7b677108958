//! Retry-until-acknowledged transmission of the start command.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::sleep;

use super::AcquisitionShared;
use crate::error_handling::types::NetworkError;

/// Sends `start,<duration>` to the peer's command port until the first data
/// record is observed or the session stops.
///
/// UDP gives no delivery guarantee and the peer may still be binding its own
/// listener, so the command is repeated every `resend_interval` to realize
/// at-least-once delivery. There is deliberately no resend cap: an
/// unresponsive peer keeps this loop running until the deadline or a manual
/// stop ends the session.
pub async fn run(
    peer: SocketAddr,
    duration_secs: u64,
    resend_interval: Duration,
    shared: Arc<AcquisitionShared>,
    mut stop_rx: watch::Receiver<bool>,
) -> Result<(), NetworkError> {
    let socket = UdpSocket::bind(("0.0.0.0", 0))
        .await
        .map_err(NetworkError::BindFailed)?;
    let command = format!("start,{}", duration_secs);

    let mut sent = 0u32;
    while shared.is_collecting() && !shared.is_acknowledged() {
        socket
            .send_to(command.as_bytes(), peer)
            .await
            .map_err(NetworkError::SendFailed)?;
        sent += 1;
        debug!("Sent '{}' to {} (attempt {})", command, peer, sent);

        tokio::select! {
            _ = sleep(resend_interval) => {}
            _ = stop_rx.changed() => break,
        }
    }

    info!(
        "Handshake sender finished after {} transmission(s) (acknowledged: {})",
        sent,
        shared.is_acknowledged()
    );
    Ok(())
}
