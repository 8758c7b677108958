//! Ingest loop for CSI data datagrams.

use std::sync::Arc;

use log::{debug, info, trace};
use tokio::net::UdpSocket;
use tokio::sync::watch;

use super::AcquisitionShared;
use crate::error_handling::types::NetworkError;
use crate::records::RECORD_MARKER;

/// Receives data datagrams and appends the valid ones to the buffer.
///
/// The socket is bound by the controller before workers start, so bind errors
/// reject the session synchronously. The blocking receive is interrupted
/// deterministically through the stop channel half of the `select!` — that
/// signal, not a future packet, is the documented shutdown mechanism; the
/// socket itself is released when the task returns.
///
/// The first datagram carrying the record marker flips the acknowledgment
/// flag (once) so the handshake sender goes quiet. Receive errors are
/// surfaced while the session is still collecting and swallowed once
/// shutdown has been requested.
pub async fn run(
    socket: UdpSocket,
    shared: Arc<AcquisitionShared>,
    mut stop_rx: watch::Receiver<bool>,
) -> Result<(), NetworkError> {
    let mut buf = [0u8; 2048];
    loop {
        tokio::select! {
            _ = stop_rx.changed() => {
                info!("Ingest listener stopping ({} record(s) buffered)", shared.buffer.len());
                return Ok(());
            }
            received = socket.recv_from(&mut buf) => {
                match received {
                    Ok((n, _)) => {
                        let line = String::from_utf8_lossy(&buf[..n]).trim().to_string();
                        if !line.starts_with(RECORD_MARKER) {
                            trace!("Ignoring datagram without record marker");
                            continue;
                        }
                        if shared.acknowledge() {
                            info!("First CSI record received; handshake acknowledged");
                        }
                        shared.buffer.append(line);
                    }
                    Err(e) if !shared.is_collecting() => {
                        // Expected when shutdown races the receive.
                        debug!("Ignoring receive error during shutdown: {}", e);
                        return Ok(());
                    }
                    Err(e) => return Err(NetworkError::ReceiveFailed(e)),
                }
            }
        }
    }
}
