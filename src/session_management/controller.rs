//! The session controller and its supervisor task.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep};
use uuid::Uuid;

use super::{SessionEvent, SessionState, StopReason};
use crate::acquisition::{
    handshake, listener, AcquisitionShared, DiscoveryOutcome, DiscoveryProbe,
};
use crate::configuration::types::{DestinationHandle, NetProfile, SessionConfig};
use crate::error_handling::types::{NetworkError, SessionError};
use crate::storage;
use crate::storage::Destination;

/// Cadence of the observational `Progress` event during a collection.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Orchestrates one acquisition session at a time.
///
/// The controller owns the state machine and is its only writer; workers
/// communicate back solely through the shared atomic flags and their task
/// results. `start_*` calls return after validation and worker launch,
/// never for the duration of the phase they start; progress and results
/// arrive through the event channel handed to [`SessionController::new`].
///
/// Deadline expiry and [`stop_collection`](Self::stop_collection) funnel
/// into one idempotent stop path, so a second stop request is a no-op.
pub struct SessionController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    profile: NetProfile,
    events: mpsc::Sender<SessionEvent>,
    control: Mutex<Control>,
}

struct Control {
    state: SessionState,
    active: Option<ActiveCollection>,
}

/// Book-keeping for the collection currently in flight.
struct ActiveCollection {
    session_id: Uuid,
    stop_tx: watch::Sender<bool>,
    /// First stop cause wins; later requests are no-ops.
    stop_reason: Option<StopReason>,
    shared: Arc<AcquisitionShared>,
}

impl SessionController {
    pub fn new(profile: NetProfile, events: mpsc::Sender<SessionEvent>) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                profile,
                events,
                control: Mutex::new(Control {
                    state: SessionState::Idle,
                    active: None,
                }),
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.control_lock().state
    }

    /// Launches a one-shot discovery probe.
    ///
    /// Only allowed from `Idle`. The bind happens before this returns so
    /// bind failures surface synchronously; the wait itself runs in a
    /// spawned task and reports through the event channel, after which the
    /// controller is `Idle` again whatever the outcome.
    pub async fn start_discovery(&self, wait_for: Duration) -> Result<(), SessionError> {
        {
            let mut control = self.inner.control_lock();
            if control.state != SessionState::Idle {
                return Err(SessionError::Busy);
            }
            control.state = SessionState::Discovering;
        }

        let probe = match DiscoveryProbe::bind(self.inner.profile.discovery_port).await {
            Ok(probe) => probe,
            Err(e) => {
                self.inner.reset_idle();
                return Err(e.into());
            }
        };
        let port = match probe.local_addr() {
            Ok(addr) => addr.port(),
            Err(e) => {
                self.inner.reset_idle();
                return Err(e.into());
            }
        };
        self.inner.emit(SessionEvent::DiscoveryStarted { port }).await;

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            match probe.wait(wait_for).await {
                Ok(DiscoveryOutcome::Found(addr)) => {
                    inner.emit(SessionEvent::PeerDiscovered { addr }).await;
                }
                Ok(DiscoveryOutcome::TimedOut) => {
                    inner.emit(SessionEvent::DiscoveryTimedOut).await;
                }
                Err(e) => {
                    warn!("Discovery probe failed: {}", e);
                    inner
                        .emit(SessionEvent::DiscoveryFailed {
                            error: e.to_string(),
                        })
                        .await;
                }
            }
            inner.reset_idle();
        });
        Ok(())
    }

    /// Starts a timed collection session.
    ///
    /// Preconditions are checked synchronously: a destination must be
    /// supplied, the peer address must parse as IPv4, the scenario must be
    /// non-empty and the duration positive, and no other session may be in
    /// flight. A violation rejects the start with no state change and no
    /// workers launched.
    ///
    /// On success the handshake sender and ingest listener are spawned, the
    /// deadline is armed, and the new session id is returned.
    pub async fn start_collection(
        &self,
        config: SessionConfig,
        destination: DestinationHandle,
    ) -> Result<Uuid, SessionError> {
        let destination = destination.ok_or(SessionError::MissingDestination)?;
        let peer_ip: Ipv4Addr = config.peer_addr.trim().parse().map_err(|_| {
            SessionError::InvalidConfig(format!(
                "peer address '{}' is not an IPv4 address",
                config.peer_addr
            ))
        })?;
        if config.scenario.trim().is_empty() {
            return Err(SessionError::InvalidConfig(
                "scenario label must not be empty".into(),
            ));
        }
        if config.duration_secs == 0 {
            return Err(SessionError::InvalidConfig(
                "collection duration must be positive".into(),
            ));
        }

        let session_id = Uuid::new_v4();
        let shared = Arc::new(AcquisitionShared::new());
        let (stop_tx, stop_rx) = watch::channel(false);

        {
            let mut control = self.inner.control_lock();
            if control.state != SessionState::Idle {
                return Err(SessionError::Busy);
            }
            control.state = SessionState::Handshaking;
            control.active = Some(ActiveCollection {
                session_id,
                stop_tx,
                stop_reason: None,
                shared: Arc::clone(&shared),
            });
        }

        let socket = match UdpSocket::bind(("0.0.0.0", self.inner.profile.data_port)).await {
            Ok(socket) => socket,
            Err(e) => {
                self.inner.reset_idle();
                return Err(NetworkError::BindFailed(e).into());
            }
        };
        let data_port = match socket.local_addr() {
            Ok(addr) => addr.port(),
            Err(e) => {
                self.inner.reset_idle();
                return Err(NetworkError::BindFailed(e).into());
            }
        };

        let peer = SocketAddr::from((peer_ip, self.inner.profile.command_port));
        let handshake_handle = tokio::spawn(handshake::run(
            peer,
            config.duration_secs,
            self.inner.profile.resend_interval(),
            Arc::clone(&shared),
            stop_rx.clone(),
        ));
        let listener_handle =
            tokio::spawn(listener::run(socket, Arc::clone(&shared), stop_rx.clone()));

        info!(
            "[{}] Collection started: peer {}, {} s, scenario '{}', destination {}",
            session_id,
            peer,
            config.duration_secs,
            config.scenario,
            destination.describe()
        );
        self.inner
            .emit(SessionEvent::CollectionStarted {
                session_id,
                data_port,
            })
            .await;

        let inner = Arc::clone(&self.inner);
        tokio::spawn(supervise(
            inner,
            session_id,
            config,
            destination,
            shared,
            stop_rx,
            handshake_handle,
            listener_handle,
        ));
        Ok(session_id)
    }

    /// Requests the stop of the in-flight collection.
    ///
    /// Idempotent: returns `true` only for the call that initiated the stop
    /// path; on an idle, discovering, or already-stopping controller it is a
    /// no-op returning `false`, never an error.
    pub fn stop_collection(&self) -> bool {
        let initiated = self.inner.request_stop(StopReason::Requested);
        if !initiated {
            debug!("Stop requested with no collection to stop; ignoring");
        }
        initiated
    }
}

impl ControllerInner {
    fn control_lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reset_idle(&self) {
        let mut control = self.control_lock();
        control.state = SessionState::Idle;
        control.active = None;
    }

    /// The single stop funnel shared by the deadline timer, manual stop
    /// requests, and listener failure.
    fn request_stop(&self, reason: StopReason) -> bool {
        let mut control = self.control_lock();
        match control.state {
            SessionState::Handshaking | SessionState::Collecting => {
                control.state = SessionState::Stopping;
                if let Some(active) = control.active.as_mut() {
                    if active.stop_reason.is_none() {
                        active.stop_reason = Some(reason);
                    }
                    // Flip the collecting flag before the signal so the
                    // listener classifies racing receive errors as expected.
                    active.shared.end_collecting();
                    let _ = active.stop_tx.send(true);
                    info!("[{}] Stop requested: {:?}", active.session_id, reason);
                }
                true
            }
            _ => false,
        }
    }

    async fn emit(&self, event: SessionEvent) {
        if self.events.send(event).await.is_err() {
            debug!("Event sink closed; notification dropped");
        }
    }
}

/// Watches the deadline, acknowledgment, progress cadence, and worker
/// termination for one collection, then runs the stop path and the commit.
#[allow(clippy::too_many_arguments)]
async fn supervise(
    inner: Arc<ControllerInner>,
    session_id: Uuid,
    config: SessionConfig,
    destination: Arc<dyn Destination>,
    shared: Arc<AcquisitionShared>,
    mut stop_rx: watch::Receiver<bool>,
    handshake_handle: JoinHandle<Result<(), NetworkError>>,
    mut listener_handle: JoinHandle<Result<(), NetworkError>>,
) {
    let deadline = sleep(Duration::from_secs(config.duration_secs));
    tokio::pin!(deadline);
    let mut progress = interval(PROGRESS_INTERVAL);
    progress.tick().await; // consume the immediate first tick

    let mut deadline_fired = false;
    let mut acknowledged = false;
    let mut listener_result: Option<Result<(), NetworkError>> = None;

    loop {
        tokio::select! {
            _ = &mut deadline, if !deadline_fired => {
                deadline_fired = true;
                info!("[{}] Collection deadline elapsed", session_id);
                inner.request_stop(StopReason::DeadlineElapsed);
            }
            _ = progress.tick() => {
                inner.emit(SessionEvent::Progress {
                    session_id,
                    buffered: shared.buffer.len(),
                }).await;
            }
            _ = shared.acknowledged_signal(), if !acknowledged => {
                acknowledged = true;
                {
                    let mut control = inner.control_lock();
                    if control.state == SessionState::Handshaking {
                        control.state = SessionState::Collecting;
                    }
                }
                inner.emit(SessionEvent::PeerAcknowledged { session_id }).await;
            }
            joined = &mut listener_handle, if listener_result.is_none() => {
                let result = joined.unwrap_or_else(|e| {
                    Err(NetworkError::ReceiveFailed(std::io::Error::other(e)))
                });
                if let Err(ref e) = result {
                    warn!("[{}] Ingest listener failed: {}", session_id, e);
                    inner.emit(SessionEvent::ListenerFailed {
                        session_id,
                        error: e.to_string(),
                    }).await;
                    inner.request_stop(StopReason::ListenerFailed);
                }
                listener_result = Some(result);
            }
            _ = stop_rx.changed() => break,
        }
    }

    // Workers observe the stop signal within one resend interval (sender)
    // and one select wakeup (listener); join both before touching the data.
    if let Err(e) = handshake_handle
        .await
        .unwrap_or_else(|e| Err(NetworkError::SendFailed(std::io::Error::other(e))))
    {
        warn!("[{}] Handshake sender ended with error: {}", session_id, e);
    }
    if listener_result.is_none() {
        listener_result = Some(listener_handle.await.unwrap_or_else(|e| {
            Err(NetworkError::ReceiveFailed(std::io::Error::other(e)))
        }));
    }
    if let Some(Err(e)) = listener_result {
        debug!("[{}] Listener result after stop: {}", session_id, e);
    }

    let reason = {
        let mut control = inner.control_lock();
        let reason = control
            .active
            .as_ref()
            .and_then(|active| active.stop_reason)
            .unwrap_or(StopReason::Requested);
        control.active = None;
        control.state = SessionState::Idle;
        reason
    };

    let records = shared.buffer.drain();
    info!(
        "[{}] Session ended ({:?}); {} record(s) collected",
        session_id,
        reason,
        records.len()
    );
    inner
        .emit(SessionEvent::CollectionStopped { session_id, reason })
        .await;

    match storage::commit(records, &config.scenario, destination).await {
        Ok(report) => {
            inner
                .emit(SessionEvent::CommitCompleted { session_id, report })
                .await;
        }
        Err(e) => {
            warn!("[{}] Commit failed: {}", session_id, e);
            inner
                .emit(SessionEvent::CommitFailed {
                    session_id,
                    error: e.to_string(),
                })
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::types::SCALAR_FIELD_COUNT;
    use crate::storage::{CommitReport, FileDestination};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::time::timeout;

    const EVENT_WAIT: Duration = Duration::from_secs(5);

    fn test_profile(command_port: u16) -> NetProfile {
        NetProfile {
            discovery_port: 0,
            command_port,
            data_port: 0,
            resend_interval_ms: 25,
            discovery_timeout_secs: 75,
        }
    }

    fn test_config(duration_secs: u64) -> SessionConfig {
        SessionConfig {
            peer_addr: "127.0.0.1".into(),
            duration_secs,
            scenario: "unit test".into(),
        }
    }

    fn record_line(seq: u32) -> String {
        let mut fields = vec![seq.to_string()];
        fields.extend((1..SCALAR_FIELD_COUNT).map(|i| i.to_string()));
        format!("CSI_DATA,{},\"[5,6,7]\"", fields.join(","))
    }

    async fn next_event(rx: &mut mpsc::Receiver<SessionEvent>) -> SessionEvent {
        timeout(EVENT_WAIT, rx.recv())
            .await
            .expect("timed out waiting for a session event")
            .expect("event channel closed")
    }

    /// Reads events until the commit report arrives, returning everything
    /// seen on the way plus the report.
    async fn drive_to_commit(
        rx: &mut mpsc::Receiver<SessionEvent>,
    ) -> (Vec<SessionEvent>, CommitReport) {
        let mut seen = Vec::new();
        loop {
            let event = next_event(rx).await;
            if let SessionEvent::CommitCompleted { ref report, .. } = event {
                let report = report.clone();
                seen.push(event);
                return (seen, report);
            }
            if let SessionEvent::CommitFailed { ref error, .. } = event {
                panic!("commit failed: {}", error);
            }
            seen.push(event);
        }
    }

    /// A scripted stand-in for the ESP32: waits for the start command on its
    /// command socket, then fires the given lines at the announced data port.
    async fn synthetic_peer(command_socket: UdpSocket, data_port: u16, lines: Vec<String>) {
        let mut buf = [0u8; 128];
        let (n, _) = command_socket.recv_from(&mut buf).await.unwrap();
        let command = String::from_utf8_lossy(&buf[..n]).to_string();
        assert!(command.starts_with("start,"), "unexpected command {command}");

        let data = UdpSocket::bind(("127.0.0.1", 0)).await.unwrap();
        for line in lines {
            data.send_to(line.as_bytes(), ("127.0.0.1", data_port))
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_rejects_start_without_destination() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (tx, mut rx) = mpsc::channel(100);
        let controller = SessionController::new(test_profile(1), tx);

        let result = controller.start_collection(test_config(5), None).await;
        assert!(matches!(result, Err(SessionError::MissingDestination)));
        assert_eq!(controller.state(), SessionState::Idle);
        assert!(rx.try_recv().is_err(), "no event may be emitted");
    }

    #[tokio::test]
    async fn test_rejects_invalid_config_fields() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (tx, _rx) = mpsc::channel(100);
        let controller = SessionController::new(test_profile(1), tx);
        let dir = TempDir::new().unwrap();
        let destination = || -> DestinationHandle {
            Some(Arc::new(FileDestination::new(dir.path().join("out.db"))))
        };

        let mut bad_peer = test_config(5);
        bad_peer.peer_addr = "not-an-ip".into();
        assert!(matches!(
            controller.start_collection(bad_peer, destination()).await,
            Err(SessionError::InvalidConfig(_))
        ));

        let mut no_scenario = test_config(5);
        no_scenario.scenario = "  ".into();
        assert!(matches!(
            controller.start_collection(no_scenario, destination()).await,
            Err(SessionError::InvalidConfig(_))
        ));

        assert!(matches!(
            controller.start_collection(test_config(0), destination()).await,
            Err(SessionError::InvalidConfig(_))
        ));

        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_stop_on_idle_is_noop() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (tx, _rx) = mpsc::channel(100);
        let controller = SessionController::new(test_profile(1), tx);
        assert!(!controller.stop_collection());
        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_second_collection_rejected_while_active() {
        let _ = env_logger::builder().is_test(true).try_init();
        let command_socket = UdpSocket::bind(("127.0.0.1", 0)).await.unwrap();
        let command_port = command_socket.local_addr().unwrap().port();
        let (tx, mut rx) = mpsc::channel(100);
        let controller = SessionController::new(test_profile(command_port), tx);
        let dir = TempDir::new().unwrap();

        controller
            .start_collection(
                test_config(30),
                Some(Arc::new(FileDestination::new(dir.path().join("a.db")))),
            )
            .await
            .unwrap();

        let second = controller
            .start_collection(
                test_config(30),
                Some(Arc::new(FileDestination::new(dir.path().join("b.db")))),
            )
            .await;
        assert!(matches!(second, Err(SessionError::Busy)));

        assert!(controller.stop_collection());
        let (_, report) = drive_to_commit(&mut rx).await;
        assert_eq!(report, CommitReport::empty());
        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_manual_stop_is_idempotent_and_commits_empty() {
        let _ = env_logger::builder().is_test(true).try_init();
        let command_socket = UdpSocket::bind(("127.0.0.1", 0)).await.unwrap();
        let command_port = command_socket.local_addr().unwrap().port();
        let (tx, mut rx) = mpsc::channel(100);
        let controller = SessionController::new(test_profile(command_port), tx);
        let dir = TempDir::new().unwrap();

        controller
            .start_collection(
                test_config(30),
                Some(Arc::new(FileDestination::new(dir.path().join("out.db")))),
            )
            .await
            .unwrap();
        assert!(matches!(
            next_event(&mut rx).await,
            SessionEvent::CollectionStarted { .. }
        ));

        assert!(controller.stop_collection());
        assert!(!controller.stop_collection(), "second stop must be a no-op");

        let (seen, report) = drive_to_commit(&mut rx).await;
        assert_eq!(report, CommitReport::empty());
        let stops: Vec<_> = seen
            .iter()
            .filter(|e| matches!(e, SessionEvent::CollectionStopped { .. }))
            .collect();
        assert_eq!(stops.len(), 1, "the stop path must run exactly once");
        assert!(matches!(
            stops[0],
            SessionEvent::CollectionStopped {
                reason: StopReason::Requested,
                ..
            }
        ));
        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_full_session_saves_all_records() {
        let _ = env_logger::builder().is_test(true).try_init();
        let command_socket = UdpSocket::bind(("127.0.0.1", 0)).await.unwrap();
        let command_port = command_socket.local_addr().unwrap().port();
        let (tx, mut rx) = mpsc::channel(100);
        let controller = SessionController::new(test_profile(command_port), tx);
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("capture.db");

        controller
            .start_collection(
                test_config(1),
                Some(Arc::new(FileDestination::new(&out))),
            )
            .await
            .unwrap();

        let data_port = match next_event(&mut rx).await {
            SessionEvent::CollectionStarted { data_port, .. } => data_port,
            other => panic!("expected CollectionStarted, got {:?}", other),
        };
        let lines: Vec<String> = (0..10).map(record_line).collect();
        let peer = tokio::spawn(synthetic_peer(command_socket, data_port, lines));

        let (seen, report) = drive_to_commit(&mut rx).await;
        peer.await.unwrap();

        assert_eq!(report.saved, 10);
        assert_eq!(report.total, 10);
        assert_eq!(report.discarded, 0);
        assert!(seen
            .iter()
            .any(|e| matches!(e, SessionEvent::PeerAcknowledged { .. })));
        assert!(seen.iter().any(|e| matches!(
            e,
            SessionEvent::CollectionStopped {
                reason: StopReason::DeadlineElapsed,
                ..
            }
        )));
        assert!(out.exists());
        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_malformed_datagram_counted_not_saved() {
        let _ = env_logger::builder().is_test(true).try_init();
        let command_socket = UdpSocket::bind(("127.0.0.1", 0)).await.unwrap();
        let command_port = command_socket.local_addr().unwrap().port();
        let (tx, mut rx) = mpsc::channel(100);
        let controller = SessionController::new(test_profile(command_port), tx);
        let dir = TempDir::new().unwrap();

        controller
            .start_collection(
                test_config(1),
                Some(Arc::new(FileDestination::new(dir.path().join("out.db")))),
            )
            .await
            .unwrap();

        let data_port = match next_event(&mut rx).await {
            SessionEvent::CollectionStarted { data_port, .. } => data_port,
            other => panic!("expected CollectionStarted, got {:?}", other),
        };
        // One record is short a scalar field: 24 parts instead of 25. It
        // still carries the marker, so the listener buffers it and the
        // committer must be the one to discard it.
        let mut lines: Vec<String> = (0..6).map(record_line).collect();
        let short: Vec<String> = (0..SCALAR_FIELD_COUNT - 1).map(|i| i.to_string()).collect();
        lines.insert(3, format!("CSI_DATA,{},\"[1]\"", short.join(",")));
        let peer = tokio::spawn(synthetic_peer(command_socket, data_port, lines));

        let (_, report) = drive_to_commit(&mut rx).await;
        peer.await.unwrap();

        assert_eq!(report.total, 7);
        assert_eq!(report.saved, 6);
        assert_eq!(report.discarded, 1);
    }

    #[tokio::test]
    async fn test_listener_failure_ends_session_and_commits_buffer() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (tx, mut rx) = mpsc::channel(100);
        let session_id = Uuid::new_v4();
        let shared = Arc::new(AcquisitionShared::new());
        shared.acknowledge();
        for seq in 0..3 {
            shared.buffer.append(record_line(seq));
        }
        let (stop_tx, stop_rx) = watch::channel(false);
        let inner = Arc::new(ControllerInner {
            profile: test_profile(1),
            events: tx,
            control: Mutex::new(Control {
                state: SessionState::Collecting,
                active: Some(ActiveCollection {
                    session_id,
                    stop_tx,
                    stop_reason: None,
                    shared: Arc::clone(&shared),
                }),
            }),
        });
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("partial.db");
        let destination: Arc<dyn Destination> = Arc::new(FileDestination::new(&out));

        let handshake = tokio::spawn(async { Ok::<(), NetworkError>(()) });
        let listener = tokio::spawn(async {
            Err::<(), NetworkError>(NetworkError::ReceiveFailed(std::io::Error::other(
                "socket torn down",
            )))
        });

        supervise(
            Arc::clone(&inner),
            session_id,
            test_config(30),
            destination,
            Arc::clone(&shared),
            stop_rx,
            handshake,
            listener,
        )
        .await;

        let (seen, report) = drive_to_commit(&mut rx).await;
        assert!(seen
            .iter()
            .any(|e| matches!(e, SessionEvent::ListenerFailed { .. })));
        assert!(seen.iter().any(|e| matches!(
            e,
            SessionEvent::CollectionStopped {
                reason: StopReason::ListenerFailed,
                ..
            }
        )));
        assert_eq!(report.saved, 3);
        assert_eq!(report.total, 3);
        assert!(out.exists(), "the partial capture must still be written");
        assert_eq!(inner.control_lock().state, SessionState::Idle);
    }

    #[tokio::test]
    async fn test_discovery_roundtrip_returns_to_idle() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (tx, mut rx) = mpsc::channel(100);
        let controller = SessionController::new(test_profile(1), tx);

        controller
            .start_discovery(Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(controller.state(), SessionState::Discovering);

        let port = match next_event(&mut rx).await {
            SessionEvent::DiscoveryStarted { port } => port,
            other => panic!("expected DiscoveryStarted, got {:?}", other),
        };

        // Discovery and collection are mutually exclusive.
        assert!(matches!(
            controller.start_discovery(Duration::from_secs(1)).await,
            Err(SessionError::Busy)
        ));

        let announcer = UdpSocket::bind(("127.0.0.1", 0)).await.unwrap();
        announcer
            .send_to(b"CSI_IP,192.168.4.20", ("127.0.0.1", port))
            .await
            .unwrap();

        match next_event(&mut rx).await {
            SessionEvent::PeerDiscovered { addr } => {
                assert_eq!(addr, "192.168.4.20".parse::<Ipv4Addr>().unwrap());
            }
            other => panic!("expected PeerDiscovered, got {:?}", other),
        }

        timeout(EVENT_WAIT, async {
            while controller.state() != SessionState::Idle {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("controller must return to Idle after discovery");
    }
}
