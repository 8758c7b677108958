//! Session state machine core module.
//!
//! Provides the shared state and event types plus the controller submodule
//! that orchestrates discovery, handshake, ingest, deadline, and persistence
//! for one acquisition session at a time.

use std::net::Ipv4Addr;

use serde::Serialize;
use uuid::Uuid;

use crate::storage::CommitReport;

/// Submodule for the session controller implementation.
pub mod controller;

pub use controller::SessionController;

/// Phase of the single acquisition session.
///
/// The collection path runs `Idle → Handshaking → Collecting → Stopping →
/// Idle`; handshake sender and ingest listener run concurrently through both
/// `Handshaking` and `Collecting`, with the first valid record marking the
/// transition between the two. Discovery is an independent excursion
/// `Idle → Discovering → Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    Discovering,
    Handshaking,
    Collecting,
    Stopping,
}

/// Why a collection session left the collecting phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// The armed deadline elapsed.
    DeadlineElapsed,
    /// An external stop request arrived.
    Requested,
    /// The ingest listener failed while the session was still active.
    ListenerFailed,
}

/// Asynchronous notifications pushed to the external collaborator.
///
/// The transport past the channel (UI updates, logs, beeps) is the
/// consumer's concern; the engine only reports.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    DiscoveryStarted { port: u16 },
    PeerDiscovered { addr: Ipv4Addr },
    DiscoveryTimedOut,
    DiscoveryFailed { error: String },
    CollectionStarted { session_id: Uuid, data_port: u16 },
    PeerAcknowledged { session_id: Uuid },
    /// Periodic observational progress; never affects state.
    Progress { session_id: Uuid, buffered: usize },
    ListenerFailed { session_id: Uuid, error: String },
    CollectionStopped { session_id: Uuid, reason: StopReason },
    CommitCompleted { session_id: Uuid, report: CommitReport },
    CommitFailed { session_id: Uuid, error: String },
}
