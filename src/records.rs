//! CSI record model and wire-format parsing.
//!
//! A record is one line of text emitted by the ESP32: the `CSI_DATA` marker,
//! 23 comma-separated scalar fields, and one quoted data field holding the
//! raw CSI byte array (comma-free by construction on the wire, but split with
//! a limit anyway so it can never be cut apart).

pub mod parser;
pub mod types;

pub use parser::{parse, RecordRejection, RejectReason};
pub use types::{ParsedRecord, SCALAR_COLUMNS, SCALAR_FIELD_COUNT};

/// Marker prefix of every valid data datagram.
pub const RECORD_MARKER: &str = "CSI_DATA";

/// Prefix of the discovery announcement datagram, `CSI_IP,<ipv4>`.
pub const DISCOVERY_PREFIX: &str = "CSI_IP,";
