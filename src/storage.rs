//! Persistence subsystem.
//!
//! Collected records are committed exactly once, at session end: parsed rows
//! go into a staging SQLite database inside a single transaction, then the
//! staging file is transferred byte-for-byte to the caller-supplied
//! destination. The staging artifact lives in a temporary directory and is
//! removed on every exit path.
//!
//! Components:
//! - `types`: the commit report returned to the caller.
//! - `destination`: the opaque destination handle and its file-backed impl.
//! - `staging`: the staging SQLite store (schema, transaction, inserts).
//! - `committer`: the drain-parse-insert-transfer orchestration.

pub mod committer;
pub mod destination;
pub mod staging;
pub mod types;

pub use committer::commit;
pub use destination::{Destination, FileDestination};
pub use types::CommitReport;
