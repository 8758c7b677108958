//! Result types for the persistence step.

use serde::{Deserialize, Serialize};

/// Outcome of one commit attempt.
///
/// `total` counts every drained record, `saved` the ones that parsed and were
/// inserted, `discarded` the rejects. A zero/zero report is the normal result
/// of committing an empty buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReport {
    pub saved: u64,
    pub total: u64,
    pub discarded: u64,
    /// Up to [`MAX_DISCARDED_SAMPLES`](super::committer::MAX_DISCARDED_SAMPLES)
    /// rejected lines, kept for diagnosis.
    pub discarded_samples: Vec<String>,
}

impl CommitReport {
    pub fn empty() -> Self {
        Self::default()
    }
}
