//! Wire-format parsing of a single CSI record line.

use std::fmt;

use super::types::{ParsedRecord, SCALAR_FIELD_COUNT};
use super::RECORD_MARKER;

/// Marker + scalars + data blob.
const PART_COUNT: usize = 1 + SCALAR_FIELD_COUNT + 1;

/// Why a record line was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The line does not start with the `CSI_DATA` marker.
    BadMarker,
    /// The line split into a number of parts other than 25.
    FieldCount(usize),
}

/// A non-fatal parse rejection, carrying the offending line for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRejection {
    pub reason: RejectReason,
    pub line: String,
}

impl fmt::Display for RecordRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            RejectReason::BadMarker => write!(f, "record does not start with {}", RECORD_MARKER),
            RejectReason::FieldCount(n) => {
                write!(f, "record split into {} parts, expected {}", n, PART_COUNT)
            }
        }
    }
}

/// Parses one raw record line.
///
/// Splits on commas with a limit of 25 so the final data field stays intact
/// no matter what it contains. Accepts only lines whose first part is the
/// `CSI_DATA` marker and whose part count is exactly 25; anything else is a
/// [`RecordRejection`], which callers count rather than propagate.
pub fn parse(raw: &str) -> Result<ParsedRecord, RecordRejection> {
    let line = raw.trim();
    if !line.starts_with(RECORD_MARKER) {
        return Err(RecordRejection {
            reason: RejectReason::BadMarker,
            line: line.to_string(),
        });
    }

    let parts: Vec<&str> = line.splitn(PART_COUNT, ',').collect();
    if parts.len() != PART_COUNT {
        return Err(RecordRejection {
            reason: RejectReason::FieldCount(parts.len()),
            line: line.to_string(),
        });
    }
    if parts[0] != RECORD_MARKER {
        return Err(RecordRejection {
            reason: RejectReason::BadMarker,
            line: line.to_string(),
        });
    }

    let mut scalars: [String; SCALAR_FIELD_COUNT] = Default::default();
    for (slot, part) in scalars.iter_mut().zip(&parts[1..1 + SCALAR_FIELD_COUNT]) {
        *slot = (*part).to_string();
    }
    let data = parts[PART_COUNT - 1].trim_matches('"').to_string();

    Ok(ParsedRecord { scalars, data })
}
