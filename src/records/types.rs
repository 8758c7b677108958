//! Data types shared across the records subsystem.

/// Number of scalar metadata fields between the marker and the data blob.
pub const SCALAR_FIELD_COUNT: usize = 23;

/// Column names of the scalar fields, in wire order.
///
/// The order matches the emit order of the ESP32 firmware and doubles as the
/// staging-table column list.
pub const SCALAR_COLUMNS: [&str; SCALAR_FIELD_COUNT] = [
    "seq",
    "mac",
    "rssi",
    "rate",
    "sig_mode",
    "mcs",
    "bandwidth",
    "smoothing",
    "not_sounding",
    "aggregation",
    "stbc",
    "fec_coding",
    "sgi",
    "noise_floor",
    "ampdu_cnt",
    "channel",
    "secondary_channel",
    "local_timestamp",
    "ant",
    "sig_len",
    "rx_state",
    "len",
    "first_word",
];

/// A raw record split into its validated parts.
///
/// The marker is checked during parsing and then discarded. Scalars are kept
/// as received text; SQLite column affinity coerces the numeric ones on
/// insert, exactly as the original collectors did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    /// The 23 scalar metadata fields, in [`SCALAR_COLUMNS`] order.
    pub scalars: [String; SCALAR_FIELD_COUNT],
    /// The CSI byte-array field, surrounding quotes stripped.
    pub data: String,
}
