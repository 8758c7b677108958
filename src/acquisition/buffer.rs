//! Thread-safe buffer for raw CSI records.

use std::sync::Mutex;

/// Append-only collection of raw record lines, drained once per session.
///
/// Appends preserve arrival order. A drain takes the whole current content
/// atomically with respect to concurrent appenders: no append is lost and no
/// record shows up in two drains.
pub struct CsiBuffer {
    inner: Mutex<Vec<String>>,
}

impl CsiBuffer {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
        }
    }

    pub fn append(&self, raw: String) {
        let mut records = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        records.push(raw);
    }

    /// Returns everything buffered so far and leaves the buffer empty.
    ///
    /// An empty result is a normal outcome, not an error.
    pub fn drain(&self) -> Vec<String> {
        let mut records = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *records)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CsiBuffer {
    fn default() -> Self {
        Self::new()
    }
}
