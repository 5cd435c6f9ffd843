//! Diagnostic sink for raw message bytes.

use std::fmt::Write;
use std::sync::Arc;

use tracing::{trace, Level};

/// Receives every raw buffer the session handles. Must not block or fail.
pub trait TraceSink {
    fn record(&self, bytes: &[u8]);
}

impl<T: TraceSink + ?Sized> TraceSink for Arc<T> {
    fn record(&self, bytes: &[u8]) {
        (**self).record(bytes)
    }
}

/// Writes a hex dump of each buffer at `TRACE` level.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogTrace;

impl TraceSink for LogTrace {
    fn record(&self, bytes: &[u8]) {
        if tracing::enabled!(Level::TRACE) {
            trace!(len = bytes.len(), "\n{}", hex_dump(bytes));
        }
    }
}

/// Sixteen bytes per line, each line prefixed with its offset.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3 + bytes.len() / 16 * 6);
    for (row, chunk) in bytes.chunks(16).enumerate() {
        if row > 0 {
            out.push('\n');
        }
        let _ = write!(out, "{:04x}:", row * 16);
        for b in chunk {
            let _ = write!(out, " {:02x}", b);
        }
    }
    out
}
