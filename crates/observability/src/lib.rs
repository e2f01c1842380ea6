//! Tracing and logging setup shared by the binaries.

/// Logging configuration.
pub mod logging;

pub use logging::{LogFormat, ParseLogFormatError};

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(format: LogFormat) {
    logging::init(format);
}
