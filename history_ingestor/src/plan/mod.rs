//! Pure planning steps of a pass: time range -> windows -> chunks.
//!
//! Nothing here performs I/O. Both steps are deterministic, so a pass can be
//! restarted from any window boundary and replan the same tail.

pub mod chunk;
pub mod partition;

use chrono::{DateTime, Utc};
use snafu::{Backtrace, Snafu};

pub use chunk::chunk;
pub use partition::partition;

/// Input errors of the planning functions. These indicate a caller bug and are never retried.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PartitionError {
    #[snafu(display("invalid range: {start} must not be after {end}"))]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        backtrace: Backtrace,
    },

    #[snafu(display("invalid window width of {width_ms}ms, must be positive"))]
    InvalidWidth { width_ms: i64, backtrace: Backtrace },

    #[snafu(display("invalid chunk size {size}, must be at least 1"))]
    InvalidChunkSize { size: usize, backtrace: Backtrace },

    #[snafu(display("cannot split window into {parts} parts"))]
    InvalidSplit { parts: u32, backtrace: Backtrace },
}
