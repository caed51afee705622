use async_trait::async_trait;
use snafu::{Backtrace, Snafu};

use crate::models::MarketRecord;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// An error occurred while trying to write the data (e.g. a failed insert).
    #[snafu(display("Failed to write data: {message}"))]
    WriteError {
        message: String,
        backtrace: Backtrace,
    },

    /// A record could not be converted into the destination's row format.
    #[snafu(display("Data conversion error: {message}"))]
    ConversionError {
        message: String,
        backtrace: Backtrace,
    },

    /// A generic I/O error.
    #[snafu(display("I/O error: {source}"))]
    Io {
        source: std::io::Error,
        backtrace: Backtrace,
    },
}

/// Bulk destination for parsed records.
///
/// Writes are not required to be idempotent; a re-run pass may hand the same
/// records over again.
#[async_trait]
pub trait DataSink: Send + Sync {
    /// Writes `records`, returning how many were newly stored.
    ///
    /// On error nothing may be assumed about partial writes; the caller keeps
    /// its buffer and may try again.
    async fn bulk_write(&self, records: &[MarketRecord]) -> Result<usize, SinkError>;
}
