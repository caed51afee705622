use async_trait::async_trait;
use chrono::{DateTime, Utc};
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(display("progress store failed: {message}"))]
pub struct ProgressError {
    pub message: String,
}

/// A contiguous stretch `[from, until)` of a dataset that is durably written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoveredSpan {
    pub from: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl CoveredSpan {
    /// `None` for an empty or inverted span.
    pub fn new(from: DateTime<Utc>, until: DateTime<Utc>) -> Option<Self> {
        (from < until).then_some(Self { from, until })
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.from <= ts && ts < self.until
    }

    /// The union of two spans that overlap or touch. `None` when a gap
    /// separates them.
    pub fn union(&self, other: &CoveredSpan) -> Option<CoveredSpan> {
        if self.from > other.until || other.from > self.until {
            return None;
        }
        Some(CoveredSpan {
            from: self.from.min(other.from),
            until: self.until.max(other.until),
        })
    }
}

/// Remembers how far a dataset has been durably ingested, so a later pass can
/// resume from that time boundary instead of the original start.
#[async_trait]
pub trait ProgressTracker: Send + Sync {
    /// The span recorded for `dataset`, if any.
    async fn covered_span(&self, dataset: &str) -> Result<Option<CoveredSpan>, ProgressError>;

    /// Everything inside `span` has been written for `dataset`. Replaces the
    /// stored span.
    async fn record_progress(&self, dataset: &str, span: CoveredSpan) -> Result<(), ProgressError>;
}
