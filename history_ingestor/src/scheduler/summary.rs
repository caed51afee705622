use std::fmt;

use chrono::{DateTime, Utc};

use crate::models::TimeWindow;

/// A window that never produced records.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedWindow {
    pub window: TimeWindow,
    /// Last error seen for the window.
    pub reason: String,
    pub attempts: u32,
}

/// Outcome of one pass over a time range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassSummary {
    pub windows_total: usize,
    pub windows_succeeded: usize,
    pub windows_failed: Vec<FailedWindow>,
    pub records_written: usize,
    /// The pass stopped at a chunk boundary because it was cancelled.
    pub cancelled: bool,
    /// Start of the first chunk that was not processed, when cancelled.
    pub resume_from: Option<DateTime<Utc>>,
}

impl PassSummary {
    pub(crate) fn new(windows_total: usize) -> Self {
        Self {
            windows_total,
            ..Self::default()
        }
    }

    /// Every window fetched and nothing skipped.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.windows_failed.is_empty()
    }

    /// Earliest start among failed windows; a resumed pass must begin no later than this.
    pub fn earliest_failure(&self) -> Option<DateTime<Utc>> {
        self.windows_failed.iter().map(|f| f.window.start()).min()
    }
}

impl fmt::Display for PassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SUMMARY: {} succeeded, {} failed, {} records written",
            self.windows_succeeded,
            self.windows_failed.len(),
            self.records_written
        )?;
        if let Some(resume) = self.resume_from {
            write!(f, ", cancelled (resume from {})", resume.to_rfc3339())?;
        }
        Ok(())
    }
}
