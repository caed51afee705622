//! Time windows, the unit of one remote fetch.
//!
//! A partition of `[start, end]` is a run of contiguous windows. Every window
//! but the last is half-open `[start, end)`; the last one is closed so the
//! requested end boundary itself is covered.

use std::fmt;

use chrono::{DateTime, Duration, Utc};

use crate::plan::{InvalidRangeSnafu, InvalidSplitSnafu, PartitionError};

/// An immutable, non-empty interval of UTC time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    closed: bool,
}

impl TimeWindow {
    /// Creates a window. `start` must be strictly before `end`.
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        closed: bool,
    ) -> Result<Self, PartitionError> {
        if start >= end {
            return InvalidRangeSnafu { start, end }.fail();
        }
        Ok(Self { start, end, closed })
    }

    /// Window start (always inclusive).
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Window end. Inclusive only when [`TimeWindow::is_closed`] is true.
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// True for the final window of a partition.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn width(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && (ts < self.end || (self.closed && ts == self.end))
    }

    /// Inclusive millisecond bounds as sent to the remote API
    /// (`startTime`/`endTime` are both inclusive there).
    pub fn request_bounds_ms(&self) -> (i64, i64) {
        let end_ms = self.end.timestamp_millis();
        let end_ms = if self.closed { end_ms } else { end_ms - 1 };
        (self.start.timestamp_millis(), end_ms)
    }

    /// Splits the window into `parts` contiguous sub-windows of (near) equal width.
    ///
    /// Boundaries are computed in whole milliseconds; the last sub-window takes
    /// any remainder and inherits this window's closedness.
    pub fn split(&self, parts: u32) -> Result<Vec<TimeWindow>, PartitionError> {
        let width_ms = self.width().num_milliseconds();
        if parts == 0 || width_ms < i64::from(parts) {
            return InvalidSplitSnafu { parts }.fail();
        }
        if parts == 1 {
            return Ok(vec![*self]);
        }

        let parts = i64::from(parts);
        let boundary = |i: i64| self.start + Duration::milliseconds(width_ms * i / parts);

        let mut out = Vec::with_capacity(parts as usize);
        for i in 0..parts {
            let sub_start = boundary(i);
            let last = i == parts - 1;
            let sub_end = if last { self.end } else { boundary(i + 1) };
            out.push(TimeWindow {
                start: sub_start,
                end: sub_end,
                closed: last && self.closed,
            });
        }
        Ok(out)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let close = if self.closed { ']' } else { ')' };
        write!(
            f,
            "[{}, {}{close}",
            self.start.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            self.end.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        )
    }
}
