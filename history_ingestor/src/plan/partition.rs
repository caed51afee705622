use chrono::{DateTime, Duration, Utc};
use snafu::ensure;

use crate::{
    models::TimeWindow,
    plan::{InvalidRangeSnafu, InvalidWidthSnafu, PartitionError},
};

/// Splits `[start, end]` into consecutive windows of `width`.
///
/// Windows advance strictly by `width`. The final window is clipped to `end`
/// (so it may be shorter) and is the only closed one. `start == end` yields no
/// windows.
///
/// # Errors
/// * `InvalidRange` if `start > end`
/// * `InvalidWidth` if `width` is not positive
pub fn partition(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    width: Duration,
) -> Result<Vec<TimeWindow>, PartitionError> {
    ensure!(
        width > Duration::zero(),
        InvalidWidthSnafu {
            width_ms: width.num_milliseconds()
        }
    );
    ensure!(start <= end, InvalidRangeSnafu { start, end });

    let mut windows = Vec::new();
    let mut cursor = start;
    while cursor < end {
        match cursor.checked_add_signed(width).filter(|next| *next < end) {
            Some(next) => {
                windows.push(TimeWindow::new(cursor, next, false)?);
                cursor = next;
            }
            None => {
                windows.push(TimeWindow::new(cursor, end, true)?);
                break;
            }
        }
    }
    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    #[test]
    fn thirty_two_minutes_in_sixteen_minute_windows() {
        let windows = partition(at(0, 0), at(0, 32), Duration::minutes(16)).unwrap();
        assert_eq!(windows.len(), 2);

        assert_eq!(windows[0].start(), at(0, 0));
        assert_eq!(windows[0].end(), at(0, 16));
        assert!(!windows[0].is_closed());

        assert_eq!(windows[1].start(), at(0, 16));
        assert_eq!(windows[1].end(), at(0, 32));
        assert!(windows[1].is_closed());
    }

    #[test]
    fn final_window_is_clipped() {
        let windows = partition(at(0, 0), at(0, 40), Duration::minutes(16)).unwrap();
        let widths: Vec<i64> = windows.iter().map(|w| w.width().num_minutes()).collect();
        assert_eq!(widths, vec![16, 16, 8]);
    }

    #[test]
    fn range_shorter_than_width_is_one_window() {
        let windows = partition(at(0, 0), at(0, 5), Duration::minutes(16)).unwrap();
        assert_eq!(windows.len(), 1);
        assert!(windows[0].is_closed());
    }

    #[test]
    fn empty_range_has_no_windows() {
        assert!(partition(at(1, 0), at(1, 0), Duration::minutes(1)).unwrap().is_empty());
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = partition(at(1, 0), at(0, 0), Duration::minutes(1)).unwrap_err();
        assert!(matches!(err, PartitionError::InvalidRange { .. }));
    }

    #[test]
    fn non_positive_width_is_rejected() {
        let err = partition(at(0, 0), at(1, 0), Duration::zero()).unwrap_err();
        assert!(matches!(err, PartitionError::InvalidWidth { .. }));
    }

    #[test]
    fn same_inputs_same_windows() {
        let a = partition(at(0, 0), at(5, 7), Duration::minutes(16)).unwrap();
        let b = partition(at(0, 0), at(5, 7), Duration::minutes(16)).unwrap();
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn partition_covers_range_without_gaps(
            start_ms in 1_500_000_000_000i64..1_800_000_000_000i64,
            len_ms in 1i64..(7 * 24 * 3_600_000),
            width_ms in 1_000i64..(6 * 3_600_000),
        ) {
            let start = Utc.timestamp_millis_opt(start_ms).unwrap();
            let end = start + Duration::milliseconds(len_ms);
            let windows = partition(start, end, Duration::milliseconds(width_ms)).unwrap();

            prop_assert!(!windows.is_empty());
            prop_assert_eq!(windows[0].start(), start);
            prop_assert_eq!(windows[windows.len() - 1].end(), end);

            for pair in windows.windows(2) {
                // contiguous and non-overlapping
                prop_assert_eq!(pair[0].end(), pair[1].start());
                prop_assert_eq!(pair[0].width(), Duration::milliseconds(width_ms));
                prop_assert!(!pair[0].is_closed());
            }
            for w in &windows {
                prop_assert!(w.start() < w.end());
                prop_assert!(w.width() <= Duration::milliseconds(width_ms));
            }
            prop_assert!(windows[windows.len() - 1].is_closed());
        }
    }
}
