use std::{num::NonZeroU32, time::Duration};

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use crate::{
    models::{MarketRecord, ProxyEndpoint, Resource, TimeWindow},
    providers::{FetchError, MarketDataApi, TruncatedSnafu, binance_rest::parser},
    proxy::ProxyRotation,
    scheduler::summary::FailedWindow,
};

/// What every fetch task of a chunk shares.
pub(crate) struct FetchContext<'a> {
    pub api: &'a dyn MarketDataApi,
    pub rotation: &'a ProxyRotation,
    pub resource: &'a Resource,
    pub max_attempts: NonZeroU32,
    pub backoff: Duration,
}

/// One try at one window through one proxy.
struct FetchAttempt<'a> {
    window: &'a TimeWindow,
    proxy: ProxyEndpoint,
    sequence_number: usize,
    attempt_count: u32,
}

pub(crate) enum WindowOutcome {
    Fetched { records: Vec<MarketRecord> },
    Failed(FailedWindow),
}

/// Fetches `window` until it succeeds, hits a non-retryable error, or runs out of attempts.
///
/// Every attempt draws a fresh proxy from the rotation.
pub(crate) async fn fetch_window(
    ctx: &FetchContext<'_>,
    sequence_number: usize,
    window: TimeWindow,
) -> WindowOutcome {
    let max_attempts = ctx.max_attempts.get();
    let mut attempt_count = 0;

    loop {
        attempt_count += 1;

        let proxy = match ctx.rotation.acquire().await {
            Ok(proxy) => proxy,
            Err(e) => {
                error!(seq = sequence_number, window = %window, error = %e, "no proxy for window");
                return failed(window, e.to_string(), attempt_count);
            }
        };

        let attempt = FetchAttempt {
            window: &window,
            proxy,
            sequence_number,
            attempt_count,
        };

        match fetch_once(ctx, &attempt).await {
            Ok(records) => return WindowOutcome::Fetched { records },
            Err(e) if e.is_retryable() && attempt_count < max_attempts => {
                warn!(
                    seq = attempt.sequence_number,
                    window = %attempt.window,
                    proxy = %attempt.proxy,
                    attempt = attempt.attempt_count,
                    error = %e,
                    "transient fetch failure, backing off"
                );
                tokio::time::sleep(ctx.backoff).await;
            }
            Err(e) => {
                error!(
                    seq = attempt.sequence_number,
                    window = %attempt.window,
                    proxy = %attempt.proxy,
                    attempts = attempt.attempt_count,
                    error = %e,
                    "window failed permanently"
                );
                return failed(window, e.to_string(), attempt_count);
            }
        }
    }
}

async fn fetch_once(
    ctx: &FetchContext<'_>,
    attempt: &FetchAttempt<'_>,
) -> Result<Vec<MarketRecord>, FetchError> {
    let parts = ctx.resource.sub_calls();
    let calls = match attempt.window.split(parts) {
        Ok(calls) => calls,
        Err(_) => {
            debug!(
                seq = attempt.sequence_number,
                window = %attempt.window,
                sub_calls = parts,
                "window too narrow to split, fetching it in one call"
            );
            vec![*attempt.window]
        }
    };

    let mut records = Vec::new();
    for call in calls {
        fetch_pages(ctx, attempt, call, &mut records).await?;
    }
    Ok(records)
}

/// Issues `call`, then keeps paging forward from the last row while the
/// exchange answers with full pages.
///
/// Each follow-up page starts at the last row's timestamp, inclusive, so rows
/// sharing that instant are not lost; rows already seen are dropped.
async fn fetch_pages(
    ctx: &FetchContext<'_>,
    attempt: &FetchAttempt<'_>,
    call: TimeWindow,
    records: &mut Vec<MarketRecord>,
) -> Result<(), FetchError> {
    let limit = ctx.resource.limit();
    let mut page = call;
    let mut last: Option<(DateTime<Utc>, i64)> = None;

    loop {
        let raw = ctx.api.fetch(ctx.resource, &page, &attempt.proxy).await?;
        let rows = parser::parse(ctx.resource, &raw)?;
        let full = rows.len() >= usize::from(limit);

        let before = records.len();
        records.extend(rows.into_iter().filter(|r| last.is_none_or(|seen| order_key(r) > seen)));
        let Some(cursor) = records[before..].iter().map(order_key).max() else {
            if full {
                return truncated(&call, limit, last);
            }
            return Ok(());
        };
        if !full {
            return Ok(());
        }

        last = Some(cursor);
        // a closed window's end instant can only be re-read from a millisecond earlier
        let next_start = if cursor.0 < page.end() {
            cursor.0
        } else {
            page.end() - chrono::Duration::milliseconds(1)
        };
        page = match TimeWindow::new(next_start, page.end(), page.is_closed()) {
            Ok(next) => next,
            Err(_) => return truncated(&call, limit, last),
        };
        debug!(
            seq = attempt.sequence_number,
            window = %call,
            from = %page.start(),
            "full page, fetching the next one"
        );
    }
}

/// Position of a record in the order an endpoint returns rows.
fn order_key(record: &MarketRecord) -> (DateTime<Utc>, i64) {
    match record {
        MarketRecord::Kline(k) => (k.open_time, 0),
        MarketRecord::AggregatedTrade(t) => (t.trade_time, t.aggregated_trade_id),
    }
}

fn truncated(
    call: &TimeWindow,
    limit: u16,
    last: Option<(DateTime<Utc>, i64)>,
) -> Result<(), FetchError> {
    TruncatedSnafu {
        window: call.to_string(),
        limit,
        cursor: last.map_or_else(|| call.start().to_string(), |(ts, _)| ts.to_string()),
    }
    .fail()
}

fn failed(window: TimeWindow, reason: String, attempts: u32) -> WindowOutcome {
    WindowOutcome::Failed(FailedWindow {
        window,
        reason,
        attempts,
    })
}
