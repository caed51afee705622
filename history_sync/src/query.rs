//! Read helpers over the stored history.

use chrono::{DateTime, Utc};
use diesel::{SqliteConnection, prelude::*};

use crate::{
    models::{KlineRow, TradeRow},
    schema::{aggregated_trade_data::dsl as atd, kline_data::dsl as kd},
    tz,
};

/// Trades of `symbol` that fall into the 1m kline opening at `open_time`, by trade id.
pub fn trades_for_kline(
    conn: &mut SqliteConnection,
    symbol: &str,
    open_time: DateTime<Utc>,
) -> QueryResult<Vec<TradeRow>> {
    atd::aggregated_trade_data
        .filter(atd::symbol.eq(symbol))
        .filter(atd::kline_open_time.eq(tz::to_rfc3339_millis(open_time)))
        .order(atd::aggregated_trade_id.asc())
        .select(TradeRow::as_select())
        .load(conn)
}

/// Stored klines of `symbol`/`interval` with `start <= open_time < end`, oldest first.
pub fn klines_between(
    conn: &mut SqliteConnection,
    symbol: &str,
    interval: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> QueryResult<Vec<KlineRow>> {
    kd::kline_data
        .filter(kd::symbol.eq(symbol))
        .filter(kd::interval.eq(interval))
        .filter(kd::open_time.ge(tz::to_rfc3339_millis(start)))
        .filter(kd::open_time.lt(tz::to_rfc3339_millis(end)))
        .order(kd::open_time.asc())
        .select(KlineRow::as_select())
        .load(conn)
}
