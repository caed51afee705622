//! Canonical in-memory records produced by a successful fetch.
//!
//! Records carry their own symbol (and interval, for klines) so that a buffer
//! mixing several passes stays self-describing.

use chrono::{DateTime, DurationRound, TimeDelta, Utc};

use crate::models::interval::KlineInterval;

/// One candlestick.
#[derive(Debug, Clone, PartialEq)]
pub struct Kline {
    pub symbol: String,
    pub interval: KlineInterval,

    /// Start of the candle (UTC).
    pub open_time: DateTime<Utc>,

    /// Last millisecond covered by the candle (UTC).
    pub close_time: DateTime<Utc>,

    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,

    /// Base asset volume.
    pub volume: f64,

    /// Quote asset volume.
    pub quote_asset_volume: f64,

    pub number_of_trades: u64,

    /// Base asset volume bought by takers.
    pub taker_buy_base_volume: f64,

    /// Quote asset volume bought by takers.
    pub taker_buy_quote_volume: f64,
}

/// One aggregated trade: consecutive fills at the same price, same taker side.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedTrade {
    pub symbol: String,
    pub aggregated_trade_id: i64,
    pub price: f64,
    pub quantity: f64,
    pub first_trade_id: i64,
    pub last_trade_id: i64,
    pub trade_time: DateTime<Utc>,

    /// The buyer was the maker, i.e. the taker sold.
    pub buyer_market_maker: bool,

    pub best_price_match: bool,

    /// `trade_time` floored to the minute; links the trade to its 1m kline.
    pub kline_open_time: DateTime<Utc>,
}

/// Parsed output of one remote call.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketRecord {
    Kline(Kline),
    AggregatedTrade(AggregatedTrade),
}

impl MarketRecord {
    /// The record's own timestamp. Buffers are in completion order, so
    /// consumers needing temporal order sort by this.
    pub fn event_time(&self) -> DateTime<Utc> {
        match self {
            Self::Kline(k) => k.open_time,
            Self::AggregatedTrade(t) => t.trade_time,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Self::Kline(k) => &k.symbol,
            Self::AggregatedTrade(t) => &t.symbol,
        }
    }
}

/// Floors a timestamp to the start of its UTC minute.
pub fn minute_floor(ts: DateTime<Utc>) -> DateTime<Utc> {
    // Truncation by a whole minute can't overflow for any representable instant.
    ts.duration_trunc(TimeDelta::minutes(1)).unwrap_or(ts)
}
