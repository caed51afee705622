//! Diesel row types for the history tables in [`crate::schema`].
//!
//! Timestamps are stored as RFC 3339 UTC text with millisecond precision (see
//! [`crate::tz::to_rfc3339_millis`]), so they sort lexicographically.

use diesel::prelude::*;
use history_ingestor::models::{AggregatedTrade, Kline};

use crate::{
    schema::{aggregated_trade_data, ingest_watermark, kline_data},
    tz,
};

/// A stored candle.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = kline_data, check_for_backend(diesel::sqlite::Sqlite))]
pub struct KlineRow {
    pub id: Option<i32>,
    pub symbol: String,
    pub interval: String,
    pub open_time: String,
    pub close_time: String,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub close_price: f64,
    pub volume: f64,
    pub quote_asset_volume: f64,
    pub number_of_trades: i64,
    pub taker_buy_base_volume: f64,
    pub taker_buy_quote_volume: f64,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = kline_data)]
pub struct NewKlineRow {
    pub symbol: String,
    pub interval: String,
    pub open_time: String,
    pub close_time: String,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub close_price: f64,
    pub volume: f64,
    pub quote_asset_volume: f64,
    pub number_of_trades: i64,
    pub taker_buy_base_volume: f64,
    pub taker_buy_quote_volume: f64,
}

impl From<&Kline> for NewKlineRow {
    fn from(k: &Kline) -> Self {
        Self {
            symbol: k.symbol.clone(),
            interval: k.interval.as_str().to_string(),
            open_time: tz::to_rfc3339_millis(k.open_time),
            close_time: tz::to_rfc3339_millis(k.close_time),
            open_price: k.open,
            high_price: k.high,
            low_price: k.low,
            close_price: k.close,
            volume: k.volume,
            quote_asset_volume: k.quote_asset_volume,
            // Trade counts per candle are far below i64::MAX.
            number_of_trades: i64::try_from(k.number_of_trades).unwrap_or(i64::MAX),
            taker_buy_base_volume: k.taker_buy_base_volume,
            taker_buy_quote_volume: k.taker_buy_quote_volume,
        }
    }
}

/// A stored aggregated trade.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = aggregated_trade_data, check_for_backend(diesel::sqlite::Sqlite))]
pub struct TradeRow {
    pub id: Option<i32>,
    pub symbol: String,
    pub aggregated_trade_id: i64,
    pub price: f64,
    pub quantity: f64,
    pub first_trade_id: i64,
    pub last_trade_id: i64,
    pub trade_time: String,
    /// Open time of the 1m kline the trade falls into.
    pub kline_open_time: String,
    pub buyer_market_maker: bool,
    pub best_price_match: bool,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = aggregated_trade_data)]
pub struct NewTradeRow {
    pub symbol: String,
    pub aggregated_trade_id: i64,
    pub price: f64,
    pub quantity: f64,
    pub first_trade_id: i64,
    pub last_trade_id: i64,
    pub trade_time: String,
    pub kline_open_time: String,
    pub buyer_market_maker: bool,
    pub best_price_match: bool,
}

impl From<&AggregatedTrade> for NewTradeRow {
    fn from(t: &AggregatedTrade) -> Self {
        Self {
            symbol: t.symbol.clone(),
            aggregated_trade_id: t.aggregated_trade_id,
            price: t.price,
            quantity: t.quantity,
            first_trade_id: t.first_trade_id,
            last_trade_id: t.last_trade_id,
            trade_time: tz::to_rfc3339_millis(t.trade_time),
            kline_open_time: tz::to_rfc3339_millis(t.kline_open_time),
            buyer_market_maker: t.buyer_market_maker,
            best_price_match: t.best_price_match,
        }
    }
}

/// Progress of one dataset.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = ingest_watermark, check_for_backend(diesel::sqlite::Sqlite))]
pub struct WatermarkRow {
    pub dataset: String,
    pub covered_from: String,
    pub watermark: String,
    pub last_error: Option<String>,
    pub updated_at: String,
}
