//! Raw exchange payloads to [`MarketRecord`]s. Pure: no I/O, no retries.

use chrono::{DateTime, TimeZone, Utc};
use snafu::{OptionExt, ResultExt, Snafu};

use crate::{
    models::{
        AggregatedTrade, Kline, KlineInterval, MarketRecord, Resource, record::minute_floor,
    },
    providers::{
        RawResponse,
        binance_rest::response::{BinanceAggTrade, BinanceKline},
    },
};

/// The payload does not have the shape the endpoint promises.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MalformedResponse {
    #[snafu(display("unexpected HTTP status {status}: {body}"))]
    UnexpectedStatus { status: u16, body: String },

    #[snafu(display("cannot decode {endpoint} payload: {source}"))]
    Decode {
        endpoint: &'static str,
        source: serde_json::Error,
    },

    #[snafu(display("field {field} is not a finite decimal: {value:?}"))]
    InvalidDecimal { field: &'static str, value: String },

    #[snafu(display("field {field} is not a valid millisecond timestamp: {ms}"))]
    InvalidTimestamp { field: &'static str, ms: i64 },
}

/// Parses one response of `resource` into records tagged with its symbol (and interval).
pub fn parse(resource: &Resource, raw: &RawResponse) -> Result<Vec<MarketRecord>, MalformedResponse> {
    match resource {
        Resource::Klines {
            symbol, interval, ..
        } => parse_klines(symbol, *interval, &raw.body),
        Resource::AggTrades { symbol, .. } => parse_agg_trades(symbol, &raw.body),
    }
}

pub fn parse_klines(
    symbol: &str,
    interval: KlineInterval,
    body: &str,
) -> Result<Vec<MarketRecord>, MalformedResponse> {
    let rows: Vec<BinanceKline> =
        serde_json::from_str(body).context(DecodeSnafu { endpoint: "klines" })?;

    rows.into_iter()
        .map(|row| {
            Ok(MarketRecord::Kline(Kline {
                symbol: symbol.to_string(),
                interval,
                open_time: millis("open_time", row.0)?,
                open: decimal("open", &row.1)?,
                high: decimal("high", &row.2)?,
                low: decimal("low", &row.3)?,
                close: decimal("close", &row.4)?,
                volume: decimal("volume", &row.5)?,
                close_time: millis("close_time", row.6)?,
                quote_asset_volume: decimal("quote_asset_volume", &row.7)?,
                number_of_trades: row.8,
                taker_buy_base_volume: decimal("taker_buy_base_volume", &row.9)?,
                taker_buy_quote_volume: decimal("taker_buy_quote_volume", &row.10)?,
            }))
        })
        .collect()
}

pub fn parse_agg_trades(symbol: &str, body: &str) -> Result<Vec<MarketRecord>, MalformedResponse> {
    let rows: Vec<BinanceAggTrade> =
        serde_json::from_str(body).context(DecodeSnafu { endpoint: "aggTrades" })?;

    rows.into_iter()
        .map(|row| {
            let trade_time = millis("trade_time", row.trade_time)?;
            Ok(MarketRecord::AggregatedTrade(AggregatedTrade {
                symbol: symbol.to_string(),
                aggregated_trade_id: row.aggregated_trade_id,
                price: decimal("price", &row.price)?,
                quantity: decimal("quantity", &row.quantity)?,
                first_trade_id: row.first_trade_id,
                last_trade_id: row.last_trade_id,
                trade_time,
                buyer_market_maker: row.buyer_market_maker,
                best_price_match: row.best_price_match,
                kline_open_time: minute_floor(trade_time),
            }))
        })
        .collect()
}

fn decimal(field: &'static str, value: &str) -> Result<f64, MalformedResponse> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .context(InvalidDecimalSnafu { field, value })
}

fn millis(field: &'static str, ms: i64) -> Result<DateTime<Utc>, MalformedResponse> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .context(InvalidTimestampSnafu { field, ms })
}
