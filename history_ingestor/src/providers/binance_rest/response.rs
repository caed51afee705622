use serde::{Deserialize, de::IgnoredAny};

/// One kline as the exchange sends it: a fixed-arity JSON array.
///
/// `[openTime, open, high, low, close, volume, closeTime, quoteVolume,
///   trades, takerBuyBase, takerBuyQuote, ignore]`
#[derive(Deserialize, Debug)]
pub struct BinanceKline(
    pub i64,
    pub String,
    pub String,
    pub String,
    pub String,
    pub String,
    pub i64,
    pub String,
    pub u64,
    pub String,
    pub String,
    pub IgnoredAny,
);

#[derive(Deserialize, Debug)]
pub struct BinanceAggTrade {
    #[serde(rename = "a")]
    pub aggregated_trade_id: i64,
    #[serde(rename = "p")]
    pub price: String,
    #[serde(rename = "q")]
    pub quantity: String,
    #[serde(rename = "f")]
    pub first_trade_id: i64,
    #[serde(rename = "l")]
    pub last_trade_id: i64,
    #[serde(rename = "T")]
    pub trade_time: i64,
    #[serde(rename = "m")]
    pub buyer_market_maker: bool,
    #[serde(rename = "M")]
    pub best_price_match: bool,
}

/// Error payload the exchange sends with non-2xx statuses.
#[derive(Deserialize, Debug)]
pub struct BinanceErrorBody {
    pub code: i64,
    pub msg: String,
}
