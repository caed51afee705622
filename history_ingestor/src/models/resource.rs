use std::num::NonZeroU32;

use nonzero_ext::nonzero;

use crate::models::interval::KlineInterval;

/// Maximum page size the exchange accepts for both endpoints.
pub const MAX_LIMIT: u16 = 1000;

/// What a pass is fetching. Each variant maps to one REST endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Klines {
        symbol: String,
        interval: KlineInterval,
        limit: u16,
    },
    AggTrades {
        symbol: String,
        limit: u16,
        /// Number of sequential calls issued per window (each covers an equal slice).
        sub_calls: NonZeroU32,
    },
}

impl Resource {
    pub fn klines(symbol: impl Into<String>, interval: KlineInterval) -> Self {
        Self::Klines {
            symbol: normalize_symbol(symbol),
            interval,
            limit: MAX_LIMIT,
        }
    }

    /// Aggregated trades, two half-window calls per window.
    pub fn agg_trades(symbol: impl Into<String>) -> Self {
        Self::AggTrades {
            symbol: normalize_symbol(symbol),
            limit: MAX_LIMIT,
            sub_calls: nonzero!(2u32),
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Self::Klines { symbol, .. } | Self::AggTrades { symbol, .. } => symbol,
        }
    }

    pub fn limit(&self) -> u16 {
        match self {
            Self::Klines { limit, .. } | Self::AggTrades { limit, .. } => *limit,
        }
    }

    /// Path segment relative to the API base url.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Klines { .. } => "klines",
            Self::AggTrades { .. } => "aggTrades",
        }
    }

    pub fn sub_calls(&self) -> u32 {
        match self {
            Self::Klines { .. } => 1,
            Self::AggTrades { sub_calls, .. } => sub_calls.get(),
        }
    }

    /// Stable key used to track pass progress, e.g. `klines:ETHUSDT:1s`.
    pub fn dataset_key(&self) -> String {
        match self {
            Self::Klines {
                symbol, interval, ..
            } => format!("klines:{symbol}:{interval}"),
            Self::AggTrades { symbol, .. } => format!("aggTrades:{symbol}"),
        }
    }
}

fn normalize_symbol(symbol: impl Into<String>) -> String {
    symbol.into().trim().to_ascii_uppercase()
}
