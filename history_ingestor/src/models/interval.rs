use std::{fmt, str::FromStr};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Kline interval codes understood by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KlineInterval {
    #[serde(rename = "1s")]
    OneSecond,
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "3m")]
    ThreeMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "2h")]
    TwoHours,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "8h")]
    EightHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "3d")]
    ThreeDays,
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
}

#[derive(Debug, Snafu)]
#[snafu(display("unknown kline interval {value:?}"))]
pub struct UnknownIntervalError {
    pub value: String,
}

const ALL: [KlineInterval; 16] = [
    KlineInterval::OneSecond,
    KlineInterval::OneMinute,
    KlineInterval::ThreeMinutes,
    KlineInterval::FiveMinutes,
    KlineInterval::FifteenMinutes,
    KlineInterval::ThirtyMinutes,
    KlineInterval::OneHour,
    KlineInterval::TwoHours,
    KlineInterval::FourHours,
    KlineInterval::SixHours,
    KlineInterval::EightHours,
    KlineInterval::TwelveHours,
    KlineInterval::OneDay,
    KlineInterval::ThreeDays,
    KlineInterval::OneWeek,
    KlineInterval::OneMonth,
];

impl KlineInterval {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneSecond => "1s",
            Self::OneMinute => "1m",
            Self::ThreeMinutes => "3m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1h",
            Self::TwoHours => "2h",
            Self::FourHours => "4h",
            Self::SixHours => "6h",
            Self::EightHours => "8h",
            Self::TwelveHours => "12h",
            Self::OneDay => "1d",
            Self::ThreeDays => "3d",
            Self::OneWeek => "1w",
            Self::OneMonth => "1M",
        }
    }

    /// Fixed width of one kline. Calendar months have no fixed width.
    pub fn duration(self) -> Option<Duration> {
        let secs = match self {
            Self::OneSecond => 1,
            Self::OneMinute => 60,
            Self::ThreeMinutes => 3 * 60,
            Self::FiveMinutes => 5 * 60,
            Self::FifteenMinutes => 15 * 60,
            Self::ThirtyMinutes => 30 * 60,
            Self::OneHour => 3_600,
            Self::TwoHours => 2 * 3_600,
            Self::FourHours => 4 * 3_600,
            Self::SixHours => 6 * 3_600,
            Self::EightHours => 8 * 3_600,
            Self::TwelveHours => 12 * 3_600,
            Self::OneDay => 86_400,
            Self::ThreeDays => 3 * 86_400,
            Self::OneWeek => 7 * 86_400,
            Self::OneMonth => return None,
        };
        Some(Duration::seconds(secs))
    }
}

impl fmt::Display for KlineInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KlineInterval {
    type Err = UnknownIntervalError;

    // Case matters: "1m" is a minute, "1M" a month.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ALL.into_iter()
            .find(|i| i.as_str() == s)
            .ok_or_else(|| UnknownIntervalError {
                value: s.to_string(),
            })
    }
}
