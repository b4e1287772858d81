//! OHLC candles and the chart intervals venues serve them at. Never persisted.

use crate::domain::{Decimal, TimeMs};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Candle width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChartInterval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
}

impl ChartInterval {
    pub const ALL: [ChartInterval; 7] = [
        ChartInterval::OneMinute,
        ChartInterval::FiveMinutes,
        ChartInterval::FifteenMinutes,
        ChartInterval::ThirtyMinutes,
        ChartInterval::OneHour,
        ChartInterval::FourHours,
        ChartInterval::OneDay,
    ];

    /// Wire key shared by both venues, e.g. `"15m"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartInterval::OneMinute => "1m",
            ChartInterval::FiveMinutes => "5m",
            ChartInterval::FifteenMinutes => "15m",
            ChartInterval::ThirtyMinutes => "30m",
            ChartInterval::OneHour => "1h",
            ChartInterval::FourHours => "4h",
            ChartInterval::OneDay => "1d",
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.as_str() == key.trim())
    }

    pub fn seconds(&self) -> i64 {
        match self {
            ChartInterval::OneMinute => 60,
            ChartInterval::FiveMinutes => 300,
            ChartInterval::FifteenMinutes => 900,
            ChartInterval::ThirtyMinutes => 1_800,
            ChartInterval::OneHour => 3_600,
            ChartInterval::FourHours => 14_400,
            ChartInterval::OneDay => 86_400,
        }
    }

    /// Start of the bucket containing `time`, on whole seconds.
    pub fn bucket_start(&self, time: TimeMs) -> TimeMs {
        let secs = time.as_ms().div_euclid(1000);
        TimeMs::new((secs - secs.rem_euclid(self.seconds())) * 1000)
    }
}

impl fmt::Display for ChartInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One OHLC bar. `time` is the bucket start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    pub time: TimeMs,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Zero where the venue does not report volume.
    pub volume: Decimal,
}
