use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// A regional stock market with its own hours, timezone and holidays.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegion {
    China,
    HongKong,
    Usa,
}

impl MarketRegion {
    pub const ALL: [MarketRegion; 3] = [
        MarketRegion::China,
        MarketRegion::HongKong,
        MarketRegion::Usa,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketRegion::China => "china",
            MarketRegion::HongKong => "hong_kong",
            MarketRegion::Usa => "usa",
        }
    }
}

impl fmt::Display for MarketRegion {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.as_str())
    }
}
