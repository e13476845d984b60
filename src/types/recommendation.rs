use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::region::MarketRegion;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    Buy,
    Sell,
    Hold,
}

/// A buy/sell/hold call produced by the analysis engine for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub symbol: String,
    pub name: String,
    pub region: MarketRegion,
    pub kind: RecommendationType,

    /// 0.0 to 1.0
    pub confidence: f64,

    /// Indicative execution price in the market's local currency.
    pub target_price: Option<f64>,

    pub generated_at: DateTime<Utc>,
}

impl Recommendation {
    /// Hold calls never reach the trade executor.
    pub fn is_actionable(&self) -> bool {
        !matches!(self.kind, RecommendationType::Hold)
    }
}
