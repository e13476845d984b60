use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::recommendation::RecommendationType;
use crate::types::region::MarketRegion;

/// A filled order produced by the trade executor from one recommendation.
#[derive(Debug, Clone)]
pub struct Trade {
    pub id: Uuid,
    pub symbol: String,
    pub region: MarketRegion,
    pub side: RecommendationType,
    pub quantity: u32,
    pub price: f64,
    pub executed_at: DateTime<Utc>,
}
