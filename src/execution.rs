use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::types::recommendation::Recommendation;
use crate::types::trade::Trade;

#[derive(Debug, Error)]
pub enum TradeError {
    #[error("order rejected: {0}")]
    Rejected(String),
}

/// External order-execution collaborator. Shared across all region loops.
///
/// `Ok(None)` means the recommendation was deliberately skipped (hold call,
/// low confidence, unusable price); only `Err` counts as a trade failure.
#[async_trait]
pub trait TradeExecutor: Send + Sync {
    async fn execute_recommendation(
        &self,
        recommendation: &Recommendation,
    ) -> Result<Option<Trade>, TradeError>;
}

const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;
const ORDER_NOTIONAL: f64 = 10_000.0;

/// Paper executor: fills immediately, rejecting roughly one order in ten.
#[derive(Debug)]
pub struct DryRunTradeExecutor {
    confidence_threshold: f64,
}

impl Default for DryRunTradeExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

impl DryRunTradeExecutor {
    pub fn new(confidence_threshold: f64) -> Self {
        Self {
            confidence_threshold,
        }
    }
}

#[async_trait]
impl TradeExecutor for DryRunTradeExecutor {
    async fn execute_recommendation(
        &self,
        recommendation: &Recommendation,
    ) -> Result<Option<Trade>, TradeError> {
        if !recommendation.is_actionable() {
            debug!(symbol = %recommendation.symbol, "hold recommendation, nothing to execute");
            return Ok(None);
        }

        if recommendation.confidence < self.confidence_threshold {
            debug!(
                symbol = %recommendation.symbol,
                confidence = recommendation.confidence,
                threshold = self.confidence_threshold,
                "skipping low-confidence recommendation"
            );
            return Ok(None);
        }

        let price = match recommendation.target_price {
            Some(price) if price > 0.0 && price.is_finite() => price,
            _ => {
                warn!(symbol = %recommendation.symbol, "no usable price, skipping");
                return Ok(None);
            }
        };

        let will_reject = {
            let mut rng = rand::rng();
            rng.random_range(0..10) == 0
        };
        if will_reject {
            return Err(TradeError::Rejected(format!(
                "paper venue rejected {}",
                recommendation.symbol
            )));
        }

        let quantity = ((ORDER_NOTIONAL / price).floor() as u32).max(1);
        let trade = Trade {
            id: Uuid::new_v4(),
            symbol: recommendation.symbol.clone(),
            region: recommendation.region,
            side: recommendation.kind,
            quantity,
            price,
            executed_at: Utc::now(),
        };

        info!(
            trade_id = %trade.id,
            symbol = %trade.symbol,
            quantity = trade.quantity,
            price = trade.price,
            "dry-run trade filled"
        );

        Ok(Some(trade))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::types::recommendation::RecommendationType;
    use crate::types::region::MarketRegion;

    fn recommendation(kind: RecommendationType, confidence: f64, price: Option<f64>) -> Recommendation {
        Recommendation {
            symbol: "AAPL".to_string(),
            name: "Apple".to_string(),
            region: MarketRegion::Usa,
            kind,
            confidence,
            target_price: price,
            generated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_hold_recommendations_are_skipped() {
        let executor = DryRunTradeExecutor::default();
        let result = executor
            .execute_recommendation(&recommendation(RecommendationType::Hold, 0.99, Some(100.0)))
            .await
            .unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_low_confidence_is_skipped_not_failed() {
        let executor = DryRunTradeExecutor::new(0.9);
        let result = executor
            .execute_recommendation(&recommendation(RecommendationType::Buy, 0.5, Some(100.0)))
            .await
            .unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_missing_price_is_skipped() {
        let executor = DryRunTradeExecutor::new(0.0);
        let result = executor
            .execute_recommendation(&recommendation(RecommendationType::Sell, 0.99, None))
            .await
            .unwrap();

        assert!(result.is_none());
    }
}
