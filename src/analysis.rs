use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use thiserror::Error;
use tracing::debug;

use crate::types::recommendation::{Recommendation, RecommendationType};
use crate::types::region::MarketRegion;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("market data collection failed: {0}")]
    DataCollection(String),

    #[error("recommendation scoring failed: {0}")]
    Scoring(String),
}

/// External stock-scoring collaborator. Shared across all region loops, so
/// implementations must tolerate concurrent calls.
#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    async fn execute_scheduled_analysis(
        &self,
        region: MarketRegion,
    ) -> Result<Vec<Recommendation>, AnalysisError>;
}

fn universe(region: MarketRegion) -> &'static [(&'static str, &'static str)] {
    match region {
        MarketRegion::China => &[
            ("600519.SS", "Kweichow Moutai"),
            ("601318.SS", "Ping An Insurance"),
            ("600036.SS", "China Merchants Bank"),
        ],
        MarketRegion::HongKong => &[
            ("0700.HK", "Tencent Holdings"),
            ("0005.HK", "HSBC Holdings"),
            ("1299.HK", "AIA Group"),
        ],
        MarketRegion::Usa => &[
            ("AAPL", "Apple"),
            ("MSFT", "Microsoft"),
            ("NVDA", "NVIDIA"),
        ],
    }
}

/// Stand-in engine for dry runs: emits a random handful of calls over a
/// fixed per-region symbol list.
#[derive(Debug, Default)]
pub struct SimulatedAnalysisEngine;

#[async_trait]
impl AnalysisEngine for SimulatedAnalysisEngine {
    async fn execute_scheduled_analysis(
        &self,
        region: MarketRegion,
    ) -> Result<Vec<Recommendation>, AnalysisError> {
        let symbols = universe(region);

        let recommendations: Vec<Recommendation> = {
            let mut rng = rand::rng();
            let count = rng.random_range(0..=symbols.len());

            symbols[..count]
                .iter()
                .map(|(symbol, name)| {
                    let kind = match rng.random_range(0..3) {
                        0 => RecommendationType::Buy,
                        1 => RecommendationType::Sell,
                        _ => RecommendationType::Hold,
                    };

                    Recommendation {
                        symbol: (*symbol).to_string(),
                        name: (*name).to_string(),
                        region,
                        kind,
                        confidence: rng.random_range(0.3..1.0),
                        target_price: Some(rng.random_range(10.0..500.0)),
                        generated_at: Utc::now(),
                    }
                })
                .collect()
        };

        debug!(
            region = %region,
            recommendations = recommendations.len(),
            "simulated analysis produced recommendations"
        );

        Ok(recommendations)
    }
}
