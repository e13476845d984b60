use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::analysis::AnalysisEngine;
use crate::config::ConfigurationManager;
use crate::execution::TradeExecutor;
use crate::hours::MarketCalendar;
use crate::monitor::models::{AnalysisCycleResult, MonitoringStatus};
use crate::monitor::region_state::{MarketEdge, RegionState};
use crate::types::region::MarketRegion;

pub(crate) struct RegionLoopContext {
    pub region: MarketRegion,
    pub calendar: Arc<dyn MarketCalendar>,
    pub engine: Arc<dyn AnalysisEngine>,
    pub executor: Arc<dyn TradeExecutor>,
    pub config: Arc<ConfigurationManager>,
    pub poll_interval: StdDuration,
    pub shutdown: watch::Receiver<bool>,
    pub status: watch::Sender<MonitoringStatus>,
}

/// One region's control loop. Polls openness and pause expiry every
/// `poll_interval`, runs at most one cycle at a time, and publishes a status
/// snapshot after every iteration.
pub(crate) async fn run_region_loop(mut ctx: RegionLoopContext) {
    let mut state = RegionState::new(ctx.region);
    info!(region = %ctx.region, "monitoring loop started");

    loop {
        if *ctx.shutdown.borrow() {
            break;
        }

        // Immutable config snapshot per iteration; a reconfiguration becomes
        // visible here, never mid-cycle.
        let config = ctx.config.get_intraday_config();
        if !config.enabled || !config.monitored_regions.contains(&ctx.region) {
            info!(region = %ctx.region, "region no longer configured, loop exiting");
            break;
        }
        let interval = Duration::minutes(i64::from(config.interval_minutes));

        let now = Utc::now();

        match ctx.calendar.local_date(ctx.region, now) {
            Ok(date) => state.observe_local_date(date),
            Err(error) => {
                warn!(region = %ctx.region, %error, "could not resolve local market date")
            }
        }

        let market_open = match ctx.calendar.is_market_open(ctx.region, now) {
            Ok(open) => open,
            Err(error) => {
                // Fail-safe closed: skip the cycle and retry next poll. Does
                // not count toward the circuit breaker.
                error!(
                    region = %ctx.region,
                    %error,
                    "market status check failed, assuming closed"
                );
                false
            }
        };

        if state.try_resume(now, market_open) {
            info!(region = %ctx.region, "pause elapsed, monitoring resumed");
        }

        match state.observe_market(market_open) {
            Some(MarketEdge::Opened) => info!(region = %ctx.region, "market opened"),
            Some(MarketEdge::Closed) => info!(region = %ctx.region, "market closed"),
            None => {}
        }

        if state.should_run_cycle(now) {
            let result =
                execute_analysis_cycle(ctx.engine.as_ref(), ctx.executor.as_ref(), ctx.region)
                    .await;

            let now = Utc::now();
            let outcome = state.record_result(&result, now, interval);

            if outcome.overran {
                warn!(
                    region = %ctx.region,
                    interval_minutes = config.interval_minutes,
                    cycle_seconds = result.duration().num_seconds(),
                    "cycle overran the monitoring interval, next cycle due immediately"
                );
            }

            if let Some(until) = outcome.paused_until {
                warn!(
                    region = %ctx.region,
                    pause_until = %until,
                    reason = state.pause_reason().unwrap_or("unknown"),
                    "circuit breaker tripped, monitoring paused"
                );
            }
        }

        ctx.status.send_replace(state.snapshot(true));

        tokio::select! {
            _ = tokio::time::sleep(ctx.poll_interval) => {}
            _ = ctx.shutdown.changed() => {}
        }
    }

    ctx.status.send_replace(state.snapshot(false));
    info!(region = %ctx.region, "monitoring loop stopped");
}

/// Runs one analysis cycle: fetch recommendations, push the actionable ones
/// through the executor. A single failed trade is logged and skipped; only
/// an analysis/data failure makes the whole cycle fail.
pub(crate) async fn execute_analysis_cycle(
    engine: &dyn AnalysisEngine,
    executor: &dyn TradeExecutor,
    region: MarketRegion,
) -> AnalysisCycleResult {
    let start_time = Utc::now();
    info!(region = %region, "analysis cycle started");

    let recommendations = match engine.execute_scheduled_analysis(region).await {
        Ok(recommendations) => recommendations,
        Err(error) => {
            error!(region = %region, %error, "analysis cycle failed");
            return AnalysisCycleResult::failure(region, start_time, error.to_string());
        }
    };

    let recommendations_count = recommendations.len() as u32;
    let mut trades_executed = 0u32;

    for recommendation in &recommendations {
        if !recommendation.is_actionable() {
            continue;
        }

        match executor.execute_recommendation(recommendation).await {
            Ok(Some(trade)) => {
                trades_executed += 1;
                debug!(region = %region, symbol = %trade.symbol, trade_id = %trade.id, "trade executed");
            }
            Ok(None) => {
                debug!(region = %region, symbol = %recommendation.symbol, "recommendation skipped")
            }
            Err(error) => {
                // Isolated from the circuit breaker: keep going with the
                // remaining recommendations.
                error!(
                    region = %region,
                    symbol = %recommendation.symbol,
                    %error,
                    "trade execution failed, continuing"
                );
            }
        }
    }

    let end_time = Utc::now();
    let result = AnalysisCycleResult {
        success: true,
        region,
        start_time,
        end_time,
        recommendations_count,
        trades_executed,
        error_message: None,
    };

    info!(
        region = %region,
        recommendations = recommendations_count,
        trades = trades_executed,
        cycle_seconds = result.duration().num_seconds(),
        "analysis cycle completed"
    );

    result
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::analysis::AnalysisError;
    use crate::execution::TradeError;
    use crate::types::recommendation::{Recommendation, RecommendationType};
    use crate::types::trade::Trade;
    use uuid::Uuid;

    struct ScriptedEngine {
        kinds: Vec<RecommendationType>,
    }

    #[async_trait]
    impl AnalysisEngine for ScriptedEngine {
        async fn execute_scheduled_analysis(
            &self,
            region: MarketRegion,
        ) -> Result<Vec<Recommendation>, AnalysisError> {
            Ok(self
                .kinds
                .iter()
                .enumerate()
                .map(|(index, kind)| Recommendation {
                    symbol: format!("SYM{index}"),
                    name: format!("Symbol {index}"),
                    region,
                    kind: *kind,
                    confidence: 0.95,
                    target_price: Some(100.0),
                    generated_at: Utc::now(),
                })
                .collect())
        }
    }

    struct FailingEngine;

    #[async_trait]
    impl AnalysisEngine for FailingEngine {
        async fn execute_scheduled_analysis(
            &self,
            _region: MarketRegion,
        ) -> Result<Vec<Recommendation>, AnalysisError> {
            Err(AnalysisError::DataCollection(
                "quote feed unavailable".to_string(),
            ))
        }
    }

    /// Fails the order for one symbol index, fills the rest.
    struct FlakyExecutor {
        fail_index: u32,
        calls: AtomicU32,
    }

    impl FlakyExecutor {
        fn failing_on(fail_index: u32) -> Self {
            Self {
                fail_index,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl TradeExecutor for FlakyExecutor {
        async fn execute_recommendation(
            &self,
            recommendation: &Recommendation,
        ) -> Result<Option<Trade>, TradeError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == self.fail_index {
                return Err(TradeError::Rejected(format!(
                    "venue refused {}",
                    recommendation.symbol
                )));
            }

            Ok(Some(Trade {
                id: Uuid::new_v4(),
                symbol: recommendation.symbol.clone(),
                region: recommendation.region,
                side: recommendation.kind,
                quantity: 1,
                price: 100.0,
                executed_at: Utc::now(),
            }))
        }
    }

    #[tokio::test]
    async fn test_one_failed_trade_does_not_fail_the_cycle() {
        let engine = ScriptedEngine {
            kinds: vec![
                RecommendationType::Buy,
                RecommendationType::Sell,
                RecommendationType::Buy,
            ],
        };
        let executor = FlakyExecutor::failing_on(1);

        let result = execute_analysis_cycle(&engine, &executor, MarketRegion::Usa).await;

        assert!(result.success);
        assert_eq!(result.recommendations_count, 3);
        assert_eq!(result.trades_executed, 2);
        assert!(result.error_message.is_none());
    }

    #[tokio::test]
    async fn test_hold_recommendations_never_reach_the_executor() {
        let engine = ScriptedEngine {
            kinds: vec![
                RecommendationType::Hold,
                RecommendationType::Buy,
                RecommendationType::Hold,
            ],
        };
        let executor = FlakyExecutor::failing_on(u32::MAX);

        let result = execute_analysis_cycle(&engine, &executor, MarketRegion::China).await;

        assert!(result.success);
        assert_eq!(result.recommendations_count, 3);
        assert_eq!(result.trades_executed, 1);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_analysis_failure_produces_failed_result() {
        let executor = FlakyExecutor::failing_on(u32::MAX);

        let result =
            execute_analysis_cycle(&FailingEngine, &executor, MarketRegion::HongKong).await;

        assert!(!result.success);
        assert_eq!(result.recommendations_count, 0);
        assert_eq!(result.trades_executed, 0);
        assert!(result.error_message.unwrap().contains("quote feed unavailable"));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }
}
