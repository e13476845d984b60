use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::types::region::MarketRegion;

/// Outcome of one data-fetch -> analysis -> trade-execution pass for a
/// region. Immutable once built.
#[derive(Debug, Clone)]
pub struct AnalysisCycleResult {
    pub success: bool,
    pub region: MarketRegion,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub recommendations_count: u32,
    pub trades_executed: u32,
    pub error_message: Option<String>,
}

impl AnalysisCycleResult {
    pub fn failure(
        region: MarketRegion,
        start_time: DateTime<Utc>,
        error_message: String,
    ) -> Self {
        Self {
            success: false,
            region,
            start_time,
            end_time: Utc::now(),
            recommendations_count: 0,
            trades_executed: 0,
            error_message: Some(error_message),
        }
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }
}

/// Read-only snapshot of one region's monitoring state.
#[derive(Debug, Clone, Serialize)]
pub struct MonitoringStatus {
    pub region: MarketRegion,
    pub is_active: bool,
    pub is_paused: bool,
    pub pause_reason: Option<String>,
    pub pause_until: Option<DateTime<Utc>>,
    pub last_cycle_time: Option<DateTime<Utc>>,
    pub next_cycle_time: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub total_cycles_today: u32,
}

impl MonitoringStatus {
    fn blank(region: MarketRegion, is_active: bool) -> Self {
        Self {
            region,
            is_active,
            is_paused: false,
            pause_reason: None,
            pause_until: None,
            last_cycle_time: None,
            next_cycle_time: None,
            consecutive_failures: 0,
            total_cycles_today: 0,
        }
    }

    /// Status reported for a region with no running loop.
    pub fn inactive(region: MarketRegion) -> Self {
        Self::blank(region, false)
    }

    /// Initial status published when a loop is spawned, before its first
    /// iteration.
    pub fn starting(region: MarketRegion) -> Self {
        Self::blank(region, true)
    }
}
