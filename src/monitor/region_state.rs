use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::monitor::models::{AnalysisCycleResult, MonitoringStatus};
use crate::types::region::MarketRegion;

pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;
pub const PAUSE_MINUTES: i64 = 30;

/// Circuit-breaker state, with the pause data attached to the variant so the
/// "until/reason set together, cleared together" invariant holds by
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakerState {
    Active,
    Paused {
        until: DateTime<Utc>,
        reason: String,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MarketEdge {
    Opened,
    Closed,
}

/// What one recorded cycle changed, for the loop's logging.
#[derive(Debug, Clone)]
pub struct RecordOutcome {
    /// The cycle ran longer than the monitoring interval; the next cycle is
    /// due immediately.
    pub overran: bool,
    pub paused_until: Option<DateTime<Utc>>,
}

/// Per-region scheduling state. Owned exclusively by the region's own loop;
/// every transition takes `now` as an argument.
#[derive(Debug)]
pub struct RegionState {
    region: MarketRegion,
    breaker: BreakerState,
    consecutive_failures: u32,
    last_cycle_time: Option<DateTime<Utc>>,
    next_cycle_time: Option<DateTime<Utc>>,
    cycles_today: u32,
    cycles_today_date: Option<NaiveDate>,
    market_open: bool,
}

impl RegionState {
    pub fn new(region: MarketRegion) -> Self {
        Self {
            region,
            breaker: BreakerState::Active,
            consecutive_failures: 0,
            last_cycle_time: None,
            next_cycle_time: None,
            cycles_today: 0,
            cycles_today_date: None,
            market_open: false,
        }
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.breaker, BreakerState::Paused { .. })
    }

    pub fn pause_reason(&self) -> Option<&str> {
        match &self.breaker {
            BreakerState::Paused { reason, .. } => Some(reason),
            BreakerState::Active => None,
        }
    }

    /// Resets the daily cycle counter the first time an iteration sees a new
    /// local calendar date for this region.
    pub fn observe_local_date(&mut self, date: NaiveDate) {
        if self.cycles_today_date != Some(date) {
            self.cycles_today = 0;
            self.cycles_today_date = Some(date);
        }
    }

    /// Records the openness seen this iteration; returns an edge only on a
    /// transition. The open edge clears the schedule so the session's first
    /// cycle runs immediately.
    pub fn observe_market(&mut self, open: bool) -> Option<MarketEdge> {
        if open == self.market_open {
            return None;
        }

        self.market_open = open;
        if open {
            self.next_cycle_time = None;
            Some(MarketEdge::Opened)
        } else {
            Some(MarketEdge::Closed)
        }
    }

    /// Leaves Paused once the pause has lapsed and the market is open. The
    /// failure count restarts from zero, so a full run of fresh failures is
    /// needed to trip the breaker again.
    pub fn try_resume(&mut self, now: DateTime<Utc>, market_open: bool) -> bool {
        match &self.breaker {
            BreakerState::Paused { until, .. } if now >= *until && market_open => {
                self.breaker = BreakerState::Active;
                self.consecutive_failures = 0;
                true
            }
            _ => false,
        }
    }

    pub fn should_run_cycle(&self, now: DateTime<Utc>) -> bool {
        self.breaker == BreakerState::Active
            && self.market_open
            && self.next_cycle_time.is_none_or(|due| now >= due)
    }

    pub fn record_result(
        &mut self,
        result: &AnalysisCycleResult,
        now: DateTime<Utc>,
        interval: Duration,
    ) -> RecordOutcome {
        self.last_cycle_time = Some(result.end_time);

        let due = result.end_time + interval;
        let overran = due < now;
        self.next_cycle_time = Some(if overran { now } else { due });

        if result.success {
            self.consecutive_failures = 0;
            self.cycles_today += 1;
            return RecordOutcome {
                overran,
                paused_until: None,
            };
        }

        self.consecutive_failures += 1;

        let paused_until = if self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES
            && self.breaker == BreakerState::Active
        {
            let until = now + Duration::minutes(PAUSE_MINUTES);
            let reason = format!(
                "{} consecutive failures: {}",
                self.consecutive_failures,
                result.error_message.as_deref().unwrap_or("unknown error")
            );
            self.breaker = BreakerState::Paused { until, reason };
            Some(until)
        } else {
            None
        };

        RecordOutcome {
            overran,
            paused_until,
        }
    }

    pub fn snapshot(&self, is_active: bool) -> MonitoringStatus {
        let (pause_until, pause_reason) = match &self.breaker {
            BreakerState::Paused { until, reason } => (Some(*until), Some(reason.clone())),
            BreakerState::Active => (None, None),
        };

        MonitoringStatus {
            region: self.region,
            is_active,
            is_paused: self.is_paused(),
            pause_reason,
            pause_until,
            last_cycle_time: self.last_cycle_time,
            next_cycle_time: self.next_cycle_time,
            consecutive_failures: self.consecutive_failures,
            total_cycles_today: self.cycles_today,
        }
    }
}
