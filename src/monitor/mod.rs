pub mod models;
mod region_loop;
mod region_state;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::analysis::AnalysisEngine;
use crate::config::ConfigurationManager;
use crate::execution::TradeExecutor;
use crate::hours::MarketCalendar;
use crate::monitor::region_loop::RegionLoopContext;
use crate::types::region::MarketRegion;

pub use models::{AnalysisCycleResult, MonitoringStatus};

/// Cadence of the state checks (open/close edges, pause expiry, shutdown);
/// the configured interval only governs cycle spacing.
const POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Total budget stop_monitoring spends waiting for loops to drain.
const SHUTDOWN_BUDGET: Duration = Duration::from_secs(30);

struct RegionHandle {
    join: JoinHandle<()>,
    status: watch::Receiver<MonitoringStatus>,
}

/// Owns one autonomous monitoring loop per configured region. The analysis
/// engine and trade executor are shared singletons; each loop keeps its own
/// state and publishes snapshots over a watch channel.
pub struct IntradayMonitor {
    calendar: Arc<dyn MarketCalendar>,
    engine: Arc<dyn AnalysisEngine>,
    executor: Arc<dyn TradeExecutor>,
    config: Arc<ConfigurationManager>,
    poll_interval: Duration,
    shutdown: watch::Sender<bool>,
    regions: HashMap<MarketRegion, RegionHandle>,
}

impl IntradayMonitor {
    pub fn new(
        calendar: Arc<dyn MarketCalendar>,
        engine: Arc<dyn AnalysisEngine>,
        executor: Arc<dyn TradeExecutor>,
        config: Arc<ConfigurationManager>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);

        Self {
            calendar,
            engine,
            executor,
            config,
            poll_interval: POLL_INTERVAL,
            shutdown,
            regions: HashMap::new(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Spawns one loop per enabled region. Calling it again while running is
    /// a no-op for regions that already have a live loop.
    pub fn start_monitoring(&mut self) -> Result<()> {
        let config = self.config.get_intraday_config();

        if !config.enabled {
            info!("intraday monitoring is disabled in configuration");
            return Ok(());
        }

        if config.monitored_regions.is_empty() {
            warn!("no regions configured for intraday monitoring");
            return Ok(());
        }

        self.shutdown.send_replace(false);

        for region in config.monitored_regions {
            if let Some(handle) = self.regions.get(&region) {
                if !handle.join.is_finished() {
                    warn!(region = %region, "monitoring already active");
                    continue;
                }
            }

            let (status_sender, status_receiver) =
                watch::channel(MonitoringStatus::starting(region));

            let context = RegionLoopContext {
                region,
                calendar: Arc::clone(&self.calendar),
                engine: Arc::clone(&self.engine),
                executor: Arc::clone(&self.executor),
                config: Arc::clone(&self.config),
                poll_interval: self.poll_interval,
                shutdown: self.shutdown.subscribe(),
                status: status_sender,
            };

            let join = tokio::spawn(region_loop::run_region_loop(context));
            self.regions.insert(
                region,
                RegionHandle {
                    join,
                    status: status_receiver,
                },
            );

            info!(
                region = %region,
                interval_minutes = config.interval_minutes,
                "started monitoring loop"
            );
        }

        Ok(())
    }

    /// Signals every loop to stop and waits up to 30 seconds in total for
    /// them to drain. A loop whose cycle is still running past the budget is
    /// abandoned, not killed.
    pub async fn stop_monitoring(&mut self) {
        info!("stopping intraday monitoring");
        self.shutdown.send_replace(true);

        let deadline = tokio::time::Instant::now() + SHUTDOWN_BUDGET;

        for (region, handle) in self.regions.drain() {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());

            match tokio::time::timeout(remaining, handle.join).await {
                Ok(_) => info!(region = %region, "monitoring loop stopped"),
                Err(_) => warn!(
                    region = %region,
                    "monitoring loop did not stop within budget, abandoning it"
                ),
            }
        }

        info!("intraday monitoring stopped");
    }

    /// Atomic snapshot of one region's state, safe to call while the
    /// owning loop keeps writing.
    pub fn get_monitoring_status(&self, region: MarketRegion) -> MonitoringStatus {
        match self.regions.get(&region) {
            Some(handle) => handle.status.borrow().clone(),
            None => MonitoringStatus::inactive(region),
        }
    }

    pub fn active_regions(&self) -> Vec<MarketRegion> {
        self.regions
            .iter()
            .filter(|(_, handle)| !handle.join.is_finished())
            .map(|(region, _)| *region)
            .collect()
    }
}
