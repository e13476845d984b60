mod analysis;
mod config;
mod execution;
mod hours;
mod monitor;
mod timezone;
mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::analysis::{AnalysisEngine, SimulatedAnalysisEngine};
use crate::config::ConfigurationManager;
use crate::execution::{DryRunTradeExecutor, TradeExecutor};
use crate::hours::MarketHoursDetector;
use crate::monitor::IntradayMonitor;
use crate::timezone::TimezoneConverter;

#[derive(Debug, Parser)]
#[command(name = "intraday", about = "Intraday market monitoring scheduler")]
struct Args {
    /// Monitor configuration file.
    #[arg(long, default_value = "intraday.yml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the monitoring loops and run until interrupted.
    Start,

    /// Stop monitoring. Loops live inside the start process, so this only
    /// points at the right place.
    Stop,

    /// Show the configuration and per-region monitoring status.
    Status {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("intraday=debug".parse().unwrap()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Start => start(args.config).await,
        Command::Stop => {
            anyhow::bail!(
                "monitoring loops run inside the `start` process; interrupt it with ctrl-c"
            )
        }
        Command::Status { json } => status(args.config, json),
    }
}

fn build_monitor(config: Arc<ConfigurationManager>) -> IntradayMonitor {
    let detector = Arc::new(MarketHoursDetector::new(
        TimezoneConverter::new(),
        Arc::clone(&config),
    ));
    let engine: Arc<dyn AnalysisEngine> = Arc::new(SimulatedAnalysisEngine);
    let executor: Arc<dyn TradeExecutor> = Arc::new(DryRunTradeExecutor::default());

    IntradayMonitor::new(detector, engine, executor, config)
}

async fn start(config_path: PathBuf) -> Result<()> {
    let config = Arc::new(ConfigurationManager::load(&config_path)?);
    let mut monitor = build_monitor(Arc::clone(&config));

    monitor.start_monitoring()?;
    if monitor.active_regions().is_empty() {
        info!("no monitoring loops running, nothing to do");
        return Ok(());
    }

    info!("monitoring running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    monitor.stop_monitoring().await;
    Ok(())
}

fn status(config_path: PathBuf, json: bool) -> Result<()> {
    let config = Arc::new(ConfigurationManager::load(&config_path)?);
    let detector = MarketHoursDetector::new(TimezoneConverter::new(), Arc::clone(&config));
    let monitor = build_monitor(Arc::clone(&config));
    let intraday = config.get_intraday_config();

    let statuses: Vec<_> = intraday
        .monitored_regions
        .iter()
        .map(|region| monitor.get_monitoring_status(*region))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    println!("intraday monitoring configuration");
    println!("  enabled:  {}", intraday.enabled);
    println!("  interval: {} minutes", intraday.interval_minutes);

    for status in statuses {
        let (open, close) = detector.market_hours(status.region);

        println!();
        println!("{}:", status.region);
        println!("  hours:  {open} - {close} local");
        println!("  active: {}", if status.is_active { "yes" } else { "no" });
        println!("  paused: {}", if status.is_paused { "yes" } else { "no" });

        if let Some(reason) = &status.pause_reason {
            println!("  pause reason: {reason}");
        }
        if let Some(until) = status.pause_until {
            println!("  pause until:  {until}");
        }

        match status.last_cycle_time {
            Some(at) => println!("  last cycle: {at}"),
            None => println!("  last cycle: never"),
        }
        match status.next_cycle_time {
            Some(at) => println!("  next cycle: {at}"),
            None => println!("  next cycle: not scheduled"),
        }

        println!("  consecutive failures: {}", status.consecutive_failures);
        println!("  cycles today: {}", status.total_cycles_today);
    }

    Ok(())
}
