use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::RwLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::types::region::MarketRegion;

pub const MIN_INTERVAL_MINUTES: u32 = 15;
pub const MAX_INTERVAL_MINUTES: u32 = 240;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("monitoring interval must be between 15 and 240 minutes, got {0}")]
    IntervalOutOfRange(u32),

    #[error("at least one region must be monitored")]
    NoRegions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntradayConfig {
    /// Whether start_monitoring spawns any loops at all.
    pub enabled: bool,

    /// Minimum spacing between cycle starts per region, 15-240.
    pub interval_minutes: u32,

    pub monitored_regions: Vec<MarketRegion>,
}

impl Default for IntradayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: 60,
            monitored_regions: Vec::new(),
        }
    }
}

impl IntradayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES).contains(&self.interval_minutes) {
            return Err(ConfigError::IntervalOutOfRange(self.interval_minutes));
        }
        if self.monitored_regions.is_empty() {
            return Err(ConfigError::NoRegions);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub intraday: IntradayConfig,

    /// Market holidays per region as YYYY-MM-DD strings.
    #[serde(default)]
    pub market_holidays: HashMap<MarketRegion, Vec<String>>,
}

/// Owns the runtime configuration. Readers take whole-value snapshots;
/// writers validate first and swap atomically, so a rejected change leaves
/// the prior configuration untouched.
#[derive(Debug)]
pub struct ConfigurationManager {
    inner: RwLock<MonitorConfig>,
}

impl ConfigurationManager {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            inner: RwLock::new(config),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read monitor config {}", path.display()))?;

        let config: MonitorConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse monitor config {}", path.display()))?;

        if !(MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES).contains(&config.intraday.interval_minutes)
        {
            anyhow::bail!(
                "monitor config {}: {}",
                path.display(),
                ConfigError::IntervalOutOfRange(config.intraday.interval_minutes)
            );
        }

        info!(
            enabled = config.intraday.enabled,
            interval_minutes = config.intraday.interval_minutes,
            regions = ?config.intraday.monitored_regions,
            "loaded monitor configuration"
        );

        Ok(Self::new(config))
    }

    pub fn get_intraday_config(&self) -> IntradayConfig {
        self.inner.read().expect("config lock poisoned").intraday.clone()
    }

    pub fn set_intraday_config(&self, config: IntradayConfig) -> Result<(), ConfigError> {
        config.validate()?;

        let mut inner = self.inner.write().expect("config lock poisoned");
        inner.intraday = config;
        Ok(())
    }

    pub fn get_market_holidays(&self, region: MarketRegion) -> Vec<String> {
        self.inner
            .read()
            .expect("config lock poisoned")
            .market_holidays
            .get(&region)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_market_holidays(&self, region: MarketRegion, dates: Vec<String>) {
        let mut inner = self.inner.write().expect("config lock poisoned");
        inner.market_holidays.insert(region, dates);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> IntradayConfig {
        IntradayConfig {
            enabled: true,
            interval_minutes: 60,
            monitored_regions: vec![MarketRegion::Usa],
        }
    }

    #[test]
    fn test_interval_bounds() {
        let mut config = valid_config();

        config.interval_minutes = 14;
        assert_eq!(config.validate(), Err(ConfigError::IntervalOutOfRange(14)));

        config.interval_minutes = 15;
        assert!(config.validate().is_ok());

        config.interval_minutes = 240;
        assert!(config.validate().is_ok());

        config.interval_minutes = 241;
        assert_eq!(config.validate(), Err(ConfigError::IntervalOutOfRange(241)));
    }

    #[test]
    fn test_empty_regions_rejected() {
        let mut config = valid_config();
        config.monitored_regions.clear();

        assert_eq!(config.validate(), Err(ConfigError::NoRegions));
    }

    #[test]
    fn test_rejected_change_keeps_prior_config() {
        let manager = ConfigurationManager::new(MonitorConfig {
            intraday: valid_config(),
            market_holidays: HashMap::new(),
        });

        let mut bad = valid_config();
        bad.interval_minutes = 5;
        assert!(manager.set_intraday_config(bad).is_err());

        let current = manager.get_intraday_config();
        assert_eq!(current.interval_minutes, 60);
        assert_eq!(current.monitored_regions, vec![MarketRegion::Usa]);
    }

    #[test]
    fn test_accepted_change_is_visible_to_snapshots() {
        let manager = ConfigurationManager::new(MonitorConfig::default());

        let mut next = valid_config();
        next.interval_minutes = 30;
        next.monitored_regions = vec![MarketRegion::China, MarketRegion::HongKong];
        manager.set_intraday_config(next).unwrap();

        let current = manager.get_intraday_config();
        assert!(current.enabled);
        assert_eq!(current.interval_minutes, 30);
        assert_eq!(
            current.monitored_regions,
            vec![MarketRegion::China, MarketRegion::HongKong]
        );
    }

    #[test]
    fn test_yaml_document_parses() {
        let raw = r#"
intraday:
  enabled: true
  interval_minutes: 60
  monitored_regions: [china, hong_kong, usa]
market_holidays:
  usa:
    - "2024-07-04"
    - "2024-12-25"
"#;

        let config: MonitorConfig = serde_yaml::from_str(raw).unwrap();
        assert!(config.intraday.enabled);
        assert_eq!(config.intraday.monitored_regions.len(), 3);

        let manager = ConfigurationManager::new(config);
        assert_eq!(manager.get_market_holidays(MarketRegion::Usa).len(), 2);
        assert!(manager.get_market_holidays(MarketRegion::China).is_empty());
    }

    #[test]
    fn test_holiday_replacement_is_whole_set() {
        let manager = ConfigurationManager::new(MonitorConfig::default());

        manager.set_market_holidays(
            MarketRegion::China,
            vec!["2024-10-01".to_string(), "2024-10-02".to_string()],
        );
        manager.set_market_holidays(MarketRegion::China, vec!["2025-01-01".to_string()]);

        assert_eq!(
            manager.get_market_holidays(MarketRegion::China),
            vec!["2025-01-01".to_string()]
        );
    }
}
