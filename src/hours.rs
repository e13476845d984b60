use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use once_cell::sync::Lazy;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ConfigurationManager;
use crate::timezone::{MarketTimezone, TimezoneConverter, TimezoneError};
use crate::types::region::MarketRegion;

#[derive(Debug, Error)]
pub enum MarketHoursError {
    #[error("timezone conversion failed: {0}")]
    Timezone(#[from] TimezoneError),
}

/// Trading window of one region, in that market's local wall time.
#[derive(Debug, Copy, Clone)]
pub struct MarketHoursSpec {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub timezone: &'static str,
}

static MARKET_HOURS: Lazy<HashMap<MarketRegion, MarketHoursSpec>> = Lazy::new(|| {
    let at = |hour, minute| {
        NaiveTime::from_hms_opt(hour, minute, 0).expect("static market hours are valid times")
    };

    HashMap::from([
        (
            MarketRegion::China,
            MarketHoursSpec {
                open: at(9, 30),
                close: at(15, 0),
                timezone: "Asia/Shanghai",
            },
        ),
        (
            MarketRegion::HongKong,
            MarketHoursSpec {
                open: at(9, 30),
                close: at(16, 0),
                timezone: "Asia/Hong_Kong",
            },
        ),
        (
            MarketRegion::Usa,
            MarketHoursSpec {
                open: at(9, 30),
                close: at(16, 0),
                timezone: "America/New_York",
            },
        ),
    ])
});

fn market_hours_spec(region: MarketRegion) -> &'static MarketHoursSpec {
    MARKET_HOURS
        .get(&region)
        .expect("every MarketRegion has a market hours entry")
}

/// The openness questions the monitor loops ask every poll. Kept as a trait
/// so loop behavior can be exercised against fixed calendars in tests.
pub trait MarketCalendar: Send + Sync {
    fn is_market_open(
        &self,
        region: MarketRegion,
        at: DateTime<Utc>,
    ) -> Result<bool, MarketHoursError>;

    /// Calendar date at the market's location, for the daily cycle counter.
    fn local_date(
        &self,
        region: MarketRegion,
        at: DateTime<Utc>,
    ) -> Result<NaiveDate, MarketHoursError>;
}

/// Answers "is this market open now?" from the static hours table, the
/// weekend rule and the configured holiday sets.
pub struct MarketHoursDetector {
    timezone_converter: TimezoneConverter,
    config: Arc<ConfigurationManager>,
    holidays: RwLock<HashMap<MarketRegion, HashSet<NaiveDate>>>,
}

impl MarketHoursDetector {
    pub fn new(timezone_converter: TimezoneConverter, config: Arc<ConfigurationManager>) -> Self {
        Self {
            timezone_converter,
            config,
            holidays: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_market_open(
        &self,
        region: MarketRegion,
        at: DateTime<Utc>,
    ) -> Result<bool, MarketHoursError> {
        let spec = market_hours_spec(region);
        let zone = MarketTimezone::from_str(spec.timezone)?;
        let local = self.timezone_converter.utc_to_local(at, zone);

        if Self::is_weekend(local) {
            debug!(region = %region, %local, "market closed: weekend");
            return Ok(false);
        }

        if self.is_market_holiday(region, local.date()) {
            debug!(region = %region, date = %local.date(), "market closed: holiday");
            return Ok(false);
        }

        // Half-open window: the close minute itself is already closed.
        Ok(spec.open <= local.time() && local.time() < spec.close)
    }

    pub fn is_weekend(local: NaiveDateTime) -> bool {
        matches!(local.weekday(), Weekday::Sat | Weekday::Sun)
    }

    pub fn is_market_holiday(&self, region: MarketRegion, date: NaiveDate) -> bool {
        {
            let cache = self.holidays.read().expect("holiday cache poisoned");
            if let Some(set) = cache.get(&region) {
                return set.contains(&date);
            }
        }

        self.load_holidays(region);

        let cache = self.holidays.read().expect("holiday cache poisoned");
        cache.get(&region).is_some_and(|set| set.contains(&date))
    }

    /// Parses the configured holiday strings for `region` and swaps the
    /// region's set in one step. Malformed entries are logged and skipped
    /// without discarding the valid ones. Returns the loaded count.
    pub fn load_holidays(&self, region: MarketRegion) -> usize {
        let mut parsed = HashSet::new();

        for entry in self.config.get_market_holidays(region) {
            match NaiveDate::parse_from_str(&entry, "%Y-%m-%d") {
                Ok(date) => {
                    parsed.insert(date);
                }
                Err(error) => warn!(
                    region = %region,
                    entry,
                    %error,
                    "invalid holiday date, expected YYYY-MM-DD; entry skipped"
                ),
            }
        }

        let count = parsed.len();
        info!(region = %region, holidays = count, "loaded market holidays");

        let mut cache = self.holidays.write().expect("holiday cache poisoned");
        cache.insert(region, parsed);

        count
    }

    pub fn market_hours(&self, region: MarketRegion) -> (NaiveTime, NaiveTime) {
        let spec = market_hours_spec(region);
        (spec.open, spec.close)
    }
}

impl MarketCalendar for MarketHoursDetector {
    fn is_market_open(
        &self,
        region: MarketRegion,
        at: DateTime<Utc>,
    ) -> Result<bool, MarketHoursError> {
        MarketHoursDetector::is_market_open(self, region, at)
    }

    fn local_date(
        &self,
        region: MarketRegion,
        at: DateTime<Utc>,
    ) -> Result<NaiveDate, MarketHoursError> {
        let spec = market_hours_spec(region);
        let zone = MarketTimezone::from_str(spec.timezone)?;
        Ok(self.timezone_converter.utc_to_local(at, zone).date())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::config::MonitorConfig;

    fn detector_with_holidays(region: MarketRegion, holidays: Vec<&str>) -> MarketHoursDetector {
        let mut config = MonitorConfig::default();
        config
            .market_holidays
            .insert(region, holidays.into_iter().map(String::from).collect());

        MarketHoursDetector::new(
            TimezoneConverter::new(),
            Arc::new(ConfigurationManager::new(config)),
        )
    }

    fn detector() -> MarketHoursDetector {
        MarketHoursDetector::new(
            TimezoneConverter::new(),
            Arc::new(ConfigurationManager::new(MonitorConfig::default())),
        )
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_china_hours_close_is_exclusive() {
        let detector = detector();

        // Monday 2024-06-03, Shanghai is UTC+8.
        let local_10_00 = utc(2024, 6, 3, 2, 0);
        let local_14_59 = utc(2024, 6, 3, 6, 59);
        let local_15_00 = utc(2024, 6, 3, 7, 0);
        let local_16_00 = utc(2024, 6, 3, 8, 0);

        assert!(detector.is_market_open(MarketRegion::China, local_10_00).unwrap());
        assert!(detector.is_market_open(MarketRegion::China, local_14_59).unwrap());
        assert!(!detector.is_market_open(MarketRegion::China, local_15_00).unwrap());
        assert!(!detector.is_market_open(MarketRegion::China, local_16_00).unwrap());
    }

    #[test]
    fn test_weekends_close_every_region() {
        let detector = detector();

        // Saturday 2024-06-01 and Sunday 2024-06-02, mid-session local times.
        for region in MarketRegion::ALL {
            assert!(!detector.is_market_open(region, utc(2024, 6, 1, 14, 0)).unwrap());
            assert!(!detector.is_market_open(region, utc(2024, 6, 2, 14, 30)).unwrap());
        }
    }

    #[test]
    fn test_usa_holiday_closes_market() {
        let detector = detector_with_holidays(MarketRegion::Usa, vec!["2024-07-04"]);

        // Thursday 2024-07-04 10:00 New York (EDT) == 14:00 UTC.
        assert!(!detector.is_market_open(MarketRegion::Usa, utc(2024, 7, 4, 14, 0)).unwrap());

        // The Friday after is a normal session.
        assert!(detector.is_market_open(MarketRegion::Usa, utc(2024, 7, 5, 14, 0)).unwrap());
    }

    #[test]
    fn test_usa_hours_follow_dst_offset() {
        let detector = detector();

        // 2024-01-15 (EST): 09:00 local == 14:00 UTC is pre-open,
        // 09:30 local == 14:30 UTC is open.
        assert!(!detector.is_market_open(MarketRegion::Usa, utc(2024, 1, 15, 14, 0)).unwrap());
        assert!(detector.is_market_open(MarketRegion::Usa, utc(2024, 1, 15, 14, 30)).unwrap());

        // 2024-06-17 (EDT): 09:30 local == 13:30 UTC.
        assert!(detector.is_market_open(MarketRegion::Usa, utc(2024, 6, 17, 13, 30)).unwrap());
        assert!(!detector.is_market_open(MarketRegion::Usa, utc(2024, 6, 17, 20, 0)).unwrap());
    }

    #[test]
    fn test_malformed_holiday_entries_are_skipped() {
        let detector = detector_with_holidays(
            MarketRegion::China,
            vec!["2024-10-01", "not-a-date", "2024/10/02"],
        );

        assert_eq!(detector.load_holidays(MarketRegion::China), 1);
        assert!(detector.is_market_holiday(
            MarketRegion::China,
            NaiveDate::from_ymd_opt(2024, 10, 1).unwrap()
        ));
        assert!(!detector.is_market_holiday(
            MarketRegion::China,
            NaiveDate::from_ymd_opt(2024, 10, 2).unwrap()
        ));
    }

    #[test]
    fn test_holiday_reload_replaces_whole_set() {
        let detector = detector_with_holidays(MarketRegion::HongKong, vec!["2024-12-25"]);
        let christmas = NaiveDate::from_ymd_opt(2024, 12, 25).unwrap();
        assert!(detector.is_market_holiday(MarketRegion::HongKong, christmas));

        detector
            .config
            .set_market_holidays(MarketRegion::HongKong, vec!["2025-01-01".to_string()]);
        detector.load_holidays(MarketRegion::HongKong);

        assert!(!detector.is_market_holiday(MarketRegion::HongKong, christmas));
        assert!(detector.is_market_holiday(
            MarketRegion::HongKong,
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
        ));
    }

    #[test]
    fn test_market_hours_table() {
        let detector = detector();

        let (open, close) = detector.market_hours(MarketRegion::China);
        assert_eq!(open, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(close, NaiveTime::from_hms_opt(15, 0, 0).unwrap());

        let (open, close) = detector.market_hours(MarketRegion::HongKong);
        assert_eq!(open, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(close, NaiveTime::from_hms_opt(16, 0, 0).unwrap());

        let (open, close) = detector.market_hours(MarketRegion::Usa);
        assert_eq!(open, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(close, NaiveTime::from_hms_opt(16, 0, 0).unwrap());
    }

    #[test]
    fn test_local_date_uses_market_zone() {
        let detector = detector();

        // 2024-06-03 22:00 UTC is already 06-04 in Shanghai, still 06-03 in
        // New York.
        let at = utc(2024, 6, 3, 22, 0);
        assert_eq!(
            MarketCalendar::local_date(&detector, MarketRegion::China, at).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 4).unwrap()
        );
        assert_eq!(
            MarketCalendar::local_date(&detector, MarketRegion::Usa, at).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
        );
    }
}
