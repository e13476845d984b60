use std::str::FromStr;

use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
    Weekday,
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimezoneError {
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),
}

/// The three zones regional markets trade in. Shanghai and Hong Kong are
/// fixed UTC+8; New York observes US daylight saving.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MarketTimezone {
    ChinaStandard,
    HongKong,
    UsEastern,
}

impl MarketTimezone {
    pub fn name(&self) -> &'static str {
        match self {
            MarketTimezone::ChinaStandard => "Asia/Shanghai",
            MarketTimezone::HongKong => "Asia/Hong_Kong",
            MarketTimezone::UsEastern => "America/New_York",
        }
    }
}

impl FromStr for MarketTimezone {
    type Err = TimezoneError;

    fn from_str(name: &str) -> Result<Self, TimezoneError> {
        match name {
            "Asia/Shanghai" => Ok(MarketTimezone::ChinaStandard),
            "Asia/Hong_Kong" => Ok(MarketTimezone::HongKong),
            "America/New_York" => Ok(MarketTimezone::UsEastern),
            other => Err(TimezoneError::UnknownTimezone(other.to_string())),
        }
    }
}

const FIXED_EAST_HOURS: i64 = 8;
const EASTERN_STANDARD_HOURS: i64 = -5;
const EASTERN_DAYLIGHT_HOURS: i64 = -4;

/// UTC <-> market-local wall time, with an explicit rule table instead of a
/// platform timezone database.
///
/// US Eastern transitions: clocks jump 02:00 -> 03:00 on the second Sunday of
/// March and repeat 01:00-02:00 on the first Sunday of November. The
/// nonexistent spring hour resolves with the post-transition offset, the
/// repeated fall hour with the earlier (daylight) offset.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimezoneConverter;

impl TimezoneConverter {
    pub fn new() -> Self {
        Self
    }

    pub fn utc_to_local(&self, instant: DateTime<Utc>, zone: MarketTimezone) -> NaiveDateTime {
        instant.naive_utc() + self.timezone_offset(zone, instant)
    }

    pub fn local_to_utc(&self, local: NaiveDateTime, zone: MarketTimezone) -> DateTime<Utc> {
        let offset = match zone {
            MarketTimezone::ChinaStandard | MarketTimezone::HongKong => {
                Duration::hours(FIXED_EAST_HOURS)
            }
            MarketTimezone::UsEastern => {
                if eastern_local_in_dst(local) {
                    Duration::hours(EASTERN_DAYLIGHT_HOURS)
                } else {
                    Duration::hours(EASTERN_STANDARD_HOURS)
                }
            }
        };

        Utc.from_utc_datetime(&(local - offset))
    }

    pub fn timezone_offset(&self, zone: MarketTimezone, instant: DateTime<Utc>) -> Duration {
        match zone {
            MarketTimezone::ChinaStandard | MarketTimezone::HongKong => {
                Duration::hours(FIXED_EAST_HOURS)
            }
            MarketTimezone::UsEastern => {
                if eastern_instant_in_dst(instant) {
                    Duration::hours(EASTERN_DAYLIGHT_HOURS)
                } else {
                    Duration::hours(EASTERN_STANDARD_HOURS)
                }
            }
        }
    }
}

fn eastern_instant_in_dst(instant: DateTime<Utc>) -> bool {
    let year = instant.year();
    instant >= spring_forward_utc(year) && instant < fall_back_utc(year)
}

/// DST decision for a local wall time. On the transition days themselves the
/// 02:00 boundary picks the side: at or after 02:00 on the spring day is
/// daylight time (collapsing the gap forward), before 02:00 on the fall day
/// is still daylight time (the earlier of the two repeated readings).
fn eastern_local_in_dst(local: NaiveDateTime) -> bool {
    let spring_day = nth_sunday(local.year(), 3, 2);
    let fall_day = nth_sunday(local.year(), 11, 1);
    let date = local.date();

    if date == spring_day {
        local.time().hour() >= 2
    } else if date == fall_day {
        local.time().hour() < 2
    } else {
        date > spring_day && date < fall_day
    }
}

/// Local 02:00 EST on the second Sunday of March, as UTC.
fn spring_forward_utc(year: i32) -> DateTime<Utc> {
    let local = nth_sunday(year, 3, 2).and_time(NaiveTime::MIN) + Duration::hours(2);
    Utc.from_utc_datetime(&(local - Duration::hours(EASTERN_STANDARD_HOURS)))
}

/// Local 02:00 EDT on the first Sunday of November, as UTC.
fn fall_back_utc(year: i32) -> DateTime<Utc> {
    let local = nth_sunday(year, 11, 1).and_time(NaiveTime::MIN) + Duration::hours(2);
    Utc.from_utc_datetime(&(local - Duration::hours(EASTERN_DAYLIGHT_HOURS)))
}

fn nth_sunday(year: i32, month: u32, nth: u8) -> NaiveDate {
    NaiveDate::from_weekday_of_month_opt(year, month, Weekday::Sun, nth)
        .expect("month in any supported year has the requested Sunday")
}
