//! US equity trading calendar.
//!
//! Provides trading-day and session classification in exchange time
//! (America/New_York). Used for:
//! - Picking the previous session whose close is the baseline price
//! - Choosing intraday vs daily bars for the current price

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::America::New_York;
use serde::{Deserialize, Serialize};

/// Regular session open, exchange time.
const SESSION_OPEN: (u32, u32) = (9, 30);
/// Regular session close, exchange time.
const SESSION_CLOSE: (u32, u32) = (16, 0);

/// Where a moment falls relative to the regular session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketPhase {
    /// Trading day, before 09:30.
    PreOpen,
    /// Trading day, 09:30 – 16:00.
    Regular,
    /// Trading day, at or after 16:00.
    AfterClose,
    /// Weekend or exchange holiday.
    Closed,
}

impl std::fmt::Display for MarketPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PreOpen => write!(f, "PreOpen"),
            Self::Regular => write!(f, "Regular"),
            Self::AfterClose => write!(f, "AfterClose"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// Exchange-local calendar date of a UTC instant.
#[must_use]
pub fn exchange_date(dt: DateTime<Utc>) -> NaiveDate {
    dt.with_timezone(&New_York).date_naive()
}

/// Check if the exchange is open on `date`.
#[must_use]
pub fn is_trading_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !is_exchange_holiday(date)
}

/// Most recent trading day strictly before `date`.
#[must_use]
pub fn previous_trading_day(date: NaiveDate) -> NaiveDate {
    let mut day = date - Duration::days(1);
    while !is_trading_day(day) {
        day -= Duration::days(1);
    }
    day
}

/// Classify a UTC instant against the regular session.
#[must_use]
pub fn phase_at(dt: DateTime<Utc>) -> MarketPhase {
    let local = dt.with_timezone(&New_York);
    if !is_trading_day(local.date_naive()) {
        return MarketPhase::Closed;
    }

    let time = (local.hour(), local.minute());
    if time < SESSION_OPEN {
        MarketPhase::PreOpen
    } else if time < SESSION_CLOSE {
        MarketPhase::Regular
    } else {
        MarketPhase::AfterClose
    }
}

/// Check if `date` is a full-day exchange holiday.
#[must_use]
pub fn is_exchange_holiday(date: NaiveDate) -> bool {
    exchange_holidays(date.year()).contains(&date)
}

/// Full-day exchange holidays for `year`, as observed.
///
/// Saturday holidays are observed on Friday and Sunday holidays on Monday,
/// except New Year's Day on a Saturday, which is not observed.
pub fn exchange_holidays(year: i32) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(10);

    if let Some(new_year) = NaiveDate::from_ymd_opt(year, 1, 1) {
        match new_year.weekday() {
            Weekday::Sat => {}
            Weekday::Sun => days.push(new_year + Duration::days(1)),
            _ => days.push(new_year),
        }
    }

    days.extend(nth_weekday(year, 1, Weekday::Mon, 3)); // MLK Day
    days.extend(nth_weekday(year, 2, Weekday::Mon, 3)); // Presidents' Day
    days.extend(easter_sunday(year).map(|d| d - Duration::days(2))); // Good Friday
    days.extend(last_weekday(year, 5, Weekday::Mon)); // Memorial Day
    if year >= 2022 {
        days.extend(NaiveDate::from_ymd_opt(year, 6, 19).map(observed));
    }
    days.extend(NaiveDate::from_ymd_opt(year, 7, 4).map(observed));
    days.extend(nth_weekday(year, 9, Weekday::Mon, 1)); // Labor Day
    days.extend(nth_weekday(year, 11, Weekday::Thu, 4)); // Thanksgiving
    days.extend(NaiveDate::from_ymd_opt(year, 12, 25).map(observed));

    days
}

fn observed(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

/// The `n`-th (1-based) `weekday` of a month.
fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let offset = (7 + weekday.num_days_from_monday() - first.weekday().num_days_from_monday()) % 7;
    let date = first + Duration::days(i64::from(offset + 7 * (n - 1)));
    (date.month() == month).then_some(date)
}

/// The last `weekday` of a month.
fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last = next_month - Duration::days(1);
    let back = (7 + last.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    Some(last - Duration::days(i64::from(back)))
}

/// Western Easter Sunday (anonymous Gregorian computus).
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}
