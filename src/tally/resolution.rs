//! Bucket granularity for a time series.
//!
//! A [`Resolution`] is picked once per tally from the span between the first
//! commit and the end of the range, then used for every bucket boundary.
//! All calendar arithmetic happens in the timezone of the timestamp passed in.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;

const MONTHLY_AFTER_DAYS: i64 = 60;
const YEARLY_AFTER_DAYS: i64 = 365 * 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Yearly,
    Monthly,
    Daily,
}

impl Resolution {
    /// Choose a resolution from the elapsed time between `start` and `end`.
    pub fn for_span<Tz: TimeZone, Tz2: TimeZone>(start: &DateTime<Tz>, end: &DateTime<Tz2>) -> Self {
        let span = Duration::seconds(end.timestamp() - start.timestamp());
        if span > Duration::days(YEARLY_AFTER_DAYS) {
            Resolution::Yearly
        } else if span > Duration::days(MONTHLY_AFTER_DAYS) {
            Resolution::Monthly
        } else {
            Resolution::Daily
        }
    }

    /// Truncate `t` to the start of its bucket.
    pub fn apply<Tz: TimeZone>(self, t: &DateTime<Tz>) -> DateTime<Tz> {
        let date = t.date_naive();
        let first = match self {
            Resolution::Yearly => NaiveDate::from_ymd_opt(date.year(), 1, 1),
            Resolution::Monthly => date.with_day(1),
            Resolution::Daily => Some(date),
        }
        .unwrap_or(date);
        start_of_day(&t.timezone(), first)
    }

    /// Start of the bucket following the one containing `t`.
    pub fn next<Tz: TimeZone>(self, t: &DateTime<Tz>) -> DateTime<Tz> {
        let date = self.apply(t).date_naive();
        let following = match self {
            Resolution::Yearly => NaiveDate::from_ymd_opt(date.year() + 1, 1, 1),
            Resolution::Monthly => date.checked_add_months(Months::new(1)),
            Resolution::Daily => date.succ_opt(),
        }
        .unwrap_or(NaiveDate::MAX);
        start_of_day(&t.timezone(), following)
    }

    /// Human readable name of the bucket containing `t`.
    pub fn label<Tz: TimeZone>(self, t: &DateTime<Tz>) -> String {
        let date = self.apply(t).date_naive();
        let fmt = match self {
            Resolution::Yearly => "%Y",
            Resolution::Monthly => "%b %Y",
            Resolution::Daily => "%Y-%m-%d",
        };
        date.format(fmt).to_string()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Resolution::Yearly => "yearly",
            Resolution::Monthly => "monthly",
            Resolution::Daily => "daily",
        };
        f.write_str(s)
    }
}

/// First instant of `date` in `tz`.
///
/// Midnight can be skipped by a DST transition, in which case the first hour
/// of the day that exists is used.
fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    let midnight = date.and_time(NaiveTime::MIN);
    (0..24)
        .find_map(|hour| {
            tz.from_local_datetime(&(midnight + Duration::hours(hour)))
                .earliest()
        })
        .unwrap_or_else(|| tz.from_utc_datetime(&midnight))
}
