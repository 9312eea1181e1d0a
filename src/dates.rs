//! Date helpers for the funding pipeline: whole-month durations and the
//! default one-year project window.

use chrono::{Datelike, NaiveDate};

/// Whole months between two dates by year/month arithmetic, ignoring the
/// day of month. Negative when `end` precedes `start`.
pub fn whole_months_between(start: NaiveDate, end: NaiveDate) -> i32 {
    (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32
}

/// Default project end: one year after `start`. A Feb 29 start lands on
/// Mar 1 of the following year.
pub fn default_end(start: NaiveDate) -> NaiveDate {
    start
        .with_year(start.year() + 1)
        .unwrap_or_else(|| NaiveDate::from_ymd(start.year() + 1, 3, 1))
}
