//! Cycle resolution for the budget engine.
//!
//! Converts a reference date plus the configured cycle-start day into the
//! boundaries, key and day counts the rest of the engine works with. All
//! functions are pure date arithmetic; month lengths and leap years are
//! chrono's problem, not special-cased here.

use chrono::{Datelike, Months, NaiveDate};
use shared::{Cycle, DEFAULT_CYCLE_START_DAY};

/// Largest start day that exists in every month.
pub const MAX_CYCLE_START_DAY: u32 = 28;

/// Clamp a configured start day into `[1, 28]`.
///
/// Days 29-31 don't exist in every month, so anything outside the range
/// silently falls back to the default instead of erroring.
pub fn clamp_start_day(raw: u32) -> u32 {
    if (1..=MAX_CYCLE_START_DAY).contains(&raw) {
        raw
    } else {
        DEFAULT_CYCLE_START_DAY
    }
}

fn date_with_day(year: i32, month: u32, day: u32) -> NaiveDate {
    // day has been clamped to [1, 28], which exists in every month
    NaiveDate::from_ymd_opt(year, month, day).expect("clamped day exists in every month")
}

/// Most recent date whose day-of-month equals the clamped `start_day`,
/// not after `date`.
pub fn cycle_start(date: NaiveDate, start_day: u32) -> NaiveDate {
    let day = clamp_start_day(start_day);
    if date.day() >= day {
        date_with_day(date.year(), date.month(), day)
    } else {
        let prev = date
            .checked_sub_months(Months::new(1))
            .expect("reference dates are nowhere near the calendar limits");
        date_with_day(prev.year(), prev.month(), day)
    }
}

/// First day of the next cycle: exactly one calendar month after
/// [`cycle_start`].
pub fn cycle_end(date: NaiveDate, start_day: u32) -> NaiveDate {
    next_start(cycle_start(date, start_day))
}

fn next_start(start: NaiveDate) -> NaiveDate {
    // start_day <= 28, so adding a month never clamps the day
    start
        .checked_add_months(Months::new(1))
        .expect("reference dates are nowhere near the calendar limits")
}

/// `YYYY-MM` of the cycle start; keys the settings row for the cycle.
pub fn cycle_key(date: NaiveDate, start_day: u32) -> String {
    cycle_start(date, start_day).format("%Y-%m").to_string()
}

/// Whole days from `today` to the cycle end, clamped to >= 0.
///
/// Today counts as a remaining day: on the last day of a cycle this
/// returns 1, and it reaches 0 only for dates at or past the boundary.
pub fn remaining_days(today: NaiveDate, start_day: u32) -> i64 {
    (cycle_end(today, start_day) - today).num_days().max(0)
}

/// Resolve the full cycle a reference date belongs to.
pub fn resolve(date: NaiveDate, start_day: u32) -> Cycle {
    let start = cycle_start(date, start_day);
    let end = next_start(start);
    Cycle {
        start,
        end,
        key: start.format("%Y-%m").to_string(),
        total_days: (end - start).num_days(),
    }
}
