//! Calendar-day urgency: how far a target date is from today, and whether
//! that makes an item overdue, due today, or upcoming.
//!
//! All arithmetic runs on `NaiveDate` values. Timestamps are converted to a
//! calendar date in the configured zone first, so a record created at 23:30
//! local time is anchored to that local day and not to the UTC day.

use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;

/// Stored offset value meaning "no reminder".
pub const NO_REMINDER: i64 = -1;

/// Three-way temporal state. Magnitudes are always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "state", content = "days", rename_all = "lowercase")]
pub enum Urgency {
    Overdue(u32),
    Today,
    Upcoming(u32),
}

impl Urgency {
    /// Signed day distance this classification was built from.
    pub fn days_until(self) -> i64 {
        match self {
            Urgency::Overdue(n) => -i64::from(n),
            Urgency::Today => 0,
            Urgency::Upcoming(n) => i64::from(n),
        }
    }

    /// Overdue or due today.
    pub fn is_due_now(self) -> bool {
        !matches!(self, Urgency::Upcoming(_))
    }

    pub fn label(self) -> String {
        match self {
            Urgency::Overdue(n) => format!(
                "Overdue by {} day{}",
                n,
                if n == 1 { "" } else { "s" }
            ),
            Urgency::Today => "Due today".to_string(),
            Urgency::Upcoming(1) => "Due tomorrow".to_string(),
            Urgency::Upcoming(n) => format!("Due in {} days", n),
        }
    }
}

/// Calendar-day difference `target - today`. Negative means the target has passed.
pub fn days_until(target: NaiveDate, today: NaiveDate) -> i64 {
    (target - today).num_days()
}

/// Day difference between two instants after normalizing both to local midnight.
///
/// Two instants on the same local calendar day always yield 0, whatever their
/// time of day.
pub fn days_until_instant(target: DateTime<Utc>, now: DateTime<Utc>, tz: Tz) -> i64 {
    days_until(
        target.with_timezone(&tz).date_naive(),
        now.with_timezone(&tz).date_naive(),
    )
}

pub fn classify(days_until: i64) -> Urgency {
    let magnitude = |d: i64| u32::try_from(d.unsigned_abs()).unwrap_or(u32::MAX);
    match days_until {
        0 => Urgency::Today,
        d if d < 0 => Urgency::Overdue(magnitude(d)),
        d => Urgency::Upcoming(magnitude(d)),
    }
}

/// Target date for an item: local creation date plus `offset_days` calendar days.
///
/// Returns `None` only when the result would overflow chrono's date range.
pub fn target_date(created_at: DateTime<Utc>, offset_days: u32, tz: Tz) -> Option<NaiveDate> {
    created_at
        .with_timezone(&tz)
        .date_naive()
        .checked_add_days(Days::new(u64::from(offset_days)))
}

/// Interpret a raw stored offset. Absent, the `-1` sentinel, and any other
/// negative value all mean "no reminder".
pub fn parse_offset(raw: Option<i64>) -> Option<u32> {
    raw.filter(|d| *d >= 0).and_then(|d| u32::try_from(d).ok())
}

/// Classification for an item anchored at `created_at` with an optional offset.
pub fn urgency_of(
    created_at: DateTime<Utc>,
    offset_days: Option<u32>,
    today: NaiveDate,
    tz: Tz,
) -> Option<Urgency> {
    let offset = offset_days?;
    let target = target_date(created_at, offset, tz)?;
    Some(classify(days_until(target, today)))
}
