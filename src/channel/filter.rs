use chrono::{Datelike, Timelike, Weekday};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Restricts the weekdays and hours in which a channel is updated.
///
/// `None` means "no restriction" for that dimension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleFilter {
    pub weekdays: Option<HashSet<Weekday>>,
    /// Hours of day, 0-23.
    pub hours: Option<BTreeSet<u32>>,
}

/// Why a channel was skipped this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterSkip {
    Weekday(Weekday),
    Hour(u32),
}

impl fmt::Display for FilterSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterSkip::Weekday(day) => write!(f, "weekday {day} is filtered out"),
            FilterSkip::Hour(hour) => write!(f, "hour {hour} is filtered out"),
        }
    }
}

impl ScheduleFilter {
    /// Returns the reason to skip an update at `now`, or `None` to proceed.
    ///
    /// The weekday filter is checked first.
    pub fn skip_reason<T: Datelike + Timelike>(&self, now: &T) -> Option<FilterSkip> {
        if let Some(weekdays) = &self.weekdays {
            let today = now.weekday();
            if !weekdays.contains(&today) {
                return Some(FilterSkip::Weekday(today));
            }
        }
        if let Some(hours) = &self.hours {
            let hour = now.hour();
            if !hours.contains(&hour) {
                return Some(FilterSkip::Hour(hour));
            }
        }
        None
    }
}
