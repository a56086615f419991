use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::Serialize;

use super::schedule::ShiftWindow;

/// Every appointment lasts one slot.
pub const SLOT_MINUTES: i64 = 30;

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Public free/busy view for one date. `booked_slots` is not a subset filter of
/// `all_slots`; the client greys out whatever appears in both.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub all_slots: Vec<String>,
    pub booked_slots: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DayAvailability {
    pub fn closed(date: NaiveDate) -> Self {
        Self {
            date,
            all_slots: vec![],
            booked_slots: vec![],
            message: Some("closed".to_string()),
        }
    }

    pub fn open(date: NaiveDate, all: &[NaiveTime], booked: &[NaiveTime]) -> Self {
        Self {
            date,
            all_slots: all.iter().map(format_slot).collect(),
            booked_slots: booked.iter().map(format_slot).collect(),
            message: None,
        }
    }
}

/// A busy range in minutes relative to local midnight of the date being viewed.
/// Values may fall outside `0..1440` when an appointment crosses midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyInterval {
    pub start_minute: i64,
    pub end_minute: i64,
}

pub fn format_slot(t: &NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

fn minute_of_day(t: NaiveTime) -> i64 {
    i64::from(t.num_seconds_from_midnight() / 60)
}

fn time_at_minute(minute: i64) -> Option<NaiveTime> {
    if !(0..MINUTES_PER_DAY).contains(&minute) {
        return None;
    }
    u32::try_from(minute * 60)
        .ok()
        .and_then(|secs| NaiveTime::from_num_seconds_from_midnight_opt(secs, 0))
}

/// Slot starts from `window.start`, one every `duration_minutes`, keeping only
/// slots that finish by `window.end`.
pub fn generate_slots(window: &ShiftWindow, duration_minutes: i64) -> Vec<NaiveTime> {
    if duration_minutes <= 0 {
        return vec![];
    }

    let end = minute_of_day(window.end);
    let mut slots = vec![];
    let mut current = minute_of_day(window.start);

    while current + duration_minutes <= end {
        if let Some(t) = time_at_minute(current) {
            slots.push(t);
        }
        current += duration_minutes;
    }

    slots
}

/// Drops slots that have already started.
pub fn drop_started(slots: Vec<NaiveTime>, now: NaiveTime) -> Vec<NaiveTime> {
    slots.into_iter().filter(|s| *s > now).collect()
}

/// Expands busy intervals into the slot starts they block: every
/// `duration_minutes` step from each interval's own start, plus any candidate
/// slot whose span intersects the interval. Sorted ascending.
pub fn blocked_slot_starts(
    busy: &[BusyInterval],
    candidates: &[NaiveTime],
    duration_minutes: i64,
) -> Vec<NaiveTime> {
    let mut blocked = BTreeSet::new();
    if duration_minutes <= 0 {
        return vec![];
    }

    for interval in busy {
        let mut minute = interval.start_minute;
        while minute < interval.end_minute {
            if let Some(t) = time_at_minute(minute) {
                blocked.insert(t);
            }
            minute += duration_minutes;
        }

        for candidate in candidates {
            let start = minute_of_day(*candidate);
            if start < interval.end_minute && start + duration_minutes > interval.start_minute {
                blocked.insert(*candidate);
            }
        }
    }

    blocked.into_iter().collect()
}
