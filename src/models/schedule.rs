use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ScheduleError {
    #[error("invalid time (expected HH:MM): {0}")]
    InvalidTime(String),

    #[error("shift must end after it starts ({start}-{end})")]
    EmptyWindow { start: String, end: String },

    #[error("day_of_week must be between 1 (Monday) and 7 (Sunday), got {0}")]
    InvalidDayOfWeek(i64),
}

/// Opening hours for one day, `start` inclusive and `end` exclusive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShiftWindow {
    #[serde(rename = "start_shift", with = "hhmm")]
    pub start: NaiveTime,
    #[serde(rename = "end_shift", with = "hhmm")]
    pub end: NaiveTime,
}

impl ShiftWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, ScheduleError> {
        if end <= start {
            return Err(ScheduleError::EmptyWindow {
                start: start.format("%H:%M").to_string(),
                end: end.format("%H:%M").to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, ScheduleError> {
        Self::new(parse_shift_time(start)?, parse_shift_time(end)?)
    }
}

/// Weekly default hours, keyed by ISO weekday (Monday = 1 .. Sunday = 7).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkingHoursRule {
    pub day_of_week: u8,
    pub provider_id: i64,
    #[serde(flatten)]
    pub window: ShiftWindow,
}

/// Hours for one calendar date; shadows the weekly rule for that date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyOverride {
    pub date: NaiveDate,
    pub provider_id: i64,
    #[serde(flatten)]
    pub window: ShiftWindow,
}

pub fn parse_shift_time(s: &str) -> Result<NaiveTime, ScheduleError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| ScheduleError::InvalidTime(s.to_string()))
}

pub fn iso_weekday(date: NaiveDate) -> u8 {
    // number_from_monday is always in 1..=7
    date.weekday().number_from_monday() as u8
}

/// Accepts ISO numbering and also the zero-based convention where Sunday is 0.
pub fn normalize_day_of_week(raw: i64) -> Result<u8, ScheduleError> {
    match raw {
        0 => Ok(7),
        1..=7 => Ok(raw as u8),
        _ => Err(ScheduleError::InvalidDayOfWeek(raw)),
    }
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_shift_time(&raw).map_err(serde::de::Error::custom)
    }
}
