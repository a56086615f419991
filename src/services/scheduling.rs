use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use rusqlite::Connection;

use crate::config::AppConfig;
use crate::db::queries;
use crate::models::availability::{
    blocked_slot_starts, drop_started, generate_slots, BusyInterval, SLOT_MINUTES,
};
use crate::models::schedule::iso_weekday;
use crate::models::{DayAvailability, ShiftWindow};

/// Opening hours in force on `date`: the daily override if one exists,
/// otherwise the weekly rule for that weekday. `None` means closed.
pub fn effective_window(
    conn: &Connection,
    date: NaiveDate,
    provider_id: i64,
) -> rusqlite::Result<Option<ShiftWindow>> {
    if let Some(day) = queries::get_daily_override(conn, date, provider_id)? {
        return Ok(Some(day.window));
    }

    let weekly = queries::get_working_hours(conn, iso_weekday(date), provider_id)?;
    Ok(weekly.map(|rule| rule.window))
}

/// Builds the instant for a shop-local civil date and time from its
/// components. Ambiguous times (DST fall-back) resolve to the earlier
/// instant; times skipped by a DST jump have no instant.
pub fn local_instant(tz: &Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    tz.with_ymd_and_hms(
        date.year(),
        date.month(),
        date.day(),
        time.hour(),
        time.minute(),
        0,
    )
    .earliest()
    .map(|dt| dt.with_timezone(&Utc))
}

/// Start of the local day. When midnight is skipped by a DST jump the day
/// starts at the first local minute that exists.
fn local_midnight(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    (0..24 * 60)
        .find_map(|minute| {
            tz.from_local_datetime(&(midnight + Duration::minutes(minute)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| midnight.and_utc())
}

/// `[start, end)` of a shop-local calendar day as UTC instants.
pub fn local_day_bounds(tz: &Tz, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let next = date.succ_opt().unwrap_or(date);
    (local_midnight(tz, date), local_midnight(tz, next))
}

pub fn local_today(tz: &Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(tz).date_naive()
}

/// Free/busy view for one date. Reads only; calling it twice without writes
/// in between yields the same result.
pub fn get_availability(
    conn: &Connection,
    config: &AppConfig,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> rusqlite::Result<DayAvailability> {
    let Some(window) = effective_window(conn, date, config.provider_id)? else {
        return Ok(DayAvailability::closed(date));
    };

    let tz = config.timezone;
    let mut all_slots = generate_slots(&window, SLOT_MINUTES);

    let now_local = now.with_timezone(&tz).naive_local();
    if config.hide_past_slots && now_local.date() == date {
        all_slots = drop_started(all_slots, now_local.time());
    }

    let (day_start, day_end) = local_day_bounds(&tz, date);
    let appointments = queries::find_overlapping(conn, config.provider_id, &day_start, &day_end)?;

    let midnight = date.and_time(NaiveTime::MIN);
    let busy: Vec<BusyInterval> = appointments
        .iter()
        .map(|a| BusyInterval {
            start_minute: (a.start.with_timezone(&tz).naive_local() - midnight).num_minutes(),
            end_minute: (a.end.with_timezone(&tz).naive_local() - midnight).num_minutes(),
        })
        .collect();

    let booked_slots = blocked_slot_starts(&busy, &all_slots, SLOT_MINUTES);

    Ok(DayAvailability::open(date, &all_slots, &booked_slots))
}
