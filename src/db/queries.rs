use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::schedule::parse_shift_time;
use crate::models::{
    Appointment, AppointmentStatus, AppointmentWithCustomer, Customer, DailyOverride, ShiftWindow,
    WorkingHoursRule,
};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .map(|n| n.and_utc())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_date(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_time(idx: usize, s: &str) -> rusqlite::Result<NaiveTime> {
    parse_shift_time(s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn format_time(t: &NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

/// Abort message raised by the `appointments_no_overlap_*` triggers.
pub const OVERLAP_REJECTION: &str = "appointment overlaps an existing booking";

/// True only when the overlap triggers rejected the write. Other constraint
/// failures (CHECK, NOT NULL, foreign keys) are not booking conflicts.
pub fn is_overlap_rejection(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, Some(msg))
            if err.code == rusqlite::ErrorCode::ConstraintViolation && msg == OVERLAP_REJECTION
    )
}

// ── Customers ──

/// Creates the customer or renames the existing one; returns its id.
pub fn upsert_customer(conn: &Connection, phone: &str, name: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "INSERT INTO customers (phone_number, name) VALUES (?1, ?2)
         ON CONFLICT(phone_number) DO UPDATE SET
           name = excluded.name,
           updated_at = datetime('now')
         RETURNING id",
        params![phone, name],
        |row| row.get(0),
    )
}

pub fn get_customer_by_phone(conn: &Connection, phone: &str) -> rusqlite::Result<Option<Customer>> {
    conn.query_row(
        "SELECT id, phone_number, name FROM customers WHERE phone_number = ?1",
        params![phone],
        |row| {
            Ok(Customer {
                id: row.get(0)?,
                phone_number: row.get(1)?,
                name: row.get(2)?,
            })
        },
    )
    .optional()
}

// ── Weekly working hours ──

pub fn upsert_working_hours(conn: &Connection, rule: &WorkingHoursRule) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO working_hours (day_of_week, provider_id, start_shift, end_shift)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(day_of_week, provider_id) DO UPDATE SET
           start_shift = excluded.start_shift,
           end_shift = excluded.end_shift,
           updated_at = datetime('now')",
        params![
            rule.day_of_week,
            rule.provider_id,
            format_time(&rule.window.start),
            format_time(&rule.window.end),
        ],
    )?;
    Ok(())
}

pub fn get_working_hours(
    conn: &Connection,
    day_of_week: u8,
    provider_id: i64,
) -> rusqlite::Result<Option<WorkingHoursRule>> {
    conn.query_row(
        "SELECT day_of_week, provider_id, start_shift, end_shift
         FROM working_hours WHERE day_of_week = ?1 AND provider_id = ?2",
        params![day_of_week, provider_id],
        parse_working_hours_row,
    )
    .optional()
}

pub fn list_working_hours(conn: &Connection, provider_id: i64) -> rusqlite::Result<Vec<WorkingHoursRule>> {
    let mut stmt = conn.prepare(
        "SELECT day_of_week, provider_id, start_shift, end_shift
         FROM working_hours WHERE provider_id = ?1 ORDER BY day_of_week ASC",
    )?;
    let rows = stmt.query_map(params![provider_id], parse_working_hours_row)?;
    rows.collect()
}

/// Sets the same hours on all seven weekdays in one transaction.
pub fn reset_weekly_schedule(
    conn: &mut Connection,
    provider_id: i64,
    window: &ShiftWindow,
) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    for day_of_week in 1..=7u8 {
        upsert_working_hours(
            &tx,
            &WorkingHoursRule {
                day_of_week,
                provider_id,
                window: *window,
            },
        )?;
    }
    tx.commit()
}

fn parse_working_hours_row(row: &rusqlite::Row) -> rusqlite::Result<WorkingHoursRule> {
    let start: String = row.get(2)?;
    let end: String = row.get(3)?;
    Ok(WorkingHoursRule {
        day_of_week: row.get(0)?,
        provider_id: row.get(1)?,
        window: ShiftWindow {
            start: parse_time(2, &start)?,
            end: parse_time(3, &end)?,
        },
    })
}

// ── Daily overrides ──

pub fn upsert_daily_override(conn: &Connection, o: &DailyOverride) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO daily_overrides (date, provider_id, start_shift, end_shift)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(date, provider_id) DO UPDATE SET
           start_shift = excluded.start_shift,
           end_shift = excluded.end_shift,
           updated_at = datetime('now')",
        params![
            o.date.format(DATE_FORMAT).to_string(),
            o.provider_id,
            format_time(&o.window.start),
            format_time(&o.window.end),
        ],
    )?;
    Ok(())
}

pub fn get_daily_override(
    conn: &Connection,
    date: NaiveDate,
    provider_id: i64,
) -> rusqlite::Result<Option<DailyOverride>> {
    conn.query_row(
        "SELECT date, provider_id, start_shift, end_shift
         FROM daily_overrides WHERE date = ?1 AND provider_id = ?2",
        params![date.format(DATE_FORMAT).to_string(), provider_id],
        parse_override_row,
    )
    .optional()
}

pub fn delete_daily_override(conn: &Connection, date: NaiveDate, provider_id: i64) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "DELETE FROM daily_overrides WHERE date = ?1 AND provider_id = ?2",
        params![date.format(DATE_FORMAT).to_string(), provider_id],
    )?;
    Ok(count > 0)
}

pub fn list_daily_overrides(
    conn: &Connection,
    provider_id: i64,
    from: NaiveDate,
) -> rusqlite::Result<Vec<DailyOverride>> {
    let mut stmt = conn.prepare(
        "SELECT date, provider_id, start_shift, end_shift
         FROM daily_overrides WHERE provider_id = ?1 AND date >= ?2 ORDER BY date ASC",
    )?;
    let rows = stmt.query_map(
        params![provider_id, from.format(DATE_FORMAT).to_string()],
        parse_override_row,
    )?;
    rows.collect()
}

fn parse_override_row(row: &rusqlite::Row) -> rusqlite::Result<DailyOverride> {
    let date: String = row.get(0)?;
    let start: String = row.get(2)?;
    let end: String = row.get(3)?;
    Ok(DailyOverride {
        date: parse_date(0, &date)?,
        provider_id: row.get(1)?,
        window: ShiftWindow {
            start: parse_time(2, &start)?,
            end: parse_time(3, &end)?,
        },
    })
}

// ── Appointments ──

const APPOINTMENT_COLUMNS: &str =
    "a.id, a.provider_id, a.customer_id, a.start_at, a.end_at, a.service_type, a.status, a.created_at";

/// Inserts one ledger row. The overlap triggers abort the statement with a
/// constraint violation if it would intersect a live appointment.
pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO appointments (id, provider_id, customer_id, start_at, end_at, service_type, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            appt.id,
            appt.provider_id,
            appt.customer_id,
            format_ts(&appt.start),
            format_ts(&appt.end),
            appt.service_type,
            appt.status.as_str(),
            format_ts(&appt.created_at),
        ],
    )?;
    Ok(())
}

/// Non-canceled appointments whose `[start, end)` intersects the given range.
pub fn find_overlapping(
    conn: &Connection,
    provider_id: i64,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> rusqlite::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments a
         WHERE a.provider_id = ?1 AND a.start_at < ?3 AND a.end_at > ?2 AND a.status != 'Canceled'
         ORDER BY a.start_at ASC"
    ))?;
    let rows = stmt.query_map(
        params![provider_id, format_ts(start), format_ts(end)],
        parse_appointment_row,
    )?;
    rows.collect()
}

/// Non-canceled appointments of a customer starting at or after `from`, ascending.
pub fn find_active_by_customer(
    conn: &Connection,
    customer_id: i64,
    from: &DateTime<Utc>,
) -> rusqlite::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments a
         WHERE a.customer_id = ?1 AND a.start_at >= ?2 AND a.status != 'Canceled'
         ORDER BY a.start_at ASC"
    ))?;
    let rows = stmt.query_map(params![customer_id, format_ts(from)], parse_appointment_row)?;
    rows.collect()
}

pub fn count_active_for_customer_between(
    conn: &Connection,
    customer_id: i64,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM appointments
         WHERE customer_id = ?1 AND start_at >= ?2 AND start_at < ?3 AND status != 'Canceled'",
        params![customer_id, format_ts(start), format_ts(end)],
        |row| row.get(0),
    )
}

pub fn get_appointment_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<Appointment>> {
    conn.query_row(
        &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments a WHERE a.id = ?1"),
        params![id],
        parse_appointment_row,
    )
    .optional()
}

/// Returns false when no row has that id. Reviving a canceled appointment
/// into an occupied interval fails with a constraint violation.
pub fn update_appointment_status(
    conn: &Connection,
    id: &str,
    status: AppointmentStatus,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(count > 0)
}

pub fn delete_appointment(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    let count = conn.execute("DELETE FROM appointments WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn delete_appointment_by_customer_and_start(
    conn: &Connection,
    customer_id: i64,
    start: &DateTime<Utc>,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "DELETE FROM appointments WHERE customer_id = ?1 AND start_at = ?2",
        params![customer_id, format_ts(start)],
    )?;
    Ok(count > 0)
}

/// Admin listing, ascending by start. `from` restricts to upcoming appointments.
pub fn list_appointments_with_customers(
    conn: &Connection,
    provider_id: i64,
    from: Option<&DateTime<Utc>>,
) -> rusqlite::Result<Vec<AppointmentWithCustomer>> {
    let lower = from.map(format_ts).unwrap_or_default();
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS}, c.name, c.phone_number
         FROM appointments a
         INNER JOIN customers c ON c.id = a.customer_id
         WHERE a.provider_id = ?1 AND a.start_at >= ?2
         ORDER BY a.start_at ASC"
    ))?;
    let rows = stmt.query_map(params![provider_id, lower], |row| {
        Ok(AppointmentWithCustomer {
            appointment: parse_appointment_row(row)?,
            customer_name: row.get(8)?,
            customer_phone: row.get(9)?,
        })
    })?;
    rows.collect()
}

fn parse_appointment_row(row: &rusqlite::Row) -> rusqlite::Result<Appointment> {
    let start_str: String = row.get(3)?;
    let end_str: String = row.get(4)?;
    let status_str: String = row.get(6)?;
    let created_at_str: String = row.get(7)?;

    let status = AppointmentStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            Type::Text,
            format!("unknown appointment status: {status_str}").into(),
        )
    })?;

    Ok(Appointment {
        id: row.get(0)?,
        provider_id: row.get(1)?,
        customer_id: row.get(2)?,
        start: parse_ts(3, &start_str)?,
        end: parse_ts(4, &end_str)?,
        service_type: row.get(5)?,
        status,
        created_at: parse_ts(7, &created_at_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::{Duration, TimeZone};

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, d, h, m, 0).unwrap()
    }

    fn appointment(id: &str, customer_id: i64, start: DateTime<Utc>, minutes: i64) -> Appointment {
        Appointment {
            id: id.to_string(),
            provider_id: 1,
            customer_id,
            start,
            end: start + Duration::minutes(minutes),
            service_type: "Haircut".to_string(),
            status: AppointmentStatus::Pending,
            created_at: at(1, 8, 0),
        }
    }

    #[test]
    fn test_upsert_customer_renames() {
        let conn = setup_db();
        let id1 = upsert_customer(&conn, "+905551112233", "Ali").unwrap();
        let id2 = upsert_customer(&conn, "+905551112233", "Ali Veli").unwrap();
        assert_eq!(id1, id2);

        let customer = get_customer_by_phone(&conn, "+905551112233").unwrap().unwrap();
        assert_eq!(customer.name, "Ali Veli");
        assert!(get_customer_by_phone(&conn, "+900000000000").unwrap().is_none());
    }

    #[test]
    fn test_working_hours_one_per_day() {
        let conn = setup_db();
        let mut rule = WorkingHoursRule {
            day_of_week: 1,
            provider_id: 1,
            window: ShiftWindow::parse("09:00", "18:00").unwrap(),
        };
        upsert_working_hours(&conn, &rule).unwrap();
        rule.window = ShiftWindow::parse("10:00", "17:00").unwrap();
        upsert_working_hours(&conn, &rule).unwrap();

        let rules = list_working_hours(&conn, 1).unwrap();
        assert_eq!(rules, vec![rule]);
        assert!(get_working_hours(&conn, 2, 1).unwrap().is_none());
    }

    #[test]
    fn test_reset_weekly_schedule() {
        let mut conn = setup_db();
        let window = ShiftWindow::parse("09:30", "20:00").unwrap();
        reset_weekly_schedule(&mut conn, 1, &window).unwrap();

        let rules = list_working_hours(&conn, 1).unwrap();
        assert_eq!(rules.len(), 7);
        assert!(rules.iter().all(|r| r.window == window));
    }

    #[test]
    fn test_override_roundtrip_and_delete() {
        let conn = setup_db();
        let date = NaiveDate::from_ymd_opt(2025, 6, 16).unwrap();
        let o = DailyOverride {
            date,
            provider_id: 1,
            window: ShiftWindow::parse("10:00", "14:00").unwrap(),
        };
        upsert_daily_override(&conn, &o).unwrap();
        assert_eq!(get_daily_override(&conn, date, 1).unwrap(), Some(o));

        assert!(delete_daily_override(&conn, date, 1).unwrap());
        assert!(!delete_daily_override(&conn, date, 1).unwrap());
        assert!(get_daily_override(&conn, date, 1).unwrap().is_none());
    }

    #[test]
    fn test_storage_rejects_overlapping_insert() {
        let conn = setup_db();
        let c = upsert_customer(&conn, "+905551112233", "Ali").unwrap();
        insert_appointment(&conn, &appointment("a", c, at(16, 10, 0), 30)).unwrap();

        let err = insert_appointment(&conn, &appointment("b", c, at(16, 10, 15), 30)).unwrap_err();
        assert!(is_overlap_rejection(&err));

        let err = insert_appointment(&conn, &appointment("c", c, at(16, 10, 0), 30)).unwrap_err();
        assert!(is_overlap_rejection(&err));

        // adjacent is fine
        insert_appointment(&conn, &appointment("d", c, at(16, 10, 30), 30)).unwrap();
    }

    #[test]
    fn test_other_constraint_failures_are_not_overlaps() {
        let conn = setup_db();
        let c = upsert_customer(&conn, "+905551112233", "Ali").unwrap();

        // end_at > start_at CHECK
        let err = insert_appointment(&conn, &appointment("empty", c, at(16, 10, 0), 0)).unwrap_err();
        assert!(matches!(
            &err,
            rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
        ));
        assert!(!is_overlap_rejection(&err));

        // unknown customer
        let err = insert_appointment(&conn, &appointment("orphan", c + 100, at(16, 11, 0), 30)).unwrap_err();
        assert!(!is_overlap_rejection(&err));
    }

    #[test]
    fn test_canceled_rows_do_not_block() {
        let conn = setup_db();
        let c = upsert_customer(&conn, "+905551112233", "Ali").unwrap();
        insert_appointment(&conn, &appointment("a", c, at(16, 10, 0), 30)).unwrap();
        update_appointment_status(&conn, "a", AppointmentStatus::Canceled).unwrap();

        insert_appointment(&conn, &appointment("b", c, at(16, 10, 0), 30)).unwrap();

        // reviving "a" would double-book the slot
        let err = update_appointment_status(&conn, "a", AppointmentStatus::Pending).unwrap_err();
        assert!(is_overlap_rejection(&err));
    }

    #[test]
    fn test_find_overlapping() {
        let conn = setup_db();
        let c = upsert_customer(&conn, "+905551112233", "Ali").unwrap();
        insert_appointment(&conn, &appointment("a", c, at(16, 9, 0), 30)).unwrap();
        insert_appointment(&conn, &appointment("b", c, at(16, 10, 0), 30)).unwrap();
        insert_appointment(&conn, &appointment("c", c, at(17, 10, 0), 30)).unwrap();

        let found = find_overlapping(&conn, 1, &at(16, 9, 30), &at(16, 10, 15)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "b");

        let day = find_overlapping(&conn, 1, &at(16, 0, 0), &at(17, 0, 0)).unwrap();
        assert_eq!(day.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_find_active_by_customer() {
        let conn = setup_db();
        let ali = upsert_customer(&conn, "+905551112233", "Ali").unwrap();
        let ayse = upsert_customer(&conn, "+905554445566", "Ayse").unwrap();
        insert_appointment(&conn, &appointment("late", ali, at(18, 11, 0), 30)).unwrap();
        insert_appointment(&conn, &appointment("early", ali, at(17, 9, 0), 30)).unwrap();
        insert_appointment(&conn, &appointment("past", ali, at(10, 9, 0), 30)).unwrap();
        insert_appointment(&conn, &appointment("gone", ali, at(19, 9, 0), 30)).unwrap();
        insert_appointment(&conn, &appointment("other", ayse, at(17, 10, 0), 30)).unwrap();
        update_appointment_status(&conn, "gone", AppointmentStatus::Canceled).unwrap();

        let found = find_active_by_customer(&conn, ali, &at(15, 0, 0)).unwrap();
        assert_eq!(
            found.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(),
            vec!["early", "late"]
        );
    }

    #[test]
    fn test_update_status_missing() {
        let conn = setup_db();
        assert!(!update_appointment_status(&conn, "nope", AppointmentStatus::Completed).unwrap());
    }

    #[test]
    fn test_delete_by_customer_and_start() {
        let conn = setup_db();
        let c = upsert_customer(&conn, "+905551112233", "Ali").unwrap();
        insert_appointment(&conn, &appointment("a", c, at(16, 10, 0), 30)).unwrap();

        assert!(!delete_appointment_by_customer_and_start(&conn, c, &at(16, 10, 30)).unwrap());
        assert!(delete_appointment_by_customer_and_start(&conn, c, &at(16, 10, 0)).unwrap());
        assert!(get_appointment_by_id(&conn, "a").unwrap().is_none());
    }

    #[test]
    fn test_list_with_customers() {
        let conn = setup_db();
        let c = upsert_customer(&conn, "+905551112233", "Ali").unwrap();
        insert_appointment(&conn, &appointment("b", c, at(17, 10, 0), 30)).unwrap();
        insert_appointment(&conn, &appointment("a", c, at(16, 10, 0), 30)).unwrap();

        let all = list_appointments_with_customers(&conn, 1, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].appointment.id, "a");
        assert_eq!(all[0].customer_name, "Ali");
        assert_eq!(all[0].customer_phone, "+905551112233");

        let upcoming = list_appointments_with_customers(&conn, 1, Some(&at(17, 0, 0))).unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].appointment.id, "b");
    }
}
