use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::Deserialize;

use crate::config::AppConfig;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::availability::{generate_slots, SLOT_MINUTES};
use crate::models::{Appointment, AppointmentStatus};
use crate::services::scheduling;
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("You already have an appointment on this day.")]
    DuplicateBooking,

    #[error("Sorry, that time slot was just taken. Please pick another.")]
    Conflict,

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl From<BookingError> for AppError {
    fn from(e: BookingError) -> Self {
        match e {
            BookingError::Validation(msg) => AppError::Validation(msg),
            BookingError::NotFound(msg) => AppError::NotFound(msg),
            BookingError::DuplicateBooking | BookingError::Conflict => AppError::Conflict(e.to_string()),
            BookingError::Storage(inner) => AppError::from(inner),
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct BookingRequest {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub service_type: Option<String>,
}

pub fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, BookingError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| BookingError::Validation(format!("missing required field: {field}")))
}

pub fn parse_date(s: &str) -> Result<NaiveDate, BookingError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| BookingError::Validation(format!("invalid date (expected YYYY-MM-DD): {s}")))
}

pub fn parse_time(s: &str) -> Result<NaiveTime, BookingError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| BookingError::Validation(format!("invalid time (expected HH:MM): {s}")))
}

/// Validates a booking request and atomically admits it into the ledger.
///
/// The customer upsert, the same-day check, the overlap check and the insert
/// run inside one `BEGIN IMMEDIATE` transaction, so two concurrent callers can
/// never both pass the check. The overlap triggers on `appointments` back this
/// up at the storage level. A rejected booking rolls back the customer upsert.
pub fn admit(
    conn: &mut Connection,
    config: &AppConfig,
    req: &BookingRequest,
    now: DateTime<Utc>,
) -> Result<Appointment, BookingError> {
    let name = required(&req.name, "name")?;
    let phone = required(&req.phone_number, "phone_number")?;
    let date = parse_date(required(&req.date, "date")?)?;
    let time = parse_time(required(&req.time, "time")?)?;
    let service_type = required(&req.service_type, "service_type")?;

    let start = scheduling::local_instant(&config.timezone, date, time).ok_or_else(|| {
        BookingError::Validation(format!("{date} {} does not exist in the shop's timezone", hhmm(time)))
    })?;
    if start <= now {
        return Err(BookingError::Validation(
            "Cannot book a time in the past.".to_string(),
        ));
    }

    let window = scheduling::effective_window(conn, date, config.provider_id)?
        .ok_or_else(|| BookingError::Validation(format!("The shop is closed on {date}.")))?;
    if !generate_slots(&window, SLOT_MINUTES).contains(&time) {
        return Err(BookingError::Validation(format!(
            "{} is not a bookable slot on {date}.",
            hhmm(time)
        )));
    }

    let end = start + Duration::minutes(SLOT_MINUTES);

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let customer_id = queries::upsert_customer(&tx, phone, name)?;

    if config.one_booking_per_day {
        let (day_start, day_end) = scheduling::local_day_bounds(&config.timezone, date);
        let same_day = queries::count_active_for_customer_between(&tx, customer_id, &day_start, &day_end)?;
        if same_day > 0 {
            tracing::info!(phone = %phone, %date, "rejected second booking on the same day");
            return Err(BookingError::DuplicateBooking);
        }
    }

    if !queries::find_overlapping(&tx, config.provider_id, &start, &end)?.is_empty() {
        tracing::info!(start = %start, "rejected booking for an occupied slot");
        return Err(BookingError::Conflict);
    }

    let appointment = Appointment {
        id: uuid::Uuid::new_v4().to_string(),
        provider_id: config.provider_id,
        customer_id,
        start,
        end,
        service_type: service_type.to_string(),
        status: AppointmentStatus::Pending,
        created_at: now,
    };

    queries::insert_appointment(&tx, &appointment).map_err(|e| {
        if queries::is_overlap_rejection(&e) {
            BookingError::Conflict
        } else {
            BookingError::Storage(e)
        }
    })?;

    tx.commit()?;

    tracing::info!(
        appointment_id = %appointment.id,
        start = %appointment.start,
        "appointment admitted"
    );

    Ok(appointment)
}

fn hhmm(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

/// Upcoming non-canceled appointments of the customer with this phone number.
pub fn upcoming_for_phone(
    conn: &Connection,
    phone: &str,
    now: DateTime<Utc>,
) -> Result<Vec<Appointment>, BookingError> {
    let not_found = || BookingError::NotFound("No active appointments for this phone number.".to_string());

    let customer = queries::get_customer_by_phone(conn, phone)?.ok_or_else(not_found)?;
    let appointments = queries::find_active_by_customer(conn, customer.id, &now)?;
    if appointments.is_empty() {
        return Err(not_found());
    }
    Ok(appointments)
}

/// Removes the appointment identified by phone number and shop-local date and time.
pub fn cancel_by_identity(
    conn: &Connection,
    config: &AppConfig,
    phone: &str,
    date: NaiveDate,
    time: NaiveTime,
) -> Result<(), BookingError> {
    let not_found = || BookingError::NotFound("Appointment not found.".to_string());

    let customer = queries::get_customer_by_phone(conn, phone)?.ok_or_else(not_found)?;
    let start = scheduling::local_instant(&config.timezone, date, time).ok_or_else(not_found)?;

    if !queries::delete_appointment_by_customer_and_start(conn, customer.id, &start)? {
        return Err(not_found());
    }

    tracing::info!(customer_id = customer.id, start = %start, "appointment canceled by customer");
    Ok(())
}

/// Tells the shop owner about a new booking without holding up the response.
/// Delivery failures are logged and go no further.
pub fn notify_booking(state: &Arc<AppState>, appointment: &Appointment, customer_name: &str) {
    let local = appointment.start.with_timezone(&state.config.timezone);
    let message = format!(
        "New booking: {customer_name} on {} ({})",
        local.format("%Y-%m-%d %H:%M"),
        appointment.service_type
    );
    let appointment_id = appointment.id.clone();
    let state = Arc::clone(state);

    tokio::spawn(async move {
        if state.config.owner_phone.is_empty() {
            tracing::warn!("owner_phone not configured, skipping notification");
            return;
        }

        if let Err(e) = state
            .messaging
            .send_message(&state.config.owner_phone, &message)
            .await
        {
            tracing::error!(error = %e, appointment_id = %appointment_id, "failed to notify owner");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{ShiftWindow, WorkingHoursRule};

    fn setup_db() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        // 2025-06-16 is a Monday
        queries::upsert_working_hours(
            &conn,
            &WorkingHoursRule {
                day_of_week: 1,
                provider_id: 1,
                window: ShiftWindow::parse("09:00", "12:00").unwrap(),
            },
        )
        .unwrap();
        conn
    }

    fn config() -> AppConfig {
        AppConfig {
            port: 3000,
            database_url: ":memory:".to_string(),
            admin_password: Some("secret".to_string()),
            timezone: chrono_tz::Europe::Istanbul,
            provider_id: 1,
            hide_past_slots: true,
            one_booking_per_day: true,
            owner_phone: String::new(),
            twilio_account_sid: String::new(),
            twilio_auth_token: String::new(),
            twilio_phone_number: String::new(),
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-01T12:00:00Z").unwrap().with_timezone(&Utc)
    }

    fn request(phone: &str, date: &str, time: &str) -> BookingRequest {
        BookingRequest {
            name: Some("Ali".to_string()),
            phone_number: Some(phone.to_string()),
            date: Some(date.to_string()),
            time: Some(time.to_string()),
            service_type: Some("Haircut".to_string()),
        }
    }

    #[test]
    fn test_admit_success() {
        let mut conn = setup_db();
        let appt = admit(&mut conn, &config(), &request("+905551112233", "2025-06-16", "10:00"), now()).unwrap();

        assert_eq!(appt.status, AppointmentStatus::Pending);
        assert_eq!(appt.start.to_rfc3339(), "2025-06-16T07:00:00+00:00");
        assert_eq!(appt.end - appt.start, Duration::minutes(30));
        assert!(queries::get_appointment_by_id(&conn, &appt.id).unwrap().is_some());
    }

    #[test]
    fn test_missing_field() {
        let mut conn = setup_db();
        let mut req = request("+905551112233", "2025-06-16", "10:00");
        req.service_type = Some("  ".to_string());
        let err = admit(&mut conn, &config(), &req, now()).unwrap_err();
        assert!(matches!(err, BookingError::Validation(ref m) if m.contains("service_type")));

        let err = admit(&mut conn, &config(), &BookingRequest::default(), now()).unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
    }

    #[test]
    fn test_malformed_date_and_time() {
        let mut conn = setup_db();
        let err = admit(&mut conn, &config(), &request("+905551112233", "16/06/2025", "10:00"), now()).unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
        let err = admit(&mut conn, &config(), &request("+905551112233", "2025-06-16", "10am"), now()).unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
    }

    #[test]
    fn test_conflict_rejected() {
        let mut conn = setup_db();
        admit(&mut conn, &config(), &request("+905551112233", "2025-06-16", "10:00"), now()).unwrap();
        let err = admit(&mut conn, &config(), &request("+905554445566", "2025-06-16", "10:00"), now()).unwrap_err();
        assert!(matches!(err, BookingError::Conflict));
    }

    #[test]
    fn test_rejected_booking_leaves_no_customer() {
        let mut conn = setup_db();
        admit(&mut conn, &config(), &request("+905551112233", "2025-06-16", "10:00"), now()).unwrap();
        admit(&mut conn, &config(), &request("+905554445566", "2025-06-16", "10:00"), now()).unwrap_err();
        assert!(queries::get_customer_by_phone(&conn, "+905554445566").unwrap().is_none());
    }

    #[test]
    fn test_same_day_duplicate() {
        let mut conn = setup_db();
        admit(&mut conn, &config(), &request("+905551112233", "2025-06-16", "10:00"), now()).unwrap();
        let err = admit(&mut conn, &config(), &request("+905551112233", "2025-06-16", "11:00"), now()).unwrap_err();
        assert!(matches!(err, BookingError::DuplicateBooking));

        let mut relaxed = config();
        relaxed.one_booking_per_day = false;
        admit(&mut conn, &relaxed, &request("+905551112233", "2025-06-16", "11:00"), now()).unwrap();
    }

    #[test]
    fn test_closed_day_and_off_grid_time() {
        let mut conn = setup_db();
        // Tuesday has no hours
        let err = admit(&mut conn, &config(), &request("+905551112233", "2025-06-17", "10:00"), now()).unwrap_err();
        assert!(matches!(err, BookingError::Validation(ref m) if m.contains("closed")));

        let err = admit(&mut conn, &config(), &request("+905551112233", "2025-06-16", "10:15"), now()).unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));

        // 12:00 would end after closing
        let err = admit(&mut conn, &config(), &request("+905551112233", "2025-06-16", "12:00"), now()).unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
    }

    #[test]
    fn test_past_time_rejected() {
        let mut conn = setup_db();
        let later = DateTime::parse_from_rfc3339("2025-06-20T12:00:00Z").unwrap().with_timezone(&Utc);
        let err = admit(&mut conn, &config(), &request("+905551112233", "2025-06-16", "10:00"), later).unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
    }

    #[test]
    fn test_upcoming_for_phone() {
        let mut conn = setup_db();
        assert!(matches!(
            upcoming_for_phone(&conn, "+905551112233", now()),
            Err(BookingError::NotFound(_))
        ));

        admit(&mut conn, &config(), &request("+905551112233", "2025-06-16", "10:00"), now()).unwrap();
        let upcoming = upcoming_for_phone(&conn, "+905551112233", now()).unwrap();
        assert_eq!(upcoming.len(), 1);
    }

    #[test]
    fn test_cancel_by_identity() {
        let mut conn = setup_db();
        admit(&mut conn, &config(), &request("+905551112233", "2025-06-16", "10:00"), now()).unwrap();

        let date = parse_date("2025-06-16").unwrap();
        let err = cancel_by_identity(&conn, &config(), "+905551112233", date, parse_time("10:30").unwrap()).unwrap_err();
        assert!(matches!(err, BookingError::NotFound(_)));

        cancel_by_identity(&conn, &config(), "+905551112233", date, parse_time("10:00").unwrap()).unwrap();

        // the slot is free again
        admit(&mut conn, &config(), &request("+905554445566", "2025-06-16", "10:00"), now()).unwrap();
    }

    #[test]
    fn test_rejections_map_to_conflict() {
        let err = BookingError::Conflict;
        assert!(matches!(AppError::from(err), AppError::Conflict(_)));
        let err = BookingError::DuplicateBooking;
        assert!(matches!(AppError::from(err), AppError::Conflict(_)));
    }
}
