use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::extract::{AppJson, AppQuery};
use super::local_rfc3339;
use crate::config::AppConfig;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::schedule::normalize_day_of_week;
use crate::models::{AppointmentStatus, DailyOverride, ShiftWindow, WorkingHoursRule};
use crate::services::{booking, scheduling};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AdminQuery {
    pub pass: Option<String>,
    pub upcoming: Option<bool>,
}

fn check_auth(config: &AppConfig, pass: Option<&str>) -> Result<(), AppError> {
    let Some(expected) = config.admin_password.as_deref() else {
        return Err(AppError::Config("ADMIN_PASSWORD is not set".to_string()));
    };

    match pass {
        Some(given) if given == expected => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

fn shift_window(start: &Option<String>, end: &Option<String>) -> Result<ShiftWindow, AppError> {
    let start = booking::required(start, "start_shift")?;
    let end = booking::required(end, "end_shift")?;
    Ok(ShiftWindow::parse(start, end)?)
}

// GET /api/admin/appointments
#[derive(Serialize)]
pub struct AdminCustomer {
    name: String,
    phone_number: String,
}

#[derive(Serialize)]
pub struct AdminAppointment {
    id: String,
    start_time: String,
    end_time: String,
    service_type: String,
    status: AppointmentStatus,
    created_at: String,
    customer: AdminCustomer,
}

#[derive(Serialize)]
pub struct AdminAppointmentsResponse {
    count: usize,
    appointments: Vec<AdminAppointment>,
}

pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<AdminQuery>,
) -> Result<Json<AdminAppointmentsResponse>, AppError> {
    check_auth(&state.config, query.pass.as_deref())?;

    let now = Utc::now();
    let from = query.upcoming.unwrap_or(false).then_some(now);

    let rows = {
        let db = state.conn()?;
        queries::list_appointments_with_customers(&db, state.config.provider_id, from.as_ref())?
    };

    let tz = state.config.timezone;
    let appointments: Vec<AdminAppointment> = rows
        .into_iter()
        .map(|row| {
            let a = row.appointment;
            AdminAppointment {
                start_time: local_rfc3339(&tz, &a.start),
                end_time: local_rfc3339(&tz, &a.end),
                created_at: local_rfc3339(&tz, &a.created_at),
                id: a.id,
                service_type: a.service_type,
                status: a.status,
                customer: AdminCustomer {
                    name: row.customer_name,
                    phone_number: row.customer_phone,
                },
            }
        })
        .collect();

    Ok(Json(AdminAppointmentsResponse {
        count: appointments.len(),
        appointments,
    }))
}

// PATCH /api/admin/appointment/:id
#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
}

pub async fn update_appointment_status(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<AdminQuery>,
    Path(id): Path<String>,
    AppJson(body): AppJson<StatusRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&state.config, query.pass.as_deref())?;

    let status = body
        .status
        .as_deref()
        .and_then(AppointmentStatus::parse)
        .ok_or_else(|| {
            AppError::Validation("status must be one of Pending, Completed, Canceled".to_string())
        })?;

    let appointment = {
        let db = state.conn()?;
        if !queries::update_appointment_status(&db, &id, status)? {
            return Err(AppError::NotFound(format!("no appointment with id {id}")));
        }
        queries::get_appointment_by_id(&db, &id)?
    };

    tracing::info!(appointment_id = %id, status = status.as_str(), "appointment status changed");

    Ok(Json(serde_json::json!({
        "message": "Appointment status updated.",
        "appointment": appointment,
    })))
}

// GET /api/admin/schedule
pub async fn get_schedule(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<AdminQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&state.config, query.pass.as_deref())?;

    let today = scheduling::local_today(&state.config.timezone, Utc::now());
    let (weekly, overrides) = {
        let db = state.conn()?;
        (
            queries::list_working_hours(&db, state.config.provider_id)?,
            queries::list_daily_overrides(&db, state.config.provider_id, today)?,
        )
    };

    Ok(Json(serde_json::json!({
        "weekly": weekly,
        "overrides": overrides,
    })))
}

// POST /api/admin/schedule
#[derive(Deserialize)]
#[serde(untagged)]
pub enum DayOfWeekField {
    Number(i64),
    Text(String),
}

impl DayOfWeekField {
    fn resolve(&self) -> Result<u8, AppError> {
        let raw = match self {
            DayOfWeekField::Number(n) => *n,
            DayOfWeekField::Text(s) => s.trim().parse().map_err(|_| {
                AppError::Validation(format!("day_of_week is not a number: {s}"))
            })?,
        };
        Ok(normalize_day_of_week(raw)?)
    }
}

#[derive(Deserialize)]
pub struct ScheduleRequest {
    pub day_of_week: Option<DayOfWeekField>,
    pub start_shift: Option<String>,
    pub end_shift: Option<String>,
}

pub async fn upsert_schedule(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<AdminQuery>,
    AppJson(body): AppJson<ScheduleRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&state.config, query.pass.as_deref())?;

    let day_of_week = body
        .day_of_week
        .as_ref()
        .ok_or_else(|| AppError::Validation("missing required field: day_of_week".to_string()))?
        .resolve()?;
    let rule = WorkingHoursRule {
        day_of_week,
        provider_id: state.config.provider_id,
        window: shift_window(&body.start_shift, &body.end_shift)?,
    };

    {
        let db = state.conn()?;
        queries::upsert_working_hours(&db, &rule)?;
    }

    tracing::info!(day_of_week, "weekly working hours updated");

    Ok(Json(serde_json::json!({
        "message": "Working hours updated.",
        "schedule": rule,
    })))
}

// POST /api/admin/schedule/reset
#[derive(Deserialize)]
pub struct ResetScheduleRequest {
    pub start_shift: Option<String>,
    pub end_shift: Option<String>,
}

pub async fn reset_schedule(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<AdminQuery>,
    AppJson(body): AppJson<ResetScheduleRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&state.config, query.pass.as_deref())?;

    let window = shift_window(&body.start_shift, &body.end_shift)?;

    let weekly = {
        let mut db = state.conn()?;
        queries::reset_weekly_schedule(&mut db, state.config.provider_id, &window)?;
        queries::list_working_hours(&db, state.config.provider_id)?
    };

    tracing::info!("weekly schedule reset for all days");

    Ok(Json(serde_json::json!({
        "message": "Weekly schedule reset.",
        "schedule": weekly,
    })))
}

// POST /api/admin/schedule-day
#[derive(Deserialize)]
pub struct DayScheduleRequest {
    pub date: Option<String>,
    pub start_shift: Option<String>,
    pub end_shift: Option<String>,
}

pub async fn upsert_schedule_day(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<AdminQuery>,
    AppJson(body): AppJson<DayScheduleRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&state.config, query.pass.as_deref())?;

    let date = booking::parse_date(booking::required(&body.date, "date")?)?;
    let day = DailyOverride {
        date,
        provider_id: state.config.provider_id,
        window: shift_window(&body.start_shift, &body.end_shift)?,
    };

    {
        let db = state.conn()?;
        queries::upsert_daily_override(&db, &day)?;
    }

    tracing::info!(%date, "daily override saved");

    Ok(Json(serde_json::json!({
        "message": "Hours for this date updated.",
        "schedule": day,
    })))
}

// DELETE /api/admin/schedule-day
#[derive(Deserialize)]
pub struct DeleteDayScheduleRequest {
    pub date: Option<String>,
}

pub async fn delete_schedule_day(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<AdminQuery>,
    AppJson(body): AppJson<DeleteDayScheduleRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&state.config, query.pass.as_deref())?;

    let date = booking::parse_date(booking::required(&body.date, "date")?)?;

    let removed = {
        let db = state.conn()?;
        queries::delete_daily_override(&db, date, state.config.provider_id)?
    };

    if !removed {
        return Err(AppError::NotFound(format!("no override for {date}")));
    }

    tracing::info!(%date, "daily override removed");
    Ok(Json(serde_json::json!({
        "message": "Override removed; the weekly hours apply again.",
    })))
}
