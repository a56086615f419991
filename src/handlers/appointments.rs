use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::extract::AppJson;
use super::local_rfc3339;
use crate::db::queries;
use crate::errors::AppError;
use crate::services::booking::{self, BookingRequest};
use crate::state::AppState;

// POST /api/book
#[derive(Serialize)]
pub struct BookResponse {
    message: String,
    appointment_id: String,
    booked_time: String,
}

pub async fn book(
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<BookingRequest>,
) -> Result<(StatusCode, Json<BookResponse>), AppError> {
    let appointment = {
        let mut db = state.conn()?;
        booking::admit(&mut db, &state.config, &body, Utc::now())?
    };

    let name = body.name.as_deref().map(str::trim).unwrap_or_default();
    booking::notify_booking(&state, &appointment, name);

    Ok((
        StatusCode::CREATED,
        Json(BookResponse {
            message: "Your appointment has been booked.".to_string(),
            booked_time: local_rfc3339(&state.config.timezone, &appointment.start),
            appointment_id: appointment.id,
        }),
    ))
}

// POST /api/user-appointments
#[derive(Deserialize)]
pub struct UserAppointmentsRequest {
    pub phone_number: Option<String>,
}

#[derive(Serialize)]
pub struct UserAppointment {
    id: String,
    time: String,
    service: String,
}

pub async fn user_appointments(
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<UserAppointmentsRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let phone = booking::required(&body.phone_number, "phone_number")?;

    let appointments = {
        let db = state.conn()?;
        booking::upcoming_for_phone(&db, phone, Utc::now())?
    };

    let tz = state.config.timezone;
    let items: Vec<UserAppointment> = appointments
        .into_iter()
        .map(|a| UserAppointment {
            time: local_rfc3339(&tz, &a.start),
            id: a.id,
            service: a.service_type,
        })
        .collect();

    Ok(Json(serde_json::json!({ "appointments": items })))
}

// DELETE /api/cancel-id/:id
pub async fn cancel_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let removed = {
        let db = state.conn()?;
        queries::delete_appointment(&db, &id)?
    };

    if !removed {
        return Err(AppError::NotFound(
            "Appointment not found or already canceled.".to_string(),
        ));
    }

    tracing::info!(appointment_id = %id, "appointment canceled by id");
    Ok(Json(serde_json::json!({ "message": "Your appointment has been canceled." })))
}

// DELETE /api/cancel
#[derive(Deserialize)]
pub struct CancelRequest {
    pub phone_number: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
}

pub async fn cancel_by_identity(
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<CancelRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let phone = booking::required(&body.phone_number, "phone_number")?;
    let date = booking::parse_date(booking::required(&body.date, "date")?)?;
    let time = booking::parse_time(booking::required(&body.time, "time")?)?;

    {
        let db = state.conn()?;
        booking::cancel_by_identity(&db, &state.config, phone, date, time)?;
    }

    Ok(Json(serde_json::json!({ "message": "Your appointment has been canceled." })))
}
