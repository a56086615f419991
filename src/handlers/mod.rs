pub mod admin;
pub mod appointments;
pub mod extract;
pub mod health;
pub mod slots;

use std::sync::Arc;

use axum::routing::{delete, get, patch, post};
use axum::Router;
use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/slots", get(slots::get_slots))
        .route("/api/book", post(appointments::book))
        .route("/api/user-appointments", post(appointments::user_appointments))
        .route("/api/cancel-id/:id", delete(appointments::cancel_by_id))
        .route("/api/cancel", delete(appointments::cancel_by_identity))
        .route("/api/admin/appointments", get(admin::list_appointments))
        .route(
            "/api/admin/appointment/:id",
            patch(admin::update_appointment_status),
        )
        .route(
            "/api/admin/schedule",
            get(admin::get_schedule).post(admin::upsert_schedule),
        )
        .route("/api/admin/schedule/reset", post(admin::reset_schedule))
        .route(
            "/api/admin/schedule-day",
            post(admin::upsert_schedule_day).delete(admin::delete_schedule_day),
        )
        .with_state(state)
}

/// Shop-local RFC 3339 rendering used in every JSON response.
pub(crate) fn local_rfc3339(tz: &Tz, ts: &DateTime<Utc>) -> String {
    ts.with_timezone(tz).to_rfc3339_opts(SecondsFormat::Secs, false)
}
