use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use super::extract::AppQuery;
use crate::errors::AppError;
use crate::models::DayAvailability;
use crate::services::{booking, scheduling};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SlotsQuery {
    pub date: Option<String>,
}

// GET /api/slots?date=YYYY-MM-DD
pub async fn get_slots(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<SlotsQuery>,
) -> Result<Json<DayAvailability>, AppError> {
    let raw = booking::required(&query.date, "date")?;
    let date = booking::parse_date(raw)?;

    let availability = {
        let db = state.conn()?;
        scheduling::get_availability(&db, &state.config, date, Utc::now())?
    };

    Ok(Json(availability))
}
