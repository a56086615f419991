use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: String,
    pub provider_id: i64,
    pub customer_id: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub service_type: String,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AppointmentStatus {
    Pending,
    Completed,
    Canceled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "Pending",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Canceled => "Canceled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(AppointmentStatus::Pending),
            "Completed" => Some(AppointmentStatus::Completed),
            "Canceled" => Some(AppointmentStatus::Canceled),
            _ => None,
        }
    }
}

/// Admin listing row: an appointment joined with its customer.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentWithCustomer {
    pub appointment: Appointment,
    pub customer_name: String,
    pub customer_phone: String,
}
