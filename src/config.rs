use std::env;

use anyhow::Context;
use chrono_tz::Tz;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    /// Shared secret for the admin panel. `None` means admin routes answer 500.
    pub admin_password: Option<String>,
    /// The single civil timezone every date and time in the API is read in.
    pub timezone: Tz,
    pub provider_id: i64,
    pub hide_past_slots: bool,
    pub one_booking_per_day: bool,
    pub owner_phone: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_phone_number: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let tz_name = env::var("SHOP_TIMEZONE").unwrap_or_else(|_| "Europe/Istanbul".to_string());
        let timezone = tz_name
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("invalid SHOP_TIMEZONE: {tz_name}"))?;

        Ok(Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "barberbook.db".to_string()),
            admin_password: env::var("ADMIN_PASSWORD").ok().filter(|p| !p.is_empty()),
            timezone,
            provider_id: env::var("PROVIDER_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            hide_past_slots: env_flag("HIDE_PAST_SLOTS", true),
            one_booking_per_day: env_flag("ONE_BOOKING_PER_DAY", true),
            owner_phone: env::var("OWNER_PHONE").unwrap_or_default(),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            twilio_phone_number: env::var("TWILIO_PHONE_NUMBER").unwrap_or_default(),
        })
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}
