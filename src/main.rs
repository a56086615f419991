use std::sync::{Arc, Mutex};

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use barberbook::config::AppConfig;
use barberbook::db;
use barberbook::handlers;
use barberbook::services::messaging::twilio::TwilioSmsProvider;
use barberbook::services::messaging::{LogMessaging, MessagingProvider};
use barberbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env()?;

    if config.admin_password.is_none() {
        tracing::warn!("ADMIN_PASSWORD is not set; admin routes will answer 500");
    }

    let conn = db::init_db(&config.database_url)?;

    let messaging: Box<dyn MessagingProvider> = match TwilioSmsProvider::from_config(&config)? {
        Some(twilio) => {
            tracing::info!("booking notifications via Twilio SMS");
            Box::new(twilio)
        }
        None => {
            tracing::info!("Twilio not configured, booking notifications go to the log");
            Box::new(LogMessaging)
        }
    };

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        messaging,
    });

    let app = handlers::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(timezone = %config.timezone, "starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
