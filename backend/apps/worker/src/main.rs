//! Session Purge Worker
//!
//! Deletes invalid session records from PostgreSQL on a fixed period.
//! Uses `anyhow` for startup errors; purge failures are logged and retried
//! on the next tick.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use platform::clock::{Clock, SystemClock};
use session::application::purge::{DEFAULT_PURGE_INTERVAL, MAX_PURGE_INTERVAL, StorePurger};
use session::PgSessionRepository;
use sqlx::postgres::PgPoolOptions;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "worker=info,session=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Database connection
    let database_url =
        env::var("DATABASE_URL").context("DATABASE_URL must be set in environment")?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    let interval = purge_interval();
    let store = Arc::new(PgSessionRepository::new(pool));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let purger = StorePurger::new(store.clone(), store, clock, interval);

    // First tick fires immediately: purge once at startup
    let mut ticker = tokio::time::interval(purger.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(interval_secs = interval.as_secs(), "Purge worker started");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        // Shutdown is also honoured while a purge is in flight
        let purge = async {
            ticker.tick().await;
            purge_and_report(&purger).await;
        };
        tokio::select! {
            _ = purge => {}
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}

async fn purge_and_report(purger: &StorePurger<PgSessionRepository, PgSessionRepository>) {
    if let Err(e) = purger.run_once().await {
        tracing::warn!(error = %e, "Session purge failed, retrying next period");
        return;
    }
    if let Ok(counts) = purger.session_counts().await {
        tracing::info!(
            total = counts.total,
            active = counts.active,
            inactive = counts.inactive,
            "Session store statistics"
        );
    }
}

/// `PURGE_INTERVAL_SECS`, falling back to the daily default
fn purge_interval() -> Duration {
    let Ok(raw) = env::var("PURGE_INTERVAL_SECS") else {
        return DEFAULT_PURGE_INTERVAL;
    };
    match raw.parse::<u64>().map(Duration::from_secs) {
        Ok(interval) if !interval.is_zero() && interval <= MAX_PURGE_INTERVAL => interval,
        _ => {
            tracing::warn!(
                value = %raw,
                max_secs = MAX_PURGE_INTERVAL.as_secs(),
                "Invalid PURGE_INTERVAL_SECS, using the default"
            );
            DEFAULT_PURGE_INTERVAL
        }
    }
}
