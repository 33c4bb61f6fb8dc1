//! Notification Service Library
//!
//! Sends each user a digest email when migrations passing through their
//! home location begin. Runs as a long-lived service with a built-in daily
//! scheduler and an HTTP trigger, or as a single pass from the CLI.

pub mod config;
pub mod http;
pub mod infra;
pub mod jobs;
pub mod mailer;
pub mod repository;
pub mod scheduler;

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::NotificationServiceConfig;
use crate::http::{create_router, AppState};
use crate::infra::Database;
use crate::jobs::{NotificationJob, PassReport};
use crate::mailer::build_mailer;
use crate::repository::UserDirectoryStore;

/// Run the service: HTTP surface plus, optionally, the daily scheduler.
pub async fn run_embedded(
    host: Option<String>,
    port: Option<u16>,
    with_scheduler: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = NotificationServiceConfig::from_env().with_bind_override(host, port);
    let db = Database::connect(&config.database).await?;

    // Seed the gate with the start time so a restart cannot resend today's digests
    let job = build_job(&config, &db, Utc::now())?;

    if with_scheduler {
        let scheduled = Arc::clone(&job);
        let send_at = config.send_at;
        tokio::spawn(async move {
            scheduler::run(scheduled, send_at, shutdown_signal()).await;
        });
    } else {
        info!("Built-in scheduler disabled, passes run only via POST /notifications/run");
    }

    let app = create_router(AppState::new(job, Some(db)));

    let addr: SocketAddr = format!("{}:{}", config.service.host, config.service.port).parse()?;
    info!(service = %config.service.service_name, "Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Run a single pass immediately (for CLI use and external cron).
pub async fn run_once() -> Result<PassReport, Box<dyn std::error::Error>> {
    let config = NotificationServiceConfig::from_env();
    let db = Database::connect_without_migrations(&config.database).await?;

    // A one-shot process has no earlier pass to collide with
    let now = Utc::now();
    let job = build_job(&config, &db, now - config.notifications.cooldown)?;

    Ok(job.run_pass(now).await?)
}

/// Run migrations (for CLI commands).
pub async fn run_migrations(action: MigrateAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = NotificationServiceConfig::from_env();
    let db = Database::connect_without_migrations(&config.database).await?;

    match action {
        MigrateAction::Up => {
            db.run_migrations().await?;
            info!("Migrations applied successfully");
        }
        MigrateAction::Down => {
            db.rollback_migration().await?;
            info!("Rolled back last migration");
        }
        MigrateAction::Status => {
            let status = db.migration_status().await?;
            for (name, applied) in status {
                let marker = if applied { "[x]" } else { "[ ]" };
                println!("{} {}", marker, name);
            }
        }
        MigrateAction::Fresh => {
            db.fresh_migrations().await?;
            info!("Database reset and migrations applied");
        }
    }

    Ok(())
}

/// Migration action type.
#[derive(Debug, Clone, Copy)]
pub enum MigrateAction {
    Up,
    Down,
    Status,
    Fresh,
}

fn build_job(
    config: &NotificationServiceConfig,
    db: &Database,
    last_run_at: DateTime<Utc>,
) -> common::AppResult<Arc<NotificationJob>> {
    let directory = Arc::new(UserDirectoryStore::new(db.get_connection()));
    let mailer = build_mailer(config)?;

    Ok(Arc::new(NotificationJob::new(
        directory,
        mailer,
        config.notifications.clone(),
        last_run_at,
    )))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
