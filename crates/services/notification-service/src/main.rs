//! Notification Service - digest emails for starting migrations.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notification_service_lib::jobs::PassReport;
use notification_service_lib::MigrateAction;

#[derive(Parser)]
#[command(name = "notification-service")]
#[command(about = "Migration start notifications")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server and the daily scheduler
    Serve {
        /// Bind host, overrides NOTIFICATION_SERVICE_HOST
        #[arg(long)]
        host: Option<String>,
        /// Bind port, overrides NOTIFICATION_SERVICE_PORT
        #[arg(long)]
        port: Option<u16>,
        /// Only run passes when triggered over HTTP
        #[arg(long)]
        no_scheduler: bool,
    },
    /// Run a single notification pass and exit
    RunOnce,
    /// Database migration commands
    Migrate {
        #[command(subcommand)]
        action: MigrateCommands,
    },
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Run pending migrations
    Up,
    /// Rollback last migration
    Down,
    /// Show migration status
    Status,
    /// Reset database and run all migrations
    Fresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Serve {
            host,
            port,
            no_scheduler,
        } => {
            notification_service_lib::run_embedded(host, port, !no_scheduler).await?;
        }
        Commands::RunOnce => match notification_service_lib::run_once().await? {
            PassReport::Completed(summary) => println!(
                "Sent {} digest(s), {} failed, {} user(s) considered",
                summary.sent, summary.failed, summary.users_considered
            ),
            PassReport::Skipped { reason } => println!("Pass skipped: {:?}", reason),
        },
        Commands::Migrate { action } => {
            let migrate_action = match action {
                MigrateCommands::Up => MigrateAction::Up,
                MigrateCommands::Down => MigrateAction::Down,
                MigrateCommands::Status => MigrateAction::Status,
                MigrateCommands::Fresh => MigrateAction::Fresh,
            };
            notification_service_lib::run_migrations(migrate_action).await?;
        }
    }

    Ok(())
}

/// Initialize tracing subscriber
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        "debug".to_string()
    } else {
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".to_string())
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
