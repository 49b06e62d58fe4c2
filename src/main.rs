//! # Clinic Data Command Line
//!
//! Operational entry point: schema migrations, connectivity checks and
//! reference data seeding against the configured database.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use clinic_data::{
    config::ConfigLoader,
    db, seeds,
    session::Session,
    telemetry::init_tracing,
};
use migration::{Migrator, MigratorTrait};

#[derive(Debug, Parser)]
#[command(name = "clinic-data")]
#[command(about = "Clinic data layer maintenance", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply or inspect schema migrations
    Migrate {
        #[arg(value_enum, default_value_t = MigrateAction::Up)]
        action: MigrateAction,
    },
    /// Check that the database answers queries
    Health,
    /// Insert the default doctors if they are missing
    Seed,
    /// Print the effective configuration with secrets redacted
    Config,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Roll back the most recent migration
    Down,
    /// List applied and pending migrations
    Status,
    /// Drop everything and re-apply all migrations
    Fresh,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;
    init_tracing(&config)?;
    tracing::info!(profile = %config.profile, "configuration loaded");

    if let Commands::Config = cli.command {
        println!("{}", config.redacted_json()?);
        return Ok(());
    }

    let conn = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;

    match cli.command {
        Commands::Migrate { action } => {
            match action {
                MigrateAction::Up => Migrator::up(&conn, None).await?,
                MigrateAction::Down => Migrator::down(&conn, Some(1)).await?,
                MigrateAction::Status => Migrator::status(&conn).await?,
                MigrateAction::Fresh => Migrator::fresh(&conn).await?,
            }
            tracing::info!(?action, "migration command finished");
        }
        Commands::Health => {
            db::health_check(&conn).await?;
            println!("database is healthy");
        }
        Commands::Seed => {
            Migrator::up(&conn, None)
                .await
                .context("applying migrations before seeding")?;
            let session = Session::new(conn);
            let created = seeds::seed_doctors(&session).await?;
            println!("seeded {created} doctors");
        }
        Commands::Config => {}
    }

    Ok(())
}
