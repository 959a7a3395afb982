use std::borrow::Cow;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use env_logger::Env;
use feed_db::cve_sources::{self, nist};
use feed_db::db;

mod configuration;

use crate::configuration::{DatabaseSettings, MirrorSettings};

fn main() -> Result<()> {
    let opts = Opts::parse();

    dotenv().ok();

    // Setup logger
    {
        #[cfg(debug_assertions)]
        let default_env_filter = "debug";
        #[cfg(not(debug_assertions))]
        let default_env_filter = "info";

        let env = Env::default().default_filter_or(default_env_filter);
        env_logger::Builder::from_env(env)
            .try_init()
            .context("Failed to setup logger")?;
    }

    // Repository
    let repository = {
        let db_settings = DatabaseSettings::try_from_env()?;

        db::PostgresRepository::new(&db_settings.connection_string(), "./migrations")
            .context("Cannot connect to database")?
    };

    // Check for migrations
    if repository.any_pending_migrations()? {
        if opts.migrate {
            repository.run_pending_migrations()?;
            log::info!("Migration successful")
        } else {
            log::error!("Migration needed");
            std::process::exit(1)
        }
    }

    let mirror = MirrorSettings::try_from_env()?;

    match opts.cmd {
        Commands::Sync => {
            sync_mirror(&mirror)?;
        }
        Commands::Import { year } => {
            let report = match year {
                Some(year) => nist::import_year(&repository, &mirror.path, year)?,
                None => nist::import_mirror(&repository, &mirror.path)?,
            };
            log::info!("{}", report_message(&report));
        }
        Commands::Update => {
            sync_mirror(&mirror)?;
            let report = nist::import_mirror(&repository, &mirror.path)?;
            log::info!("{}", report_message(&report));
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(author, version, about)]
#[command(disable_help_subcommand = true)]
struct Opts {
    /// Migrate database
    #[arg(short = 'm', long = "migrate")]
    migrate: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronizes the local feed mirror with the NVD
    Sync,
    /// Loads mirrored feeds into the database
    Import {
        /// Restrict the import to a single feed year
        #[arg(short = 'y', long = "year")]
        year: Option<u16>,
    },
    /// Synchronizes the mirror, then loads it into the database
    Update,
}

fn sync_mirror(mirror: &MirrorSettings) -> Result<()> {
    let client = cve_sources::http_client().context("could not create http client")?;

    let report = nist::sync::synchronize(&client, &mirror.path, nist::feed_years())?;

    if report.remote_unknown {
        log::warn!("remote state could not be determined, mirror left untouched");
        return Ok(());
    }
    if !report.failures.is_empty() {
        log::warn!("{} transfers failed", report.failures.len());
    }
    log::info!(
        "mirror in sync: {} fetched, {} deleted",
        report.fetched,
        report.deleted
    );

    Ok(())
}

fn report_message(report: &nist::ImportReport) -> Cow<'static, str> {
    if report.imported == 0 && report.failed == 0 {
        Cow::Borrowed("No records ingested")
    } else {
        Cow::Owned(format!(
            "{} records ingested, {} skipped without severity, {} failed",
            report.imported, report.skipped, report.failed
        ))
    }
}
