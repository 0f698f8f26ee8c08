use clap::{Parser, Subcommand, builder::styling};
use eyre::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use supabase_migrate::cli::{self, MigrateOptions};

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// Supabase Migrate: copy every row of a list of tables from one Supabase project to another
#[derive(Parser)]
#[command(name = "supamigrate", version, styles = STYLES)]
struct Cli {
    /// The dotenv file to source credentials from
    #[arg(short, long, global = true, default_value = ".env.local")]
    env: String,

    /// More verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy every planned table from the source project to the destination project
    Run {
        /// YAML migration plan (defaults to the built-in table list)
        #[arg(short, long)]
        plan: Option<PathBuf>,

        /// Only migrate these tables (repeatable), keeping plan order
        #[arg(short, long)]
        only: Vec<String>,

        /// Save each extracted table to {dir}/{table}.ndjson before loading
        #[arg(short, long, conflicts_with = "restore_from")]
        backup_dir: Option<PathBuf>,

        /// Read tables from NDJSON snapshots instead of the source project
        #[arg(short, long)]
        restore_from: Option<PathBuf>,

        /// Extract and plan batches without writing to the destination
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the tables, keys and sizes a run would use
    Plan {
        /// YAML migration plan (defaults to the built-in table list)
        #[arg(short, long)]
        plan: Option<PathBuf>,

        /// Write the resolved plan to this YAML file
        #[arg(short, long)]
        write: Option<PathBuf>,
    },

    /// Test authorization to both projects
    Auth,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    match dotenvy::from_filename(&cli.env) {
        Ok(path) => log::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {
            log::warn!("No {} file found, using process environment", cli.env)
        }
        Err(e) => return Err(e.into()),
    }

    match cli.command {
        Commands::Run {
            plan,
            only,
            backup_dir,
            restore_from,
            dry_run,
        } => {
            let plan = cli::load_plan(plan.as_deref(), &only)?;
            log::info!(
                "🚀 Migrating {} table(s){}",
                plan.count(),
                if dry_run { " (dry run)".yellow().to_string() } else { String::new() }
            );
            let options = MigrateOptions {
                backup_dir,
                restore_from,
                dry_run,
            };
            let report = cli::migrate(&plan, &options).await?;
            cli::log_summary(&report);
        }
        Commands::Plan { plan, write } => {
            let plan = cli::load_plan(plan.as_deref(), &[])?;
            cli::log_plan(&plan);
            if let Some(path) = write {
                plan.write(&path)?;
                log::info!("✓ Wrote plan to {}", path.display().bright_black());
            }
        }
        Commands::Auth => {
            log::info!("Testing authorization");
            let ok = cli::test_auth().await?;
            log::info!("{}/2 project(s) reachable", ok);
        }
    }

    Ok(())
}
