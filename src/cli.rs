//! CLI helper functions

use crate::{
    client::{Credentials, RestClient},
    etl::{
        BatchLoader, DryRunLoader, ExtractStatus, Extractor, Loader, MigrationReport,
        PagedExtractor, Pipeline, SnapshotExtractor,
    },
    plan::MigrationPlan,
};
use eyre::{Context, Result};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

/// (URL, key) variable pairs for each project, in order of preference
///
/// A pair is only ever taken whole so a URL is never sent another
/// project's key.
pub const SOURCE_VARS: &[(&str, &str)] = &[("SOURCE_SUPABASE_URL", "SOURCE_SUPABASE_KEY")];
pub const DEST_VARS: &[(&str, &str)] = &[
    ("DEST_SUPABASE_URL", "DEST_SUPABASE_KEY"),
    ("VITE_SUPABASE_URL", "VITE_SUPABASE_ANON_KEY"),
];

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Credentials from the first pair with both variables set
///
/// A pair with only one variable set is a configuration error rather than
/// something to skip over.
fn load_credentials(pairs: &[(&str, &str)]) -> Result<Credentials> {
    for &(url_var, key_var) in pairs {
        match (non_empty_var(url_var), non_empty_var(key_var)) {
            (Some(url), Some(key)) => {
                return Credentials::parse(&url, key)
                    .with_context(|| format!("Invalid {}", url_var));
            }
            (Some(_), None) => eyre::bail!("{} is set but {} is not", url_var, key_var),
            (None, Some(_)) => eyre::bail!("{} is set but {} is not", key_var, url_var),
            (None, None) => continue,
        }
    }

    let urls: Vec<&str> = pairs.iter().map(|(url_var, _)| *url_var).collect();
    eyre::bail!("{} environment variable not set", urls.join(" or "))
}

/// Load the source project's client from environment variables
///
/// Expected environment variables:
/// - SOURCE_SUPABASE_URL: Source project base URL (required)
/// - SOURCE_SUPABASE_KEY: Source project API key (required)
pub fn load_source_client() -> Result<RestClient> {
    let credentials = load_credentials(SOURCE_VARS)?;
    RestClient::try_new(credentials).context("Failed to create source client")
}

/// Load the destination project's client from environment variables
///
/// Expected environment variables:
/// - DEST_SUPABASE_URL and DEST_SUPABASE_KEY, or
/// - the app's VITE_SUPABASE_URL and VITE_SUPABASE_ANON_KEY
pub fn load_destination_client() -> Result<RestClient> {
    let credentials = load_credentials(DEST_VARS)?;
    RestClient::try_new(credentials).context("Failed to create destination client")
}

/// Load the plan from `path` (or the built-in one), restrict it to `only`
/// and validate it
pub fn load_plan(path: Option<&Path>, only: &[String]) -> Result<MigrationPlan> {
    let plan = match path {
        Some(path) => {
            log::info!("Loading migration plan from {}", path.display());
            MigrationPlan::read(path)?
        }
        None => {
            log::debug!("No plan file given, using built-in plan");
            MigrationPlan::default()
        }
    };
    let plan = plan.select(only)?;
    plan.validate()?;
    Ok(plan)
}

/// How `migrate` should source and sink records
#[derive(Debug, Clone, Default)]
pub struct MigrateOptions {
    /// Write `{table}.ndjson` snapshots here before loading
    pub backup_dir: Option<PathBuf>,
    /// Read tables from snapshots here instead of the source project
    pub restore_from: Option<PathBuf>,
    /// Extract and plan batches without writing to the destination
    pub dry_run: bool,
}

/// Run the migration described by `plan`
///
/// Credentials are only required for the projects actually contacted.
/// Once the run starts nothing aborts it; failures end up in the report.
pub async fn migrate(plan: &MigrationPlan, options: &MigrateOptions) -> Result<MigrationReport> {
    let backup = options.backup_dir.as_deref();
    let dry_run = DryRunLoader::new(plan.batch_size);

    let report = match (&options.restore_from, options.dry_run) {
        (Some(dir), true) => {
            run_pipeline(SnapshotExtractor::new(dir), dry_run, plan, backup).await
        }
        (Some(dir), false) => {
            let loader = batch_loader(load_destination_client()?, plan);
            run_pipeline(SnapshotExtractor::new(dir), loader, plan, backup).await
        }
        (None, true) => {
            let extractor = paged_extractor(load_source_client()?, plan);
            run_pipeline(extractor, dry_run, plan, backup).await
        }
        (None, false) => {
            let extractor = paged_extractor(load_source_client()?, plan);
            let loader = batch_loader(load_destination_client()?, plan);
            run_pipeline(extractor, loader, plan, backup).await
        }
    };

    Ok(report)
}

fn paged_extractor(client: RestClient, plan: &MigrationPlan) -> PagedExtractor<RestClient> {
    log::info!("Source: {}", client.bright_black());
    PagedExtractor::new(client).with_page_size(plan.page_size)
}

fn batch_loader(client: RestClient, plan: &MigrationPlan) -> BatchLoader<RestClient> {
    log::info!("Destination: {}", client.bright_black());
    BatchLoader::new(client)
        .with_batch_size(plan.batch_size)
        .with_progress_every(plan.progress_every)
}

async fn run_pipeline<E: Extractor, L: Loader>(
    extractor: E,
    loader: L,
    plan: &MigrationPlan,
    backup: Option<&Path>,
) -> MigrationReport {
    let mut pipeline = Pipeline::new(extractor, loader);
    if let Some(dir) = backup {
        log::info!("Saving snapshots to {}", dir.display());
        pipeline = pipeline.with_backup_dir(dir);
    }
    pipeline.run(&plan.descriptors()).await
}

/// Probe both projects and log the HTTP status each one answers with
///
/// Returns the number of projects that answered with a success status.
pub async fn test_auth() -> Result<usize> {
    let mut ok = 0;
    for (role, client) in [
        ("source", load_source_client()),
        ("destination", load_destination_client()),
    ] {
        let client = match client {
            Ok(client) => client,
            Err(e) => {
                log::error!("{}: {:#}", role, e);
                continue;
            }
        };
        match client.test_connection().await {
            Ok(response) if response.status().is_success() => {
                log::info!("✓ {} {} ({})", role, client.bright_black(), response.status());
                ok += 1;
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                log::error!("✗ {} {} ({}): {}", role, client, status, body);
            }
            Err(e) => log::error!("✗ {} {}: {:#}", role, client, e),
        }
    }
    Ok(ok)
}

/// Log the resolved table order and keys
pub fn log_plan(plan: &MigrationPlan) {
    log::info!(
        "{} table(s), page size {}, batch size {}",
        plan.count(),
        plan.page_size,
        plan.batch_size
    );
    for (n, table) in plan.descriptors().iter().enumerate() {
        log::info!("  {}. {} (key: {})", n + 1, table.name.cyan(), table.key);
    }
}

/// Log one line per table plus totals
pub fn log_summary(report: &MigrationReport) {
    log::info!("{}", "=".repeat(30));
    for table in &report.tables {
        let name = &table.table.name;
        let load = &table.load;
        let line = format!(
            "{}: extracted {}, written {}/{} in {} request(s)",
            name,
            table.extracted,
            load.written(),
            load.total,
            load.requests()
        );
        if table.is_clean() {
            log::info!("✓ {}", line.green());
            continue;
        }

        log::warn!("✗ {}", line.yellow());
        if let ExtractStatus::Partial { offset, failure } = &table.extract_status {
            log::warn!("    extraction stopped at offset {}: {}", offset, failure);
        }
        for batch in load.failed() {
            log::warn!(
                "    batch at offset {} ({} records) not written",
                batch.offset,
                batch.len
            );
        }
    }

    let totals = format!(
        "{} table(s), {} record(s) extracted, {} written, {} failed batch(es)",
        report.tables.len(),
        report.extracted(),
        report.written(),
        report.failed_batches()
    );
    if report.is_clean() {
        log::info!("✨ Migration complete: {}", totals.bold());
    } else {
        log::warn!(
            "Migration finished with errors: {}. Re-running is safe; rows merge on key.",
            totals.bold()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn clear_env() {
        unsafe {
            for (url_var, key_var) in SOURCE_VARS.iter().chain(DEST_VARS) {
                std::env::remove_var(url_var);
                std::env::remove_var(key_var);
            }
        }
    }

    #[test]
    #[serial_test::serial]
    fn test_load_source_client_no_url() {
        clear_env();

        let result = load_source_client();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("SOURCE_SUPABASE_URL")
        );
    }

    #[test]
    #[serial_test::serial]
    fn test_load_source_client_no_key() {
        clear_env();
        unsafe {
            std::env::set_var("SOURCE_SUPABASE_URL", "https://old.supabase.co");
        }

        let result = load_source_client();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("SOURCE_SUPABASE_KEY")
        );

        clear_env();
    }

    #[test]
    #[serial_test::serial]
    fn test_load_source_client_invalid_url() {
        clear_env();
        unsafe {
            std::env::set_var("SOURCE_SUPABASE_URL", "not-a-valid-url");
            std::env::set_var("SOURCE_SUPABASE_KEY", "key");
        }

        let result = load_source_client();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Invalid SOURCE_SUPABASE_URL")
        );

        clear_env();
    }

    #[test]
    #[serial_test::serial]
    fn test_destination_falls_back_to_app_env() {
        clear_env();
        unsafe {
            std::env::set_var("VITE_SUPABASE_URL", "https://new.supabase.co");
            std::env::set_var("VITE_SUPABASE_ANON_KEY", "anon");
        }

        let client = load_destination_client().unwrap();
        assert_eq!(client.base().as_str(), "https://new.supabase.co/rest/v1/");

        clear_env();
    }

    #[test]
    #[serial_test::serial]
    fn test_destination_prefers_explicit_vars() {
        clear_env();
        unsafe {
            std::env::set_var("DEST_SUPABASE_URL", "https://dest.supabase.co");
            std::env::set_var("DEST_SUPABASE_KEY", "dest");
            std::env::set_var("VITE_SUPABASE_URL", "https://app.supabase.co");
            std::env::set_var("VITE_SUPABASE_ANON_KEY", "anon");
        }

        let client = load_destination_client().unwrap();
        assert_eq!(client.base().host_str(), Some("dest.supabase.co"));

        clear_env();
    }

    #[test]
    #[serial_test::serial]
    fn test_destination_never_mixes_pairs() {
        clear_env();
        unsafe {
            std::env::set_var("DEST_SUPABASE_URL", "https://dest.supabase.co");
            std::env::set_var("VITE_SUPABASE_URL", "https://app.supabase.co");
            std::env::set_var("VITE_SUPABASE_ANON_KEY", "app-anon-key");
        }

        let result = load_destination_client();
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "DEST_SUPABASE_URL is set but DEST_SUPABASE_KEY is not"
        );

        clear_env();
    }

    #[test]
    #[serial_test::serial]
    fn test_destination_key_without_url() {
        clear_env();
        unsafe {
            std::env::set_var("DEST_SUPABASE_KEY", "dest");
        }

        let result = load_destination_client();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("DEST_SUPABASE_KEY is set but DEST_SUPABASE_URL is not")
        );

        clear_env();
    }

    #[test]
    #[serial_test::serial]
    fn test_destination_nothing_set() {
        clear_env();

        let err = load_destination_client().unwrap_err();
        assert!(
            err.to_string()
                .contains("DEST_SUPABASE_URL or VITE_SUPABASE_URL")
        );
    }

    #[test]
    fn test_load_plan_default() {
        let plan = load_plan(None, &[]).unwrap();
        assert_eq!(plan, MigrationPlan::default());
    }

    #[test]
    fn test_load_plan_from_file_with_selection() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("migration.yml");
        std::fs::write(
            &path,
            "tables: [clientes, pedidos, itens]\nkeys:\n  pedidos: numero\nbatch_size: 20\n",
        )
        .unwrap();

        let only = ["itens".to_string(), "pedidos".to_string()];
        let plan = load_plan(Some(path.as_path()), &only).unwrap();
        assert_eq!(plan.tables, vec!["pedidos", "itens"]);
        assert_eq!(plan.key_for("pedidos"), "numero");
        assert_eq!(plan.batch_size, 20);
    }

    #[test]
    fn test_load_plan_rejects_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("migration.yml");
        std::fs::write(&path, "tables: [a]\npage_size: 0\n").unwrap();

        let err = load_plan(Some(path.as_path()), &[]).unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }

    #[tokio::test]
    async fn test_restore_dry_run_needs_no_credentials() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("candidatos.ndjson"),
            "{\"id\": 1}\n{\"id\": 2}\n{\"id\": 3}\n",
        )
        .unwrap();

        let plan = MigrationPlan::new(vec!["candidatos".to_string()]).with_batch_size(2);
        let options = MigrateOptions {
            restore_from: Some(temp_dir.path().to_path_buf()),
            dry_run: true,
            ..Default::default()
        };

        let report = migrate(&plan, &options).await.unwrap();
        assert_eq!(report.extracted(), 3);
        assert_eq!(report.tables[0].load.requests(), 2);
        assert_eq!(report.written(), 0);
    }
}
