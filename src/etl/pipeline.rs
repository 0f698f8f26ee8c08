//! Pipeline orchestration for table migrations

use super::{ExtractStatus, Extractor, Loader, MigrationReport, TableReport, TableState};
use crate::client::Record;
use crate::plan::TableDescriptor;
use crate::storage::NdjsonWriter;
use std::path::{Path, PathBuf};

/// Runs extract then load for each table, one table at a time
///
/// # Type Parameters
/// - `E`: Extractor reading from the source
/// - `L`: Loader writing to the destination
///
/// # Example
/// ```no_run
/// use supabase_migrate::client::{Credentials, RestClient};
/// use supabase_migrate::etl::{BatchLoader, PagedExtractor, Pipeline};
/// use supabase_migrate::plan::MigrationPlan;
///
/// # async fn example() -> eyre::Result<()> {
/// let source = RestClient::try_new(Credentials::parse("https://old.supabase.co", "k1")?)?;
/// let destination = RestClient::try_new(Credentials::parse("https://new.supabase.co", "k2")?)?;
/// let plan = MigrationPlan::default();
///
/// let pipeline = Pipeline::new(
///     PagedExtractor::new(source).with_page_size(plan.page_size),
///     BatchLoader::new(destination).with_batch_size(plan.batch_size),
/// );
///
/// let report = pipeline.run(&plan.descriptors()).await;
/// println!("Wrote {} records", report.written());
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<E, L> {
    extractor: E,
    loader: L,
    backup_dir: Option<PathBuf>,
}

impl<E, L> Pipeline<E, L>
where
    E: Extractor,
    L: Loader,
{
    /// Create a new pipeline
    pub fn new(extractor: E, loader: L) -> Self {
        Self {
            extractor,
            loader,
            backup_dir: None,
        }
    }

    /// Snapshot each table's extracted records to `{dir}/{table}.ndjson`
    /// before loading
    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    /// Migrate every table in order
    ///
    /// Failures in one table never stop the following tables.
    pub async fn run(&self, tables: &[TableDescriptor]) -> MigrationReport {
        log::info!("Migrating {} table(s)", tables.len());

        let mut report = MigrationReport::default();
        for table in tables {
            log::info!("{}", "-".repeat(30));
            report.tables.push(self.run_table(table).await);
        }
        report
    }

    /// Extract `table` completely, then load whatever was extracted
    pub async fn run_table(&self, table: &TableDescriptor) -> TableReport {
        let mut state = TableState::NotStarted;

        state = advance(table, state, TableState::Extracting);
        let extraction = self.extractor.extract(table).await;

        let extracted_as = match &extraction.status {
            ExtractStatus::Complete => TableState::Extracted,
            ExtractStatus::Partial { offset, .. } => {
                log::warn!(
                    "{}: continuing with {} record(s) read before offset {}",
                    table.name,
                    extraction.len(),
                    offset
                );
                TableState::ExtractFailedPartial
            }
        };
        state = advance(table, state, extracted_as);

        if let Some(dir) = &self.backup_dir {
            self.backup(dir, table, &extraction.records);
        }

        state = advance(table, state, TableState::Loading);
        let load = self.loader.load(table, &extraction.records).await;
        state = advance(table, state, TableState::Done);

        TableReport {
            table: table.clone(),
            state,
            extracted_as,
            extracted: extraction.len(),
            pages: extraction.pages,
            extract_status: extraction.status,
            load,
        }
    }

    fn backup(&self, dir: &Path, table: &TableDescriptor, records: &[Record]) {
        let path = dir.join(format!("{}.ndjson", table.name));
        let result = std::fs::create_dir_all(dir)
            .map_err(eyre::Report::from)
            .and_then(|_| NdjsonWriter::new(&path).write(records));
        match result {
            Ok(()) => log::debug!("Saved {} record(s) to {}", records.len(), path.display()),
            Err(e) => log::warn!("Failed to save snapshot {}: {:#}", path.display(), e),
        }
    }
}

fn advance(table: &TableDescriptor, from: TableState, to: TableState) -> TableState {
    debug_assert!(from.can_advance_to(to), "{} -> {}", from, to);
    log::debug!("{}: {} -> {}", table.name, from, to);
    to
}
