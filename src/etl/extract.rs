//! Extraction of a table's full contents

use super::Extraction;
use crate::client::{RecordStore, StoreFailure};
use crate::plan::{DEFAULT_PAGE_SIZE, TableDescriptor};
use crate::storage::NdjsonReader;
use std::future::Future;
use std::path::PathBuf;

/// Extractor trait for reading every record of a table from a source
///
/// Extraction never fails outright: a source that breaks part-way yields
/// the records read so far, marked partial.
pub trait Extractor: Send + Sync {
    /// Read all records of `table`, in a deterministic order
    fn extract(&self, table: &TableDescriptor) -> impl Future<Output = Extraction> + Send;
}

impl<E: Extractor> Extractor for &E {
    fn extract(&self, table: &TableDescriptor) -> impl Future<Output = Extraction> + Send {
        (**self).extract(table)
    }
}

/// Pages through a table with `limit`/`offset`, sorted ascending on the
/// table's key column
///
/// # Example
/// ```no_run
/// use supabase_migrate::client::{Credentials, RestClient};
/// use supabase_migrate::etl::PagedExtractor;
/// use supabase_migrate::plan::TableDescriptor;
///
/// # async fn example() -> eyre::Result<()> {
/// let source = RestClient::try_new(Credentials::parse("https://old.supabase.co", "key")?)?;
/// let extractor = PagedExtractor::new(source);
///
/// let extraction = extractor
///     .fetch_all(&TableDescriptor::new("candidatos", "id"))
///     .await;
/// println!("{} records", extraction.len());
/// # Ok(())
/// # }
/// ```
pub struct PagedExtractor<S> {
    store: S,
    page_size: usize,
}

impl<S: RecordStore> PagedExtractor<S> {
    /// Create an extractor using the default page size (1000)
    pub fn new(store: S) -> Self {
        Self {
            store,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Set the number of rows requested per page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Fetch every page of `table`
    ///
    /// Pages are requested at offsets 0, page_size, 2*page_size, ... until a
    /// page comes back empty or shorter than `page_size`. A failed page ends
    /// pagination and the records gathered so far are returned as partial.
    pub async fn fetch_all(&self, table: &TableDescriptor) -> Extraction {
        log::info!("Fetching {}...", table.name);

        let mut records = Vec::new();
        let mut pages = 0;
        let mut offset = 0;

        loop {
            pages += 1;
            log::debug!(
                "GET {} limit={} offset={} order={}.asc",
                table.name,
                self.page_size,
                offset,
                table.key
            );

            let page = match self
                .store
                .select_page(&table.name, &table.key, self.page_size, offset)
                .await
            {
                Ok(page) => page,
                Err(failure) => {
                    log::error!("Failed to fetch {}: {}", table.name, failure);
                    return Extraction::partial(&table.name, records, pages, offset, failure);
                }
            };

            if page.is_empty() {
                break;
            }

            let len = page.len();
            records.extend(page);
            log::info!("  collected {} record(s)", records.len());

            if len < self.page_size {
                break;
            }
            offset += self.page_size;
        }

        Extraction::complete(&table.name, records, pages)
    }
}

impl<S: RecordStore> Extractor for PagedExtractor<S> {
    async fn extract(&self, table: &TableDescriptor) -> Extraction {
        self.fetch_all(table).await
    }
}

/// Reads tables back from NDJSON snapshots written by a previous run
///
/// Each table is read from `{dir}/{table}.ndjson`.
pub struct SnapshotExtractor {
    dir: PathBuf,
}

impl SnapshotExtractor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.ndjson", table))
    }
}

impl Extractor for SnapshotExtractor {
    async fn extract(&self, table: &TableDescriptor) -> Extraction {
        let path = self.path_for(&table.name);
        log::info!("Reading {} from {}", table.name, path.display());

        match NdjsonReader::new(&path).read() {
            Ok(records) => {
                log::info!("  read {} record(s)", records.len());
                Extraction::complete(&table.name, records, 1)
            }
            Err(e) => {
                let failure = StoreFailure::Io(format!("{:#}", e));
                log::error!("Failed to read {}: {}", table.name, failure);
                Extraction::partial(&table.name, Vec::new(), 1, 0, failure)
            }
        }
    }
}
