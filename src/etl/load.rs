//! Batched upserts into a destination table

use super::{BatchOutcome, BatchResult, LoadReport};
use crate::client::{Record, RecordStore};
use crate::plan::{DEFAULT_BATCH_SIZE, DEFAULT_PROGRESS_EVERY, TableDescriptor};
use std::future::Future;

/// Loader trait for writing a table's records to a destination
///
/// A failed batch is recorded in the report and the remaining batches are
/// still attempted.
pub trait Loader: Send + Sync {
    /// Write `records` into `table`, merging on the table's key column
    fn load(
        &self,
        table: &TableDescriptor,
        records: &[Record],
    ) -> impl Future<Output = LoadReport> + Send;
}

impl<L: Loader> Loader for &L {
    fn load(
        &self,
        table: &TableDescriptor,
        records: &[Record],
    ) -> impl Future<Output = LoadReport> + Send {
        (**self).load(table, records)
    }
}

/// Split `items` into consecutive batches of at most `size`, each paired
/// with the offset of its first item
pub fn batches<T>(items: &[T], size: usize) -> impl Iterator<Item = (usize, &[T])> {
    let size = size.max(1);
    items
        .chunks(size)
        .enumerate()
        .map(move |(index, chunk)| (index * size, chunk))
}

/// Whether the batch at `offset` of `len` records should log progress
///
/// True when the batch ends on or past the next multiple of `every`, and
/// always for the batch that ends the input. Progress is the position
/// reached in the input, so earlier failed batches are included.
pub fn progress_due(offset: usize, len: usize, total: usize, every: usize) -> bool {
    let every = every.max(1);
    let reached = offset + len;
    reached >= total || reached / every > offset / every
}

/// Upserts records in fixed-size batches with merge-on-key semantics
///
/// Re-running a load after a partial failure only overwrites rows, it never
/// duplicates them.
pub struct BatchLoader<S> {
    store: S,
    batch_size: usize,
    progress_every: usize,
}

impl<S: RecordStore> BatchLoader<S> {
    /// Create a loader using the default batch size (100)
    pub fn new(store: S) -> Self {
        Self {
            store,
            batch_size: DEFAULT_BATCH_SIZE,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Log progress each time this many records have been written
    pub fn with_progress_every(mut self, progress_every: usize) -> Self {
        self.progress_every = progress_every.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Upsert every record of `table`, one request per batch
    pub async fn upsert_all(&self, table: &TableDescriptor, records: &[Record]) -> LoadReport {
        if records.is_empty() {
            log::info!("No records to migrate in {}", table.name);
            return LoadReport::empty(&table.name);
        }

        let total = records.len();
        log::info!("Sending {} record(s) to {}...", total, table.name);

        let mut outcomes = Vec::with_capacity(total.div_ceil(self.batch_size));
        for (offset, batch) in batches(records, self.batch_size) {
            let result = match self.store.upsert(&table.name, &table.key, batch).await {
                Ok(()) => {
                    if progress_due(offset, batch.len(), total, self.progress_every) {
                        log::info!("  processed {}/{}", offset + batch.len(), total);
                    }
                    BatchResult::Written
                }
                Err(failure) => {
                    log::error!(
                        "  batch at offset {} of {} failed: {}",
                        offset,
                        table.name,
                        failure
                    );
                    BatchResult::Failed(failure)
                }
            };
            outcomes.push(BatchOutcome {
                offset,
                len: batch.len(),
                result,
            });
        }

        LoadReport {
            table: table.name.clone(),
            total,
            batches: outcomes,
        }
    }
}

impl<S: RecordStore> Loader for BatchLoader<S> {
    async fn load(&self, table: &TableDescriptor, records: &[Record]) -> LoadReport {
        self.upsert_all(table, records).await
    }
}

/// Plans batches without sending anything to the destination
pub struct DryRunLoader {
    batch_size: usize,
}

impl DryRunLoader {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }
}

impl Default for DryRunLoader {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl Loader for DryRunLoader {
    async fn load(&self, table: &TableDescriptor, records: &[Record]) -> LoadReport {
        if records.is_empty() {
            log::info!("No records to migrate in {}", table.name);
            return LoadReport::empty(&table.name);
        }

        let batches: Vec<BatchOutcome> = batches(records, self.batch_size)
            .map(|(offset, batch)| BatchOutcome {
                offset,
                len: batch.len(),
                result: BatchResult::Skipped,
            })
            .collect();

        log::info!(
            "[dry run] would send {} record(s) to {} in {} request(s)",
            records.len(),
            table.name,
            batches.len()
        );

        LoadReport {
            table: table.name.clone(),
            total: records.len(),
            batches,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::memory::{Call, MemoryStore, row};

    fn records(key: &str, count: usize) -> Vec<Record> {
        (1..=count).map(|i| row(key, i as i64)).collect()
    }

    /// Positions at which a load of `total` records logs progress
    fn progress_points(total: usize, batch_size: usize, every: usize) -> Vec<usize> {
        let items: Vec<usize> = (0..total).collect();
        batches(&items, batch_size)
            .filter(|(offset, batch)| progress_due(*offset, batch.len(), total, every))
            .map(|(offset, batch)| offset + batch.len())
            .collect()
    }

    #[test]
    fn test_progress_every_500_records() {
        assert_eq!(
            progress_points(2500, 100, 500),
            vec![500, 1000, 1500, 2000, 2500]
        );
    }

    #[test]
    fn test_progress_on_short_final_batch() {
        assert_eq!(
            progress_points(2550, 100, 500),
            vec![500, 1000, 1500, 2000, 2500, 2550]
        );
        assert_eq!(progress_points(40, 100, 500), vec![40]);
    }

    #[test]
    fn test_progress_with_batch_size_not_dividing_interval() {
        assert_eq!(progress_points(2000, 300, 500), vec![600, 1200, 1500, 2000]);
        assert_eq!(progress_points(1000, 700, 500), vec![700, 1000]);
        assert_eq!(progress_points(3, 1, 500), vec![3]);
    }

    fn write_sizes(store: &MemoryStore) -> Vec<usize> {
        store
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Upsert { len, .. } => Some(len),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_batches_reconstruct_input() {
        for (len, size) in [(0, 100), (1, 100), (99, 100), (100, 100), (2500, 100), (7, 3)] {
            let items: Vec<usize> = (0..len).collect();
            let parts: Vec<(usize, &[usize])> = batches(&items, size).collect();

            assert_eq!(parts.len(), len.div_ceil(size));
            let rebuilt: Vec<usize> = parts.iter().flat_map(|(_, b)| b.iter().copied()).collect();
            assert_eq!(rebuilt, items);
            for (offset, batch) in &parts {
                assert_eq!(batch.first(), items.get(*offset));
                assert!(batch.len() <= size);
            }
        }
    }

    #[tokio::test]
    async fn test_empty_input_is_noop() {
        let store = MemoryStore::new();
        let loader = BatchLoader::new(&store);

        let report = loader
            .upsert_all(&TableDescriptor::new("t", "id"), &[])
            .await;

        assert_eq!(report.requests(), 0);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_last_batch_smaller() {
        let store = MemoryStore::new();
        let loader = BatchLoader::new(&store);

        let report = loader
            .upsert_all(&TableDescriptor::new("t", "id"), &records("id", 250))
            .await;

        assert_eq!(write_sizes(&store), vec![100, 100, 50]);
        assert_eq!(report.written(), 250);
        assert_eq!(store.rows("t").len(), 250);
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_stop_the_rest() {
        let store = MemoryStore::new().fail_write(10);
        let loader = BatchLoader::new(&store);

        let report = loader
            .upsert_all(&TableDescriptor::new("candidatos", "id"), &records("id", 2500))
            .await;

        assert_eq!(write_sizes(&store).len(), 25);
        assert_eq!(report.requests(), 25);
        assert_eq!(report.failed_count(), 1);

        let failed = report.failed().next().unwrap();
        assert_eq!(failed.offset, 900);
        assert_eq!(failed.len, 100);

        assert_eq!(report.written(), 2400);
        assert_eq!(store.rows("candidatos").len(), 2400);
    }

    #[tokio::test]
    async fn test_upsert_uses_table_key() {
        let store = MemoryStore::new();
        let loader = BatchLoader::new(&store);

        loader
            .upsert_all(
                &TableDescriptor::new("respostas_gestor", "id_resposta"),
                &records("id_resposta", 3),
            )
            .await;

        assert_eq!(
            store.calls(),
            vec![Call::Upsert {
                table: "respostas_gestor".to_string(),
                conflict_key: "id_resposta".to_string(),
                len: 3,
            }]
        );
    }

    #[tokio::test]
    async fn test_loading_twice_is_idempotent() {
        let store = MemoryStore::new();
        let loader = BatchLoader::new(&store).with_batch_size(7);
        let table = TableDescriptor::new("t", "id");
        let input = records("id", 40);

        loader.upsert_all(&table, &input).await;
        let once = store.rows("t");
        loader.upsert_all(&table, &input).await;

        assert_eq!(store.rows("t"), once);
        assert_eq!(once.len(), 40);
    }

    #[tokio::test]
    async fn test_dry_run_sends_nothing() {
        let loader = DryRunLoader::new(100);

        let report = loader
            .load(&TableDescriptor::new("t", "id"), &records("id", 250))
            .await;

        assert_eq!(report.requests(), 3);
        assert_eq!(report.written(), 0);
        assert_eq!(report.failed_count(), 0);
        assert_eq!(report.total, 250);
    }
}
