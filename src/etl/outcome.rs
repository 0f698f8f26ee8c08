//! Per-page, per-batch and per-table results
//!
//! Nothing in a migration run raises: every read and write produces one of
//! these values, and the caller decides what to log and summarize.

use crate::client::{Record, StoreFailure};
use crate::plan::TableDescriptor;

/// How a table's extraction ended
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractStatus {
    /// Pagination ran until an empty or short page
    Complete,
    /// A page failed; records before `offset` were kept
    Partial { offset: usize, failure: StoreFailure },
}

/// Records read from one table, in page order
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub table: String,
    pub records: Vec<Record>,
    /// Page requests issued, including a failed one
    pub pages: usize,
    pub status: ExtractStatus,
}

impl Extraction {
    pub fn complete(table: impl Into<String>, records: Vec<Record>, pages: usize) -> Self {
        Self {
            table: table.into(),
            records,
            pages,
            status: ExtractStatus::Complete,
        }
    }

    pub fn partial(
        table: impl Into<String>,
        records: Vec<Record>,
        pages: usize,
        offset: usize,
        failure: StoreFailure,
    ) -> Self {
        Self {
            table: table.into(),
            records,
            pages,
            status: ExtractStatus::Partial { offset, failure },
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.status, ExtractStatus::Complete)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// What happened to one batch
#[derive(Debug, Clone, PartialEq)]
pub enum BatchResult {
    Written,
    /// Not sent (dry run)
    Skipped,
    Failed(StoreFailure),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// Index of the batch's first record in the table's record sequence
    pub offset: usize,
    pub len: usize,
    pub result: BatchResult,
}

impl BatchOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.result, BatchResult::Failed(_))
    }
}

/// Result of loading one table's records
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub table: String,
    pub total: usize,
    pub batches: Vec<BatchOutcome>,
}

impl LoadReport {
    /// Report for a table with nothing to load
    pub fn empty(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            total: 0,
            batches: Vec::new(),
        }
    }

    /// Write requests issued (or that would have been, in a dry run)
    pub fn requests(&self) -> usize {
        self.batches.len()
    }

    /// Records in batches the destination accepted
    pub fn written(&self) -> usize {
        self.batches
            .iter()
            .filter(|b| b.result == BatchResult::Written)
            .map(|b| b.len)
            .sum()
    }

    pub fn failed(&self) -> impl Iterator<Item = &BatchOutcome> {
        self.batches.iter().filter(|b| b.is_failed())
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }
}

/// Lifecycle of one table within a run
///
/// `NotStarted → Extracting → (Extracted | ExtractFailedPartial) → Loading → Done`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    NotStarted,
    Extracting,
    Extracted,
    ExtractFailedPartial,
    Loading,
    Done,
}

impl TableState {
    /// Whether `next` directly follows `self`; there are no retry or rollback edges
    pub fn can_advance_to(self, next: TableState) -> bool {
        use TableState::*;
        matches!(
            (self, next),
            (NotStarted, Extracting)
                | (Extracting, Extracted)
                | (Extracting, ExtractFailedPartial)
                | (Extracted, Loading)
                | (ExtractFailedPartial, Loading)
                | (Loading, Done)
        )
    }
}

impl std::fmt::Display for TableState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NotStarted => "not started",
            Self::Extracting => "extracting",
            Self::Extracted => "extracted",
            Self::ExtractFailedPartial => "extract failed (partial)",
            Self::Loading => "loading",
            Self::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Everything that happened to one table
#[derive(Debug, Clone, PartialEq)]
pub struct TableReport {
    pub table: TableDescriptor,
    pub state: TableState,
    /// State reached once extraction finished
    pub extracted_as: TableState,
    pub extract_status: ExtractStatus,
    pub extracted: usize,
    pub pages: usize,
    pub load: LoadReport,
}

impl TableReport {
    /// Fully extracted and every batch accepted
    pub fn is_clean(&self) -> bool {
        self.extract_status == ExtractStatus::Complete && self.load.failed_count() == 0
    }
}

/// Results of a whole run, in table order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    pub tables: Vec<TableReport>,
}

impl MigrationReport {
    pub fn extracted(&self) -> usize {
        self.tables.iter().map(|t| t.extracted).sum()
    }

    pub fn written(&self) -> usize {
        self.tables.iter().map(|t| t.load.written()).sum()
    }

    pub fn failed_batches(&self) -> usize {
        self.tables.iter().map(|t| t.load.failed_count()).sum()
    }

    pub fn partial_tables(&self) -> impl Iterator<Item = &TableReport> {
        self.tables
            .iter()
            .filter(|t| t.extract_status != ExtractStatus::Complete)
    }

    pub fn is_clean(&self) -> bool {
        self.tables.iter().all(|t| t.is_clean())
    }
}
