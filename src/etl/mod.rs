//! Core ETL (Extract, Load) abstractions
//!
//! This module provides the extractor and loader used to copy tables
//! between stores, and the pipeline that runs them table by table.

mod extract;
mod load;
mod outcome;
mod pipeline;

pub use extract::{Extractor, PagedExtractor, SnapshotExtractor};
pub use load::{BatchLoader, DryRunLoader, Loader, batches, progress_due};
pub use outcome::{
    BatchOutcome, BatchResult, ExtractStatus, Extraction, LoadReport, MigrationReport,
    TableReport, TableState,
};
pub use pipeline::Pipeline;
