//! Supabase Migrate
//!
//! Copies the full contents of a list of tables from one Supabase project
//! to another through their PostgREST endpoints, upserting on each table's
//! key so that re-running a migration never duplicates rows.

pub mod cli;
pub mod client;
pub mod etl;
pub mod plan;
pub mod storage;

// Re-exports for convenience
pub use client::{Credentials, Record, RecordStore, RestClient, StoreFailure};
pub use etl::{BatchLoader, Extractor, Loader, MigrationReport, PagedExtractor, Pipeline};
pub use plan::{MigrationPlan, TableDescriptor};
pub use storage::{NdjsonReader, NdjsonWriter};
