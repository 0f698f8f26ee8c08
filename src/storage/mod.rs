//! File system storage operations
//!
//! Table snapshots are kept as NDJSON files, one per table.

mod ndjson;

pub use ndjson::{NdjsonReader, NdjsonWriter};
