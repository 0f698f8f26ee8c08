//! Record store abstraction
//!
//! A store hosts named tables of JSON records. The extractor reads pages
//! from one store and the loader upserts batches into another; both only
//! see this trait.

use serde_json::{Map, Value};
use std::future::Future;

/// A single table row, passed through the migration untouched
pub type Record = Map<String, Value>;

/// Why a single page read or batch write did not succeed
#[derive(Debug, Clone, PartialEq)]
pub enum StoreFailure {
    /// The store answered with a non-success HTTP status
    Status { status: u16, body: String },
    /// The request never produced a response
    Transport(String),
    /// The response body was not a JSON array of objects
    Decode(String),
    /// A local snapshot could not be read
    Io(String),
}

impl StoreFailure {
    /// HTTP status, when the store answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl std::fmt::Display for StoreFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status { status, body } => write!(f, "{} - {}", status, body),
            Self::Transport(e) => write!(f, "request failed: {}", e),
            Self::Decode(e) => write!(f, "invalid response body: {}", e),
            Self::Io(e) => write!(f, "snapshot unreadable: {}", e),
        }
    }
}

impl std::error::Error for StoreFailure {}

/// Remote store reachable through PostgREST-style table endpoints
pub trait RecordStore: Send + Sync {
    /// Read `limit` rows starting at `offset`, sorted ascending by `order_by`
    fn select_page(
        &self,
        table: &str,
        order_by: &str,
        limit: usize,
        offset: usize,
    ) -> impl Future<Output = Result<Vec<Record>, StoreFailure>> + Send;

    /// Insert `records`, merging rows that share the same `conflict_key` value
    fn upsert(
        &self,
        table: &str,
        conflict_key: &str,
        records: &[Record],
    ) -> impl Future<Output = Result<(), StoreFailure>> + Send;
}

impl<S: RecordStore> RecordStore for &S {
    fn select_page(
        &self,
        table: &str,
        order_by: &str,
        limit: usize,
        offset: usize,
    ) -> impl Future<Output = Result<Vec<Record>, StoreFailure>> + Send {
        (**self).select_page(table, order_by, limit, offset)
    }

    fn upsert(
        &self,
        table: &str,
        conflict_key: &str,
        records: &[Record],
    ) -> impl Future<Output = Result<(), StoreFailure>> + Send {
        (**self).upsert(table, conflict_key, records)
    }
}
